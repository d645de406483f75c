// crates/edge-sentry-cli/src/main.rs
// ============================================================================
// Module: Edge Sentry CLI Entry Point
// Description: Command dispatcher for the status daemon.
// Purpose: Wire configuration, trust pool, router engine, and control API
//          into a running process.
// Dependencies: clap, edge-sentry-api, edge-sentry-config, tokio
// ============================================================================

//! ## Overview
//! The Edge Sentry CLI starts the status daemon (`serve`) and offers
//! offline configuration checks (`config validate`). The daemon runs the
//! subscription router engine and the control API until a shutdown signal
//! arrives, either from the operating system or from the control API's
//! stop command. Security posture: inputs are untrusted and must be
//! validated before use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use thiserror::Error;
use tokio::sync::watch;

use edge_sentry_api::ControlServer;
use edge_sentry_config::AuditConfig;
use edge_sentry_config::EdgeSentryConfig;
use edge_sentry_core::audit::AuditEvent;
use edge_sentry_core::audit::AuditSink;
use edge_sentry_core::audit::FileAuditSink;
use edge_sentry_core::audit::StderrAuditSink;
use edge_sentry_router::ChannelTransport;
use edge_sentry_router::RouterEngine;
use edge_sentry_router::SubscriptionTransport;
use edge_sentry_verify::TrustedRootSet;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "edge-sentry", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the status daemon.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Path to the configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Also write audit events to stderr when a log file is configured.
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a configuration file.
    Validate(ConfigValidateCommand),
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Path to the configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying a formatted message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("edge-sentry {version}"))
            .map_err(|err| CliError::new(format!("stdout write failed: {err}")))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command,
        } => command_config(&command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command: runs the daemon until shutdown.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = EdgeSentryConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("config load failed: {err}")))?;
    let roots = TrustedRootSet::load(Path::new(&config.trust.ca_bundle))
        .map_err(|err| CliError::new(format!("trust pool load failed: {err}")))?;
    let audit = build_audit_sink(&config.audit, command.verbose)?;

    let transport: Arc<dyn SubscriptionTransport> =
        Arc::new(ChannelTransport::new(config.transport.channel_capacity));
    let engine = Arc::new(
        RouterEngine::builder()
            .transport(transport)
            .roots(Arc::new(roots))
            .audit(audit)
            .config(config.router_config())
            .build()
            .map_err(|err| CliError::new(format!("engine init failed: {err}")))?,
    );
    engine
        .start()
        .await
        .map_err(|err| CliError::new(format!("engine start failed: {err}")))?;

    let (shutdown_tx, _shutdown_rx) = watch::channel(false);
    let server =
        ControlServer::new(config.apiserver.clone(), Arc::clone(&engine), shutdown_tx.clone());
    let mut server_task = tokio::spawn(server.serve());

    let served = tokio::select! {
        joined = &mut server_task => joined,
        () = wait_for_signal() => {
            let _ = shutdown_tx.send(true);
            server_task.await
        }
    };

    engine.stop();
    engine.drain().await;

    match served {
        Ok(Ok(())) => Ok(ExitCode::SUCCESS),
        Ok(Err(err)) => Err(CliError::new(format!("control api failed: {err}"))),
        Err(err) => Err(CliError::new(format!("control api join failed: {err}"))),
    }
}

/// Waits for an interrupt or termination signal.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::SignalKind;
        use tokio::signal::unix::signal;
        if let Ok(mut terminate) = signal(SignalKind::terminate()) {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
            return;
        }
    }
    let _ = tokio::signal::ctrl_c().await;
}

/// Builds the audit sink from the audit section and verbosity flag.
fn build_audit_sink(config: &AuditConfig, verbose: bool) -> CliResult<Arc<dyn AuditSink>> {
    let Some(path) = &config.log_file else {
        return Ok(Arc::new(StderrAuditSink));
    };
    let file = FileAuditSink::open(path)
        .map_err(|err| CliError::new(format!("audit log open failed: {err}")))?;
    if verbose {
        Ok(Arc::new(FanoutAuditSink {
            sinks: vec![Arc::new(file), Arc::new(StderrAuditSink)],
        }))
    } else {
        Ok(Arc::new(file))
    }
}

/// Audit sink duplicating events across multiple sinks.
struct FanoutAuditSink {
    /// Downstream sinks receiving every event.
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl AuditSink for FanoutAuditSink {
    fn record(&self, event: &AuditEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: &ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(command),
    }
}

/// Executes `config validate`.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    EdgeSentryConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("config invalid: {err}")))?;
    write_stdout_line("configuration valid")
        .map_err(|err| CliError::new(format!("stdout write failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Prints top-level help to stdout.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command
        .print_help()
        .map_err(|err| CliError::new(format!("stdout write failed: {err}")))?;
    write_stdout_line("").map_err(|err| CliError::new(format!("stdout write failed: {err}")))?;
    Ok(())
}

/// Writes a line to stdout without panicking on failure.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr without panicking on failure.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error to stderr and returns the failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}

// ============================================================================
// SECTION: Tests
// ============================================================================
