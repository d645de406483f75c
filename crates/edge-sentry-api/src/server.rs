// crates/edge-sentry-api/src/server.rs
// ============================================================================
// Module: Edge Sentry Control API Server
// Description: HTTP control surface for the status daemon.
// Purpose: Serve command, status, debug, and ping endpoints over axum.
// Dependencies: edge-sentry-core, edge-sentry-router, axum, tokio
// ============================================================================

//! ## Overview
//! The control API exposes four POST endpoints under `/api/v1`: `command`
//! drives the daemon and subscription engine, `status` returns the fleet
//! health snapshot, `debug` is a reserved command surface whose
//! `internals` command reports diagnostics, and `ping` answers
//! liveness probes. Every request must carry the shared API key header.
//! Security posture: inputs are untrusted; requests fail closed without
//! the key.
//! Invariants:
//! - Authentication failures use the HTTP status code (401); everything
//!   past authentication reports failures in the response body with
//!   HTTP 200, including unknown commands.
//! - Handlers never block on engine work beyond the command itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::routing::post;
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

use edge_sentry_config::ApiServerConfig;
use edge_sentry_core::command::CommandRequest;
use edge_sentry_core::command::CommandResponse;
use edge_sentry_core::command::ControlCommand;
use edge_sentry_core::command::PingResponse;
use edge_sentry_core::status::HealthReport;
use edge_sentry_router::RouterEngine;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the shared control API key.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Daemon name reported by liveness responses.
const DAEMON_NAME: &str = "edge-sentry";

// ============================================================================
// SECTION: Server Errors
// ============================================================================

/// Fatal control API server errors.
#[derive(Debug, Error)]
pub enum ApiServerError {
    /// A listener could not bind its address.
    #[error("bind failed on {address}: {detail}")]
    Bind {
        /// Address that failed to bind.
        address: SocketAddr,
        /// Underlying bind failure.
        detail: String,
    },
    /// TLS key material could not be loaded.
    #[error("tls setup failed: {0}")]
    Tls(String),
    /// A listener failed while serving.
    #[error("serve failed: {0}")]
    Serve(String),
}

// ============================================================================
// SECTION: Server State
// ============================================================================

/// Shared state behind every control API handler.
pub struct ServerState {
    /// Subscription router engine under control.
    engine: Arc<RouterEngine>,
    /// Shared API key required on every request.
    api_key: String,
    /// Daemon boot time.
    boot_time: OffsetDateTime,
    /// Monotonic clock for uptime reporting.
    started: Instant,
    /// Daemon shutdown signal triggered by the stop command.
    shutdown: watch::Sender<bool>,
}

/// Debug command recognized by the debug endpoint.
const DEBUG_INTERNALS_COMMAND: &str = "internals";

/// Reply body for the debug endpoint.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DebugReply {
    /// Internals report for the recognized debug command.
    Internals(DebugResponse),
    /// Structured error for unrecognized debug input.
    Error(CommandResponse),
}

/// Internals report returned by the debug endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugResponse {
    /// Current engine lifecycle state label.
    pub engine_state: &'static str,
    /// Number of functions with a cached report.
    pub tracked_functions: usize,
    /// Function identities with a cached report.
    pub function_ids: Vec<String>,
    /// Boot time as an RFC3339 string.
    pub boot_time: String,
    /// Seconds since boot.
    pub uptime_seconds: u64,
}

// ============================================================================
// SECTION: Control Server
// ============================================================================

/// Control API server bound to plaintext and TLS listeners.
pub struct ControlServer {
    /// Listener and key configuration.
    config: ApiServerConfig,
    /// Shared handler state.
    state: Arc<ServerState>,
}

impl ControlServer {
    /// Creates a server controlling the given engine.
    #[must_use]
    pub fn new(
        config: ApiServerConfig,
        engine: Arc<RouterEngine>,
        shutdown: watch::Sender<bool>,
    ) -> Self {
        let state = Arc::new(ServerState {
            engine,
            api_key: config.api_key.clone(),
            boot_time: OffsetDateTime::now_utc(),
            started: Instant::now(),
            shutdown,
        });
        Self { config, state }
    }

    /// Builds the axum application for the control surface.
    #[must_use]
    pub fn app(&self) -> Router {
        Router::new()
            .route("/api/v1/ping", post(handle_ping))
            .route("/api/v1/command", post(handle_command))
            .route("/api/v1/status", post(handle_status))
            .route("/api/v1/debug", post(handle_debug))
            .with_state(Arc::clone(&self.state))
    }

    /// Serves all configured listeners until shutdown is signaled.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError`] when a listener fails to bind, TLS key
    /// material cannot be loaded, or a listener fails while serving.
    pub async fn serve(self) -> Result<(), ApiServerError> {
        let app = self.app();
        let mut listeners = JoinSet::new();

        for address in self.config.addresses.clone() {
            let listener = TcpListener::bind(address).await.map_err(|err| {
                ApiServerError::Bind {
                    address,
                    detail: err.to_string(),
                }
            })?;
            let app = app.clone();
            let mut shutdown = self.state.shutdown.subscribe();
            listeners.spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown.wait_for(|stopped| *stopped).await;
                    })
                    .await
                    .map_err(|err| ApiServerError::Serve(err.to_string()))
            });
        }

        if !self.config.tls_addresses.is_empty() {
            let tls = self.tls_config().await?;
            for address in self.config.tls_addresses.clone() {
                let app = app.clone();
                let tls = tls.clone();
                let mut shutdown = self.state.shutdown.subscribe();
                let handle = Handle::new();
                let closer = handle.clone();
                listeners.spawn(async move {
                    let _ = shutdown.wait_for(|stopped| *stopped).await;
                    closer.graceful_shutdown(None);
                    Ok(())
                });
                listeners.spawn(async move {
                    axum_server::bind_rustls(address, tls)
                        .handle(handle)
                        .serve(app.into_make_service())
                        .await
                        .map_err(|err| ApiServerError::Serve(err.to_string()))
                });
            }
        }

        while let Some(joined) = listeners.join_next().await {
            match joined {
                Ok(result) => result?,
                Err(err) => return Err(ApiServerError::Serve(err.to_string())),
            }
        }
        Ok(())
    }

    /// Loads the TLS listener configuration from the configured key
    /// material.
    async fn tls_config(&self) -> Result<RustlsConfig, ApiServerError> {
        let (Some(cert), Some(key)) = (&self.config.cert_file, &self.config.key_file) else {
            return Err(ApiServerError::Tls("tls listeners require cert and key files".to_string()));
        };
        RustlsConfig::from_pem_file(cert, key)
            .await
            .map_err(|err| ApiServerError::Tls(err.to_string()))
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Rejection carrying the unauthorized response body.
type Unauthorized = (StatusCode, Json<CommandResponse>);

/// Checks the shared API key header; fails closed when absent or wrong.
fn authorize(state: &ServerState, headers: &HeaderMap) -> Result<(), Unauthorized> {
    let presented = headers.get(API_KEY_HEADER).and_then(|value| value.to_str().ok());
    if presented == Some(state.api_key.as_str()) {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(CommandResponse::err("invalid or missing API key")),
        ))
    }
}

/// Answers liveness probes.
async fn handle_ping(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Result<Json<PingResponse>, Unauthorized> {
    authorize(&state, &headers)?;
    Ok(Json(PingResponse {
        daemon: DAEMON_NAME.to_string(),
        status: "ok".to_string(),
        boot_time: state.boot_time.format(&Rfc3339).unwrap_or_default(),
        uptime_seconds: state.started.elapsed().as_secs(),
    }))
}

/// Executes a control command against the daemon and engine.
async fn handle_command(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(request): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, Unauthorized> {
    authorize(&state, &headers)?;
    let command = match ControlCommand::parse(&request.command) {
        Ok(command) => command,
        Err(name) => return Ok(Json(CommandResponse::unknown_command(&name))),
    };
    let response = match command {
        ControlCommand::Status => CommandResponse::ok(
            state.engine.state().as_str(),
            format!("tracking {} functions", state.engine.cache().len()),
        ),
        ControlCommand::Stop => {
            state.engine.stop();
            let _ = state.shutdown.send(true);
            CommandResponse::ok("stopping", "daemon shutdown requested")
        }
        ControlCommand::MqttStart => match state.engine.start().await {
            Ok(()) => CommandResponse::ok("running", "subscription engine started"),
            Err(err) => CommandResponse::err(err.to_string()),
        },
        ControlCommand::MqttStop => {
            state.engine.stop();
            CommandResponse::ok("stopped", "subscription engine stopped")
        }
    };
    Ok(Json(response))
}

/// Returns the point-in-time fleet health snapshot.
async fn handle_status(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Result<Json<std::collections::BTreeMap<String, HealthReport>>, Unauthorized> {
    authorize(&state, &headers)?;
    Ok(Json(state.engine.cache().snapshot()))
}

/// Executes a debug command; unrecognized input is a body-level error.
async fn handle_debug(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(request): Json<CommandRequest>,
) -> Result<Json<DebugReply>, Unauthorized> {
    authorize(&state, &headers)?;
    if request.command != DEBUG_INTERNALS_COMMAND {
        return Ok(Json(DebugReply::Error(CommandResponse::unknown_command(&request.command))));
    }
    let snapshot = state.engine.cache().snapshot();
    Ok(Json(DebugReply::Internals(DebugResponse {
        engine_state: state.engine.state().as_str(),
        tracked_functions: snapshot.len(),
        function_ids: snapshot.keys().cloned().collect(),
        boot_time: state.boot_time.format(&Rfc3339).unwrap_or_default(),
        uptime_seconds: state.started.elapsed().as_secs(),
    })))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only handler assertions."
    )]

    use std::sync::Arc;
    use std::time::Instant;

    use axum::Json;
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::http::StatusCode;
    use time::OffsetDateTime;
    use tokio::sync::watch;

    use edge_sentry_core::command::CommandRequest;
    use edge_sentry_core::status::HealthReport;
    use edge_sentry_router::ChannelTransport;
    use edge_sentry_router::ChannelValidation;
    use edge_sentry_router::RouterConfig;
    use edge_sentry_router::RouterEngine;
    use edge_sentry_verify::SignerKeyPolicy;
    use edge_sentry_verify::TrustedRootSet;

    use super::DebugReply;
    use super::ServerState;
    use super::handle_command;
    use super::handle_debug;
    use super::handle_ping;
    use super::handle_status;

    /// Shared API key used by the fixtures.
    const TEST_KEY: &str = "sentry-key";

    /// Builds an idle engine over an in-process transport.
    fn engine() -> Arc<RouterEngine> {
        let ca = rcgen::generate_simple_self_signed(["test-ca".to_string()])
            .expect("self-signed cert generates");
        let roots = TrustedRootSet::from_pem(ca.cert.pem().as_bytes(), "test-ca")
            .expect("root set loads");
        Arc::new(
            RouterEngine::builder()
                .transport(Arc::new(ChannelTransport::default()))
                .roots(Arc::new(roots))
                .config(RouterConfig {
                    status_topic: "status/up/+/+".to_string(),
                    pubkey_topic: "pubkey/up/+/+".to_string(),
                    status_validation: ChannelValidation::AdvisoryOnly,
                    signer_key_policy: SignerKeyPolicy::LeafKey,
                })
                .build()
                .expect("engine builds"),
        )
    }

    /// Builds handler state around the given engine.
    fn state(engine: Arc<RouterEngine>) -> Arc<ServerState> {
        Arc::new(ServerState {
            engine,
            api_key: TEST_KEY.to_string(),
            boot_time: OffsetDateTime::now_utc(),
            started: Instant::now(),
            shutdown: watch::channel(false).0,
        })
    }

    /// Headers carrying the shared API key.
    fn authed_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", TEST_KEY.parse().expect("header value parses"));
        headers
    }

    #[tokio::test]
    async fn missing_api_key_is_unauthorized() {
        let state = state(engine());
        let err = handle_ping(State(state), HeaderMap::new()).await.expect_err("rejected");
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
        assert!(err.1.0.error);
    }

    #[tokio::test]
    async fn wrong_api_key_is_unauthorized() {
        let state = state(engine());
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", "wrong".parse().expect("header value parses"));
        let err = handle_status(State(state), headers).await.expect_err("rejected");
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_command_is_a_body_level_error() {
        let state = state(engine());
        let Json(response) = handle_command(
            State(state),
            authed_headers(),
            Json(CommandRequest {
                command: "unknown-cmd".to_string(),
            }),
        )
        .await
        .expect("authorized");
        assert!(response.error);
        assert_eq!(response.error_msg, "Unknown command: unknown-cmd");
    }

    #[tokio::test]
    async fn status_command_reports_engine_state() {
        let state = state(engine());
        let Json(response) = handle_command(
            State(state),
            authed_headers(),
            Json(CommandRequest {
                command: "status".to_string(),
            }),
        )
        .await
        .expect("authorized");
        assert!(!response.error);
        assert_eq!(response.status, "idle");
    }

    #[tokio::test]
    async fn engine_commands_drive_the_lifecycle() {
        let engine = engine();
        let state = state(Arc::clone(&engine));
        let Json(start) = handle_command(
            State(Arc::clone(&state)),
            authed_headers(),
            Json(CommandRequest {
                command: "mqtt-start".to_string(),
            }),
        )
        .await
        .expect("authorized");
        assert!(!start.error);
        assert_eq!(engine.state().as_str(), "running");

        let Json(stop) = handle_command(
            State(state),
            authed_headers(),
            Json(CommandRequest {
                command: "mqtt-stop".to_string(),
            }),
        )
        .await
        .expect("authorized");
        assert!(!stop.error);
        assert_eq!(engine.state().as_str(), "stopped");
        engine.drain().await;
    }

    #[tokio::test]
    async fn double_start_reports_a_body_level_error() {
        let engine = engine();
        let state = state(Arc::clone(&engine));
        engine.start().await.expect("engine starts");
        let Json(response) = handle_command(
            State(state),
            authed_headers(),
            Json(CommandRequest {
                command: "mqtt-start".to_string(),
            }),
        )
        .await
        .expect("authorized");
        assert!(response.error);
        engine.stop();
        engine.drain().await;
    }

    #[tokio::test]
    async fn status_endpoint_returns_cache_snapshot() {
        let engine = engine();
        engine.cache().update(
            HealthReport::decode(
                br#"{"functionId":"edge-1","componentStatus":[
                    {"component":"resolver","status":"ok","msg":"fine"}]}"#,
            )
            .expect("report decodes"),
        );
        let Json(snapshot) =
            handle_status(State(state(engine)), authed_headers()).await.expect("authorized");
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key("edge-1"));
    }

    #[tokio::test]
    async fn debug_internals_command_reports_internals() {
        let engine = engine();
        let Json(reply) = handle_debug(
            State(state(engine)),
            authed_headers(),
            Json(CommandRequest {
                command: "internals".to_string(),
            }),
        )
        .await
        .expect("authorized");
        match reply {
            DebugReply::Internals(debug) => {
                assert_eq!(debug.engine_state, "idle");
                assert_eq!(debug.tracked_functions, 0);
                assert!(!debug.boot_time.is_empty());
            }
            DebugReply::Error(response) => panic!("unexpected error: {}", response.error_msg),
        }
    }

    #[tokio::test]
    async fn debug_rejects_unrecognized_command_in_the_body() {
        let engine = engine();
        let Json(reply) = handle_debug(
            State(state(engine)),
            authed_headers(),
            Json(CommandRequest {
                command: "dump-keys".to_string(),
            }),
        )
        .await
        .expect("authorized");
        match reply {
            DebugReply::Error(response) => {
                assert!(response.error);
                assert_eq!(response.error_msg, "Unknown command: dump-keys");
            }
            DebugReply::Internals(_) => panic!("unrecognized command must not return internals"),
        }
    }

    #[tokio::test]
    async fn stop_command_signals_daemon_shutdown() {
        let engine = engine();
        let state = state(engine);
        let mut shutdown = state.shutdown.subscribe();
        let Json(response) = handle_command(
            State(state),
            authed_headers(),
            Json(CommandRequest {
                command: "stop".to_string(),
            }),
        )
        .await
        .expect("authorized");
        assert!(!response.error);
        shutdown.wait_for(|stopped| *stopped).await.expect("shutdown observed");
    }
}
