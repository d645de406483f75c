// crates/edge-sentry-router/src/router.rs
// ============================================================================
// Module: Edge Sentry Subscription Router
// Description: Router engine consuming subscription streams and dispatching
//              messages by topic category.
// Purpose: Drive decode, verification, cache updates, and audit emission.
// Dependencies: edge-sentry-core, edge-sentry-verify, tokio
// ============================================================================

//! ## Overview
//! The [`RouterEngine`] owns the subscription lifecycle. It subscribes to
//! the configured status and pubkey topic filters, spawns one worker per
//! stream, and dispatches each inbound message by its parsed category:
//! status reports are decoded and applied to the shared [`StatusCache`],
//! key uploads run the certificate and signature verification pipeline.
//! Invariants:
//! - Per-message failures are recoverable: the failure is audited and the
//!   worker moves on to the next message.
//! - Exactly one fatal class exists: startup configuration errors
//!   (missing topic filters, missing validator key) refuse to start.
//! - Lifecycle is Idle, then Subscribed once subscriptions are
//!   established, then Running once workers consume; Stopped ends the
//!   run, draining in-flight messages without new subscriptions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use edge_sentry_core::audit::AuditEvent;
use edge_sentry_core::audit::AuditSink;
use edge_sentry_core::audit::NoopAuditSink;
use edge_sentry_core::cache::StatusCache;
use edge_sentry_core::status::HealthReport;
use edge_sentry_core::telemetry::MessageMetricEvent;
use edge_sentry_core::telemetry::MessageOutcome;
use edge_sentry_core::telemetry::NoopMetrics;
use edge_sentry_core::telemetry::RouterMetrics;
use edge_sentry_core::topic::Topic;
use edge_sentry_core::topic::TopicCategory;
use edge_sentry_core::topic::TopicError;
use edge_sentry_verify::PubKeyUpload;
use edge_sentry_verify::SignerKeyPolicy;
use edge_sentry_verify::TrustedRootSet;
use edge_sentry_verify::verify_upload;

use crate::transport::InboundMessage;
use crate::transport::SubscriptionTransport;
use crate::transport::TransportError;

// ============================================================================
// SECTION: Router Errors
// ============================================================================

/// Fatal router errors; everything else is handled per message.
#[derive(Debug, Error)]
pub enum RouterError {
    /// No status topic filter is configured.
    #[error("status topic filter is empty")]
    MissingStatusTopic,
    /// No pubkey topic filter is configured.
    #[error("pubkey topic filter is empty")]
    MissingPubkeyTopic,
    /// A validated status channel was requested without key material.
    #[error("validated status channel requires a validator key reference")]
    MissingValidatorKey,
    /// The engine is already subscribed or running.
    #[error("router engine already started")]
    AlreadyStarted,
    /// The transport refused a subscription.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A required builder component was not supplied.
    #[error("router engine builder missing {0}")]
    MissingComponent(&'static str),
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Upstream validation posture for the status channel.
///
/// # Invariants
/// - `Validated` requires a non-empty key reference at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelValidation {
    /// The transport authenticates publishers with the referenced key.
    Validated {
        /// Reference to the validator key material handed to the
        /// transport.
        key_ref: String,
    },
    /// No upstream validation; payloads are advisory and every accepted
    /// report is marked as having bypassed verification.
    AdvisoryOnly,
}

impl ChannelValidation {
    /// Returns the validator key reference handed to the transport.
    #[must_use]
    pub fn validator_key(&self) -> Option<&str> {
        match self {
            Self::Validated { key_ref } => Some(key_ref),
            Self::AdvisoryOnly => None,
        }
    }
}

/// Router engine configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Topic filter for status report subscriptions.
    pub status_topic: String,
    /// Topic filter for public-key upload subscriptions.
    pub pubkey_topic: String,
    /// Upstream validation posture for the status channel.
    pub status_validation: ChannelValidation,
    /// Key material policy for upload envelope verification.
    pub signer_key_policy: SignerKeyPolicy,
}

impl RouterConfig {
    /// Validates the configuration before the engine starts.
    ///
    /// # Errors
    ///
    /// Returns the corresponding [`RouterError`] variant when a topic
    /// filter is empty or a validated channel lacks key material.
    pub fn validate(&self) -> Result<(), RouterError> {
        if self.status_topic.is_empty() {
            return Err(RouterError::MissingStatusTopic);
        }
        if self.pubkey_topic.is_empty() {
            return Err(RouterError::MissingPubkeyTopic);
        }
        if let ChannelValidation::Validated { key_ref } = &self.status_validation
            && key_ref.is_empty()
        {
            return Err(RouterError::MissingValidatorKey);
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Engine State
// ============================================================================

/// Router engine lifecycle states.
///
/// # Invariants
/// - Transitions are monotonic within one run: Idle, Subscribed, Running,
///   Stopped. A stopped engine may begin a fresh run with new
///   subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed, not yet subscribed.
    Idle,
    /// Subscriptions are established; workers not yet consuming.
    Subscribed,
    /// Workers are consuming subscription streams.
    Running,
    /// The run has ended; in-flight messages drain, no new subscriptions.
    Stopped,
}

impl EngineState {
    /// Returns a stable label for status reporting.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Subscribed => "subscribed",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

// ============================================================================
// SECTION: Message Handling
// ============================================================================

/// Shared per-message handling context for worker tasks.
struct RouterContext {
    /// Shared status cache updated by accepted reports.
    cache: StatusCache,
    /// Audit sink receiving normalized events.
    audit: Arc<dyn AuditSink>,
    /// Metrics sink receiving per-message counters.
    metrics: Arc<dyn RouterMetrics>,
    /// Trusted root pool for upload verification.
    roots: Arc<TrustedRootSet>,
    /// Key material policy for upload envelope verification.
    signer_key_policy: SignerKeyPolicy,
}

impl RouterContext {
    /// Handles one inbound message; never fails.
    fn handle(&self, message: &InboundMessage) {
        let topic = match Topic::parse(&message.topic) {
            Ok(topic) => topic,
            Err(err) => {
                let kind = match err {
                    TopicError::InvalidShape(_) => "invalid_topic",
                    TopicError::UnknownCategory(_) => "unknown_category",
                };
                self.reject(&message.topic, None, None, kind, err.to_string(), message);
                return;
            }
        };
        match topic.category {
            TopicCategory::Status => self.handle_status(&topic, message),
            TopicCategory::Pubkey => self.handle_pubkey(&topic, message),
        }
    }

    /// Decodes a status report and applies it to the shared cache.
    fn handle_status(&self, topic: &Topic, message: &InboundMessage) {
        let report = match HealthReport::decode(&message.payload) {
            Ok(report) => report,
            Err(err) => {
                self.reject(
                    &message.topic,
                    Some(topic),
                    Some(topic.category),
                    "malformed_payload",
                    err.to_string(),
                    message,
                );
                return;
            }
        };
        if !message.validated {
            self.audit.record(&AuditEvent::validation_bypassed(topic));
        }
        self.cache.update(report.clone());
        self.audit.record(&AuditEvent::status_accepted(topic, &report, message.validated));
        self.metrics.record_message(MessageMetricEvent {
            category: Some(topic.category),
            outcome: MessageOutcome::Accepted,
            failure_kind: None,
            payload_bytes: message.payload.len(),
        });
    }

    /// Runs the key-upload verification pipeline.
    fn handle_pubkey(&self, topic: &Topic, message: &InboundMessage) {
        let verified = PubKeyUpload::decode(&message.payload)
            .and_then(|upload| verify_upload(&upload, topic, &self.roots, self.signer_key_policy));
        match verified {
            Ok(key) => {
                self.audit.record(&AuditEvent::pubkey_verified(topic, key.subject));
                self.metrics.record_message(MessageMetricEvent {
                    category: Some(topic.category),
                    outcome: MessageOutcome::Accepted,
                    failure_kind: None,
                    payload_bytes: message.payload.len(),
                });
            }
            Err(err) => {
                self.reject(
                    &message.topic,
                    Some(topic),
                    Some(topic.category),
                    err.kind(),
                    err.to_string(),
                    message,
                );
            }
        }
    }

    /// Audits a dropped message and records the rejection counter.
    fn reject(
        &self,
        raw_topic: &str,
        topic: Option<&Topic>,
        category: Option<TopicCategory>,
        kind: &'static str,
        detail: String,
        message: &InboundMessage,
    ) {
        let sender_id = topic.map(|parsed| parsed.sender_id.clone());
        self.audit.record(&AuditEvent::message_rejected(raw_topic, sender_id, kind, detail));
        self.metrics.record_message(MessageMetricEvent {
            category,
            outcome: MessageOutcome::Rejected,
            failure_kind: Some(kind),
            payload_bytes: message.payload.len(),
        });
    }
}

// ============================================================================
// SECTION: Router Engine
// ============================================================================

/// Subscription router engine.
///
/// # Invariants
/// - All methods take `&self`; the engine is shared behind [`Arc`] between
///   the control surface and the process lifecycle.
pub struct RouterEngine {
    /// Transport providing subscription streams.
    transport: Arc<dyn SubscriptionTransport>,
    /// Shared message-handling context.
    ctx: Arc<RouterContext>,
    /// Engine configuration.
    config: RouterConfig,
    /// Current lifecycle state.
    state: Mutex<EngineState>,
    /// Shutdown signal for the current run, when one is active.
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    /// Worker handles for the current run.
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl RouterEngine {
    /// Returns a builder for assembling an engine.
    #[must_use]
    pub fn builder() -> RouterEngineBuilder {
        RouterEngineBuilder::new()
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a handle to the shared status cache.
    #[must_use]
    pub fn cache(&self) -> StatusCache {
        self.ctx.cache.clone()
    }

    /// Subscribes to the configured topic filters and starts worker tasks.
    ///
    /// A stopped engine may be started again; doing so establishes fresh
    /// subscriptions and begins a new run.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::AlreadyStarted`] when a run is active,
    /// configuration variants when validation fails, and
    /// [`RouterError::Transport`] when a subscription cannot be
    /// established.
    pub async fn start(&self) -> Result<(), RouterError> {
        self.config.validate()?;
        let previous = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match *state {
                EngineState::Subscribed | EngineState::Running => {
                    return Err(RouterError::AlreadyStarted);
                }
                current @ (EngineState::Idle | EngineState::Stopped) => {
                    *state = EngineState::Subscribed;
                    current
                }
            }
        };

        let streams = match self.establish_subscriptions().await {
            Ok(streams) => streams,
            Err(err) => {
                let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
                *state = previous;
                return Err(err);
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut workers = Vec::with_capacity(streams.len());
        for stream in streams {
            workers.push(spawn_worker(Arc::clone(&self.ctx), stream, shutdown_rx.clone()));
        }
        *self.shutdown.lock().unwrap_or_else(PoisonError::into_inner) = Some(shutdown_tx);
        *self.workers.lock().unwrap_or_else(PoisonError::into_inner) = workers;
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = EngineState::Running;
        Ok(())
    }

    /// Signals the current run to stop.
    ///
    /// Returns immediately; workers finish the message in hand, drain, and
    /// exit. Stopping an engine that is not running is a no-op beyond the
    /// state change.
    pub fn stop(&self) {
        let sender = self.shutdown.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(sender) = sender {
            let _ = sender.send(true);
        }
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = EngineState::Stopped;
    }

    /// Waits for the workers of the current run to exit.
    pub async fn drain(&self) {
        let workers: Vec<JoinHandle<()>> = {
            let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
            workers.drain(..).collect()
        };
        for worker in workers {
            let _ = worker.await;
        }
    }

    /// Subscribes to the status and pubkey topic filters.
    async fn establish_subscriptions(
        &self,
    ) -> Result<Vec<mpsc::Receiver<InboundMessage>>, RouterError> {
        let status = self
            .transport
            .subscribe(&self.config.status_topic, self.config.status_validation.validator_key())
            .await?;
        let pubkey = self.transport.subscribe(&self.config.pubkey_topic, None).await?;
        Ok(vec![status, pubkey])
    }
}

/// Spawns a worker draining one subscription stream.
///
/// On shutdown the worker handles every message already queued in the
/// bounded channel before exiting; only messages published after the
/// signal are abandoned.
fn spawn_worker(
    ctx: Arc<RouterContext>,
    mut stream: mpsc::Receiver<InboundMessage>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    while let Ok(message) = stream.try_recv() {
                        ctx.handle(&message);
                    }
                    break;
                }
                maybe = stream.recv() => match maybe {
                    Some(message) => ctx.handle(&message),
                    None => break,
                },
            }
        }
    })
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builder assembling a [`RouterEngine`] from its components.
pub struct RouterEngineBuilder {
    /// Transport providing subscription streams.
    transport: Option<Arc<dyn SubscriptionTransport>>,
    /// Trusted root pool for upload verification.
    roots: Option<Arc<TrustedRootSet>>,
    /// Shared status cache; a fresh one when not supplied.
    cache: StatusCache,
    /// Audit sink; discards events when not supplied.
    audit: Arc<dyn AuditSink>,
    /// Metrics sink; discards counters when not supplied.
    metrics: Arc<dyn RouterMetrics>,
    /// Engine configuration.
    config: Option<RouterConfig>,
}

impl RouterEngineBuilder {
    /// Creates a builder with no-op observability defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            transport: None,
            roots: None,
            cache: StatusCache::default(),
            audit: Arc::new(NoopAuditSink),
            metrics: Arc::new(NoopMetrics),
            config: None,
        }
    }

    /// Sets the subscription transport.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn SubscriptionTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the trusted root pool.
    #[must_use]
    pub fn roots(mut self, roots: Arc<TrustedRootSet>) -> Self {
        self.roots = Some(roots);
        self
    }

    /// Sets the shared status cache.
    #[must_use]
    pub fn cache(mut self, cache: StatusCache) -> Self {
        self.cache = cache;
        self
    }

    /// Sets the audit sink.
    #[must_use]
    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Sets the metrics sink.
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<dyn RouterMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the engine, validating configuration up front.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::MissingComponent`] when the transport, root
    /// pool, or configuration was not supplied, and configuration
    /// variants when validation fails.
    pub fn build(self) -> Result<RouterEngine, RouterError> {
        let transport = self.transport.ok_or(RouterError::MissingComponent("transport"))?;
        let roots = self.roots.ok_or(RouterError::MissingComponent("roots"))?;
        let config = self.config.ok_or(RouterError::MissingComponent("config"))?;
        config.validate()?;
        Ok(RouterEngine {
            transport,
            ctx: Arc::new(RouterContext {
                cache: self.cache,
                audit: self.audit,
                metrics: self.metrics,
                roots,
                signer_key_policy: config.signer_key_policy,
            }),
            config,
            state: Mutex::new(EngineState::Idle),
            shutdown: Mutex::new(None),
            workers: Mutex::new(Vec::new()),
        })
    }
}

impl Default for RouterEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
