// crates/edge-sentry-core/src/telemetry.rs
// ============================================================================
// Module: Edge Sentry Telemetry
// Description: Observability hooks for router message handling.
// Purpose: Provide metric events without hard dependencies.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface for per-message router
//! counters. It is intentionally dependency-light so downstream deployments
//! can plug in Prometheus or OpenTelemetry without redesign.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::topic::TopicCategory;

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Router message outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum MessageOutcome {
    /// Message was decoded/verified and applied.
    Accepted,
    /// Message was dropped after a per-message failure.
    Rejected,
}

impl MessageOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

/// Router message metric event payload.
#[derive(Debug, Clone)]
pub struct MessageMetricEvent {
    /// Topic category, when the topic parsed far enough to know it.
    pub category: Option<TopicCategory>,
    /// Message outcome.
    pub outcome: MessageOutcome,
    /// Stable failure kind label for rejections.
    pub failure_kind: Option<&'static str>,
    /// Payload size in bytes.
    pub payload_bytes: usize,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for router message counters.
pub trait RouterMetrics: Send + Sync {
    /// Records a per-message counter event.
    fn record_message(&self, event: MessageMetricEvent);
}

/// No-op metrics sink.
///
/// # Invariants
/// - Metrics are intentionally discarded.
pub struct NoopMetrics;

impl RouterMetrics for NoopMetrics {
    fn record_message(&self, _event: MessageMetricEvent) {}
}
