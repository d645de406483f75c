// crates/edge-sentry-core/src/lib.rs
// ============================================================================
// Module: Edge Sentry Core Library
// Description: Topic parsing, health report model, status cache, commands, audit.
// Purpose: Shared types for the routing and verification pipeline.
// Dependencies: serde, serde_json, time, thiserror
// ============================================================================

//! ## Overview
//! Edge Sentry Core provides the types shared across the daemon: the
//! [`Topic`] parser, the [`HealthReport`] model and decoder, the
//! [`StatusCache`] backing the control API, the closed [`ControlCommand`]
//! set, and the audit/telemetry seams.
//! Invariants:
//! - All inbound data is treated as untrusted until parsed or verified.
//! - The status cache is the single source of truth for fleet health.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod cache;
pub mod command;
pub mod status;
pub mod telemetry;
pub mod topic;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditEvent;
pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use cache::StatusCache;
pub use command::CommandRequest;
pub use command::CommandResponse;
pub use command::ControlCommand;
pub use command::PingResponse;
pub use status::ComponentStatus;
pub use status::DecodeError;
pub use status::HealthReport;
pub use status::Outcome;
pub use telemetry::MessageMetricEvent;
pub use telemetry::MessageOutcome;
pub use telemetry::NoopMetrics;
pub use telemetry::RouterMetrics;
pub use topic::Topic;
pub use topic::TopicCategory;
pub use topic::TopicError;
