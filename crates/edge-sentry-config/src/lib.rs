// crates/edge-sentry-config/src/lib.rs
// ============================================================================
// Module: Edge Sentry Config Library
// Description: Canonical configuration model and fail-closed validation.
// Purpose: Load, validate, and expose daemon configuration.
// Dependencies: edge-sentry-router, edge-sentry-verify, serde, toml
// ============================================================================

//! ## Overview
//! Edge Sentry Config owns the TOML configuration model for the daemon:
//! broker transport, topic filters, trust pool, control API server, and
//! audit log settings. Loading is strict and fail-closed; an invalid
//! configuration refuses to start the daemon.
//! Invariants:
//! - Every section validates independently; the first violation is
//!   reported with its field path.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::ApiServerConfig;
pub use config::AuditConfig;
pub use config::ConfigError;
pub use config::EdgeSentryConfig;
pub use config::TopicsConfig;
pub use config::TransportConfig;
pub use config::TrustConfig;
