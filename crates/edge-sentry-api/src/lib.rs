// crates/edge-sentry-api/src/lib.rs
// ============================================================================
// Module: Edge Sentry API Library
// Description: HTTP control surface for the status daemon.
// Purpose: Expose command, status, debug, and ping endpoints.
// Dependencies: edge-sentry-config, edge-sentry-router, axum
// ============================================================================

//! ## Overview
//! Edge Sentry API serves the daemon's control surface: a small set of
//! authenticated POST endpoints for driving the subscription engine and
//! reading the fleet health snapshot. Authentication failures map to 401;
//! all later failures are body-level with HTTP 200.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use server::API_KEY_HEADER;
pub use server::ApiServerError;
pub use server::ControlServer;
pub use server::DebugReply;
pub use server::DebugResponse;
pub use server::ServerState;
