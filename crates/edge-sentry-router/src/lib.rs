// crates/edge-sentry-router/src/lib.rs
// ============================================================================
// Module: Edge Sentry Router Library
// Description: Subscription transport seam and message routing engine.
// Purpose: Consume subscription streams and drive decode, verification,
//          and cache updates.
// Dependencies: edge-sentry-core, edge-sentry-verify, tokio
// ============================================================================

//! ## Overview
//! Edge Sentry Router connects a [`SubscriptionTransport`] to the status
//! cache and the upload verification pipeline. The [`RouterEngine`] owns
//! the subscription lifecycle and one worker task per stream; every
//! per-message failure is audited and skipped, never fatal.
//! Invariants:
//! - Startup configuration errors are the only fatal error class.
//! - Subscription streams are bounded end to end.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod router;
pub mod transport;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use router::ChannelValidation;
pub use router::EngineState;
pub use router::RouterConfig;
pub use router::RouterEngine;
pub use router::RouterEngineBuilder;
pub use router::RouterError;
pub use transport::ChannelTransport;
pub use transport::DEFAULT_CHANNEL_CAPACITY;
pub use transport::InboundMessage;
pub use transport::SubscriptionTransport;
pub use transport::TransportError;
pub use transport::filter_matches;
