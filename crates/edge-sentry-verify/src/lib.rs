// crates/edge-sentry-verify/src/lib.rs
// ============================================================================
// Module: Edge Sentry Verify Library
// Description: Trust pool loading and key-upload verification pipeline.
// Purpose: Authenticate public-key uploads against the CA root pool.
// Dependencies: edge-sentry-core, rustls-webpki, x509-parser, p256
// ============================================================================

//! ## Overview
//! Edge Sentry Verify implements the multi-step authentication protocol
//! for public-key uploads: PEM decode, X.509 parse, chain validation
//! against a [`TrustedRootSet`], and compact JWS (ES256) signature
//! verification under a configurable [`SignerKeyPolicy`].
//! Invariants:
//! - Verification is strictly ordered and short-circuits on first failure.
//! - All failures are per-message and recoverable.
//!
//! Security posture: uploads are untrusted input end to end; nothing is
//! trusted before the full pipeline succeeds.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod jws;
pub mod roots;
pub mod verifier;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use jws::JwsError;
pub use jws::verify_compact_es256;
pub use roots::RootSetError;
pub use roots::TrustedRootSet;
pub use verifier::PubKeyUpload;
pub use verifier::SignerKeyPolicy;
pub use verifier::VerifiedKey;
pub use verifier::VerifyError;
pub use verifier::verify_upload;
