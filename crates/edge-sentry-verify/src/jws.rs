// crates/edge-sentry-verify/src/jws.rs
// ============================================================================
// Module: Edge Sentry JWS Envelope
// Description: Compact JWS parsing and ES256 signature verification.
// Purpose: Verify signed envelopes binding payloads to an ECDSA key.
// Dependencies: base64, p256, serde_json
// ============================================================================

//! ## Overview
//! Key uploads carry a compact JWS envelope (`header.payload.signature`,
//! base64url without padding) over the claimed public key material. This
//! module parses the envelope, enforces the `ES256` algorithm, and
//! verifies the signature against one of a set of candidate P-256 keys.
//! Invariants:
//! - The protected header must declare `alg: ES256`; nothing else is
//!   accepted.
//! - The payload is returned only after a signature verifies.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use p256::ecdsa::Signature;
use p256::ecdsa::VerifyingKey;
use p256::ecdsa::signature::Verifier;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: JWS Errors
// ============================================================================

/// Errors raised by envelope verification.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum JwsError {
    /// Envelope is not a well-formed compact JWS.
    #[error("malformed JWS envelope: {0}")]
    Malformed(String),
    /// Protected header declares an unsupported algorithm.
    #[error("unsupported JWS algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// No candidate key verified the signature.
    #[error("JWS signature verification failed")]
    BadSignature,
}

// ============================================================================
// SECTION: Compact Verification
// ============================================================================

/// Protected header fields the verifier inspects.
#[derive(Debug, Deserialize)]
struct ProtectedHeader {
    /// Declared signature algorithm.
    alg: String,
}

/// Verifies a compact ES256 envelope against candidate keys and returns
/// the recovered payload bytes.
///
/// # Errors
///
/// Returns [`JwsError::Malformed`] on framing or encoding failures,
/// [`JwsError::UnsupportedAlgorithm`] when the header does not declare
/// `ES256`, and [`JwsError::BadSignature`] when no candidate key verifies
/// the signature.
pub fn verify_compact_es256(
    envelope: &str,
    candidates: &[VerifyingKey],
) -> Result<Vec<u8>, JwsError> {
    let mut parts = envelope.split('.');
    let (header_b64, payload_b64, signature_b64) =
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(header), Some(payload), Some(signature), None) => (header, payload, signature),
            _ => return Err(JwsError::Malformed("expected three dot-separated parts".to_string())),
        };

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|err| JwsError::Malformed(format!("header encoding: {err}")))?;
    let header: ProtectedHeader = serde_json::from_slice(&header_bytes)
        .map_err(|err| JwsError::Malformed(format!("header json: {err}")))?;
    if header.alg != "ES256" {
        return Err(JwsError::UnsupportedAlgorithm(header.alg));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|err| JwsError::Malformed(format!("payload encoding: {err}")))?;
    let signature_bytes = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|err| JwsError::Malformed(format!("signature encoding: {err}")))?;
    let signature = Signature::from_slice(&signature_bytes)
        .map_err(|err| JwsError::Malformed(format!("signature shape: {err}")))?;

    // The signing input is the raw ASCII of the first two parts.
    let signing_input_len = header_b64.len() + 1 + payload_b64.len();
    let signing_input = envelope
        .get(..signing_input_len)
        .ok_or_else(|| JwsError::Malformed("signing input out of bounds".to_string()))?;

    if candidates
        .iter()
        .any(|key| key.verify(signing_input.as_bytes(), &signature).is_ok())
    {
        Ok(payload)
    } else {
        Err(JwsError::BadSignature)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
