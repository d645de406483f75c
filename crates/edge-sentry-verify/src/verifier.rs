// crates/edge-sentry-verify/src/verifier.rs
// ============================================================================
// Module: Edge Sentry Upload Verifier
// Description: Certificate-chain and signature verification for key uploads.
// Purpose: Authenticate claimed identity-to-key bindings before acceptance.
// Dependencies: rustls-pemfile, rustls-webpki, x509-parser, p256, serde
// ============================================================================

//! ## Overview
//! A public-key upload carries a PEM-encoded client certificate and a
//! compact JWS envelope over the claimed key material. Verification is
//! strictly ordered and short-circuits on the first failure: PEM decode,
//! X.509 parse, chain validation against the trusted root pool, then
//! envelope signature verification. The key material used for the last
//! step is a deployment policy, never hard-coded.
//! Invariants:
//! - Failures are per-message and recoverable; a bad upload never
//!   interrupts processing of subsequent messages.
//! - No key material is stored here; the caller decides what to do with a
//!   verified key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use p256::ecdsa::VerifyingKey;
use p256::pkcs8::DecodePublicKey;
use rustls_pki_types::CertificateDer;
use rustls_pki_types::SignatureVerificationAlgorithm;
use rustls_pki_types::UnixTime;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use webpki::EndEntityCert;
use webpki::KeyUsage;
use webpki::ring::ECDSA_P256_SHA256;
use webpki::ring::ECDSA_P256_SHA384;
use webpki::ring::ECDSA_P384_SHA256;
use webpki::ring::ECDSA_P384_SHA384;
use webpki::ring::ED25519;
use webpki::ring::RSA_PKCS1_2048_8192_SHA256;
use webpki::ring::RSA_PKCS1_2048_8192_SHA384;
use webpki::ring::RSA_PKCS1_2048_8192_SHA512;
use x509_parser::prelude::parse_x509_certificate;

use edge_sentry_core::topic::Topic;

use crate::jws::JwsError;
use crate::jws::verify_compact_es256;
use crate::roots::TrustedRootSet;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Signature algorithms accepted during certificate path validation.
static PATH_SIG_ALGS: &[&dyn SignatureVerificationAlgorithm] = &[
    ECDSA_P256_SHA256,
    ECDSA_P256_SHA384,
    ECDSA_P384_SHA256,
    ECDSA_P384_SHA384,
    ED25519,
    RSA_PKCS1_2048_8192_SHA256,
    RSA_PKCS1_2048_8192_SHA384,
    RSA_PKCS1_2048_8192_SHA512,
];

// ============================================================================
// SECTION: Verification Errors
// ============================================================================

/// Errors returned by upload verification, in pipeline order.
///
/// # Invariants
/// - Variants are stable and distinguishable for audit labeling.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Upload body is not well-formed JSON for the expected schema.
    #[error("malformed key upload: {0}")]
    MalformedUpload(String),
    /// No valid PEM block is present in the upload.
    #[error("certificate PEM decode failed: {0}")]
    CertDecode(String),
    /// Decoded bytes are not a well-formed X.509 certificate.
    #[error("certificate parse failed: {0}")]
    CertParse(String),
    /// Certificate does not chain to any trusted root.
    #[error("certificate not trusted: {0}")]
    UntrustedCert(String),
    /// Envelope signature did not verify against the policy key material.
    #[error("envelope signature invalid: {0}")]
    SignatureInvalid(String),
}

impl VerifyError {
    /// Returns a stable failure kind label for audit events.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MalformedUpload(_) => "malformed_upload",
            Self::CertDecode(_) => "cert_decode",
            Self::CertParse(_) => "cert_parse",
            Self::UntrustedCert(_) => "untrusted_cert",
            Self::SignatureInvalid(_) => "signature_invalid",
        }
    }
}

impl From<JwsError> for VerifyError {
    fn from(err: JwsError) -> Self {
        Self::SignatureInvalid(err.to_string())
    }
}

// ============================================================================
// SECTION: Upload Model
// ============================================================================

/// Claimed identity-to-key binding as published on a `pubkey` topic.
///
/// # Invariants
/// - Created on receipt, consumed synchronously, discarded after
///   verification; never persisted by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubKeyUpload {
    /// PEM-encoded client certificate.
    #[serde(rename = "clientCertPEM")]
    pub client_cert_pem: String,
    /// Compact JWS envelope over the claimed key material.
    #[serde(rename = "jwsMessage")]
    pub jws_message: String,
}

impl PubKeyUpload {
    /// Decodes a raw upload payload.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::MalformedUpload`] when the payload is not
    /// well-formed JSON for the expected schema.
    pub fn decode(payload: &[u8]) -> Result<Self, VerifyError> {
        serde_json::from_slice(payload).map_err(|err| VerifyError::MalformedUpload(err.to_string()))
    }
}

/// Key material policy for envelope signature verification.
///
/// # Invariants
/// - Selected by deployment configuration, never hard-coded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignerKeyPolicy {
    /// Verify with the uploaded leaf certificate's public key.
    #[default]
    LeafKey,
    /// Verify with the key set derived from the trusted root pool.
    RootPool,
}

/// Successful verification result.
///
/// # Invariants
/// - `key_material` is exactly the recovered envelope payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedKey {
    /// Claimed public key material recovered from the envelope.
    pub key_material: Vec<u8>,
    /// Sender identity extracted from the topic.
    pub sender_id: String,
    /// Component identity extracted from the topic.
    pub component_id: String,
    /// Subject of the verified client certificate.
    pub subject: String,
}

// ============================================================================
// SECTION: Verification Pipeline
// ============================================================================

/// Verifies a key upload against the trusted root set.
///
/// The protocol is strictly ordered and short-circuits on first failure:
/// PEM decode, X.509 parse, chain validation, envelope signature.
///
/// # Errors
///
/// Returns the pipeline-stage [`VerifyError`] variant for the first step
/// that fails.
pub fn verify_upload(
    upload: &PubKeyUpload,
    topic: &Topic,
    roots: &TrustedRootSet,
    policy: SignerKeyPolicy,
) -> Result<VerifiedKey, VerifyError> {
    let cert_der = decode_pem_certificate(&upload.client_cert_pem)?;

    let (_, cert) = parse_x509_certificate(cert_der.as_ref())
        .map_err(|err| VerifyError::CertParse(err.to_string()))?;
    let subject = cert.subject().to_string();

    validate_chain(&cert_der, roots)?;

    let candidates = match policy {
        SignerKeyPolicy::LeafKey => {
            let key = VerifyingKey::from_public_key_der(cert.public_key().raw).map_err(|err| {
                VerifyError::SignatureInvalid(format!("unsupported leaf key: {err}"))
            })?;
            vec![key]
        }
        SignerKeyPolicy::RootPool => roots.verifying_keys(),
    };
    let key_material = verify_compact_es256(&upload.jws_message, &candidates)?;

    Ok(VerifiedKey {
        key_material,
        sender_id: topic.sender_id.clone(),
        component_id: topic.component_id.clone(),
        subject,
    })
}

/// Extracts the first certificate from the uploaded PEM block.
fn decode_pem_certificate(pem: &str) -> Result<CertificateDer<'static>, VerifyError> {
    let mut reader = pem.as_bytes();
    match rustls_pemfile::certs(&mut reader).next() {
        Some(Ok(der)) => Ok(der),
        Some(Err(err)) => Err(VerifyError::CertDecode(err.to_string())),
        None => Err(VerifyError::CertDecode("no certificate PEM block present".to_string())),
    }
}

/// Validates the certificate chain against the trusted root pool.
///
/// Expiry, key usage, and name constraints follow standard X.509 path
/// validation semantics as implemented by webpki.
fn validate_chain(cert_der: &CertificateDer<'_>, roots: &TrustedRootSet) -> Result<(), VerifyError> {
    let end_entity = EndEntityCert::try_from(cert_der)
        .map_err(|err| VerifyError::CertParse(err.to_string()))?;
    let anchors = roots.anchors();
    end_entity
        .verify_for_usage(
            PATH_SIG_ALGS,
            &anchors,
            &[],
            UnixTime::now(),
            KeyUsage::client_auth(),
            None,
            None,
        )
        .map_err(|err| VerifyError::UntrustedCert(err.to_string()))?;
    Ok(())
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
        reason = "Test-only decoding assertions."
    )]

    use super::PubKeyUpload;
    use super::SignerKeyPolicy;
    use super::VerifyError;

    #[test]
    fn decode_accepts_expected_schema() {
        let upload = PubKeyUpload::decode(
            br#"{"clientCertPEM": "-----BEGIN...", "jwsMessage": "a.b.c"}"#,
        )
        .expect("upload decodes");
        assert_eq!(upload.jws_message, "a.b.c");
    }

    #[test]
    fn decode_rejects_missing_fields() {
        let err = PubKeyUpload::decode(br#"{"clientCertPEM": "x"}"#)
            .expect_err("missing field rejected");
        assert_eq!(err.kind(), "malformed_upload");
    }

    #[test]
    fn error_kinds_are_distinct() {
        let kinds = [
            VerifyError::MalformedUpload(String::new()).kind(),
            VerifyError::CertDecode(String::new()).kind(),
            VerifyError::CertParse(String::new()).kind(),
            VerifyError::UntrustedCert(String::new()).kind(),
            VerifyError::SignatureInvalid(String::new()).kind(),
        ];
        let mut unique = kinds.to_vec();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), kinds.len());
    }

    #[test]
    fn signer_key_policy_defaults_to_leaf_key() {
        assert_eq!(SignerKeyPolicy::default(), SignerKeyPolicy::LeafKey);
    }
}
