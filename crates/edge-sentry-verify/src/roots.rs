// crates/edge-sentry-verify/src/roots.rs
// ============================================================================
// Module: Edge Sentry Trusted Roots
// Description: CA certificate pool used to validate uploaded client certs.
// Purpose: Load the trust anchors once at startup and keep them read-only.
// Dependencies: rustls-pemfile, rustls-pki-types, rustls-webpki, x509-parser, p256
// ============================================================================

//! ## Overview
//! [`TrustedRootSet`] holds the CA certificate pool loaded from a PEM
//! bundle at startup. It exposes the DER roots, webpki trust anchors for
//! path validation, and the P-256 verifying keys derived from the pool for
//! the pool-keyed signature verification mode.
//! Invariants:
//! - Loaded once at startup and read-only for the life of the process.
//! - An empty bundle fails closed at load time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io;
use std::io::BufReader;
use std::path::Path;

use p256::ecdsa::VerifyingKey;
use p256::pkcs8::DecodePublicKey;
use rustls_pki_types::CertificateDer;
use rustls_pki_types::TrustAnchor;
use thiserror::Error;
use webpki::anchor_from_trusted_cert;
use x509_parser::prelude::parse_x509_certificate;

// ============================================================================
// SECTION: Root Set Errors
// ============================================================================

/// Errors raised while loading the trusted root set.
///
/// # Invariants
/// - All variants are fatal at startup; the daemon cannot run without a
///   usable trust pool.
#[derive(Debug, Error)]
pub enum RootSetError {
    /// Bundle file could not be read.
    #[error("failed to read CA bundle {path}: {source}")]
    Io {
        /// Bundle path.
        path: String,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// Bundle contained an invalid PEM block.
    #[error("invalid PEM block in CA bundle {0}")]
    InvalidPem(String),
    /// Bundle contained no certificates.
    #[error("no certificates found in CA bundle {0}")]
    Empty(String),
    /// A bundle certificate is not usable as a trust anchor.
    #[error("unusable trust anchor in CA bundle: {0}")]
    BadAnchor(String),
}

// ============================================================================
// SECTION: Trusted Root Set
// ============================================================================

/// Read-only CA certificate pool.
///
/// # Invariants
/// - Contains at least one certificate.
/// - Every certificate is usable as a webpki trust anchor.
#[derive(Debug)]
pub struct TrustedRootSet {
    /// DER-encoded root certificates.
    roots: Vec<CertificateDer<'static>>,
}

impl TrustedRootSet {
    /// Loads the root set from a PEM bundle on disk.
    ///
    /// # Errors
    ///
    /// Returns [`RootSetError`] when the file is unreadable, contains no
    /// certificates, or contains a certificate that cannot serve as a
    /// trust anchor.
    pub fn load(path: &Path) -> Result<Self, RootSetError> {
        let file = File::open(path).map_err(|source| RootSetError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        let roots = rustls_pemfile::certs(&mut reader)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| RootSetError::InvalidPem(path.display().to_string()))?;
        Self::from_der(roots, &path.display().to_string())
    }

    /// Builds the root set from a PEM bundle held in memory.
    ///
    /// # Errors
    ///
    /// Returns [`RootSetError`] on an empty or malformed bundle.
    pub fn from_pem(bundle: &[u8], label: &str) -> Result<Self, RootSetError> {
        let mut reader = bundle;
        let roots = rustls_pemfile::certs(&mut reader)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| RootSetError::InvalidPem(label.to_string()))?;
        Self::from_der(roots, label)
    }

    /// Validates the collected DER roots and builds the set.
    fn from_der(
        roots: Vec<CertificateDer<'static>>,
        label: &str,
    ) -> Result<Self, RootSetError> {
        if roots.is_empty() {
            return Err(RootSetError::Empty(label.to_string()));
        }
        for root in &roots {
            anchor_from_trusted_cert(root)
                .map_err(|err| RootSetError::BadAnchor(err.to_string()))?;
        }
        Ok(Self {
            roots,
        })
    }

    /// Returns the number of roots in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Returns true when the pool is empty (never, post-construction).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Returns webpki trust anchors borrowed from the pool.
    #[must_use]
    pub fn anchors(&self) -> Vec<TrustAnchor<'_>> {
        // Anchor conversion was validated at construction time.
        self.roots.iter().filter_map(|root| anchor_from_trusted_cert(root).ok()).collect()
    }

    /// Returns the P-256 verifying keys derivable from the pool.
    ///
    /// Roots carrying non-P-256 keys are skipped; they still participate
    /// in path validation but cannot verify ES256 envelopes.
    #[must_use]
    pub fn verifying_keys(&self) -> Vec<VerifyingKey> {
        self.roots
            .iter()
            .filter_map(|root| {
                let (_, cert) = parse_x509_certificate(root.as_ref()).ok()?;
                VerifyingKey::from_public_key_der(cert.public_key().raw).ok()
            })
            .collect()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
