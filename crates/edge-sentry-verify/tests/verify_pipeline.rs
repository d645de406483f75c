// crates/edge-sentry-verify/tests/verify_pipeline.rs
// ============================================================================
// Module: Upload Verification Pipeline Tests
// Description: End-to-end verification of key uploads with ephemeral PKI.
// Purpose: Exercise every ordered failure mode with generated certificates.
// Dependencies: edge-sentry-verify, rcgen, p256
// ============================================================================

//! ## Overview
//! Generates an ephemeral CA and client certificates with rcgen, signs
//! compact ES256 envelopes with p256, and drives the full verification
//! pipeline through its success path and each distinct failure kind.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only pipeline assertions."
)]

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use p256::SecretKey;
use p256::ecdsa::Signature;
use p256::ecdsa::SigningKey;
use p256::ecdsa::signature::Signer;
use p256::pkcs8::DecodePrivateKey;
use rcgen::BasicConstraints;
use rcgen::CertificateParams;
use rcgen::DistinguishedName;
use rcgen::DnType;
use rcgen::IsCa;
use rcgen::Issuer;
use rcgen::KeyPair;

use edge_sentry_core::topic::Topic;
use edge_sentry_verify::PubKeyUpload;
use edge_sentry_verify::SignerKeyPolicy;
use edge_sentry_verify::TrustedRootSet;
use edge_sentry_verify::VerifyError;
use edge_sentry_verify::verify_upload;

/// Ephemeral PKI fixture: a CA, its issuer handle, and the CA PEM.
struct TestPki {
    /// Trusted root set containing only the generated CA.
    roots: TrustedRootSet,
    /// Issuer handle for signing leaf certificates.
    issuer: Issuer<'static, KeyPair>,
    /// p256 signing key matching the CA certificate.
    ca_signing: SigningKey,
}

/// Builds a distinguished name with the provided common name.
fn distinguished_name(common_name: &str) -> DistinguishedName {
    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, common_name);
    name
}

/// Generates a CA and the matching trusted root set.
fn test_pki() -> TestPki {
    let key = KeyPair::generate().expect("ca keypair generates");
    let ca_signing = signing_key(&key);
    let mut params = CertificateParams::default();
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.distinguished_name = distinguished_name("Edge Sentry Test CA");
    let cert = params.self_signed(&key).expect("ca self-signs");
    let roots =
        TrustedRootSet::from_pem(cert.pem().as_bytes(), "test-ca").expect("root set loads");
    let issuer = Issuer::new(params, key);
    TestPki {
        roots,
        issuer,
        ca_signing,
    }
}

/// Issues a client certificate under the fixture CA.
fn issue_client_cert(issuer: &Issuer<'_, KeyPair>, common_name: &str) -> (String, SigningKey) {
    let key = KeyPair::generate().expect("client keypair generates");
    let signing = signing_key(&key);
    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name(common_name);
    params.is_ca = IsCa::NoCa;
    let cert = params.signed_by(&key, issuer).expect("client cert signs");
    (cert.pem(), signing)
}

/// Converts an rcgen keypair into a p256 signing key.
fn signing_key(key: &KeyPair) -> SigningKey {
    let secret = SecretKey::from_pkcs8_der(&key.serialize_der()).expect("pkcs8 decodes");
    SigningKey::from(secret)
}

/// Builds a compact ES256 envelope over the payload.
fn sign_envelope(payload: &[u8], key: &SigningKey) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"ES256"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload);
    let signing_input = format!("{header}.{body}");
    let signature: Signature = key.sign(signing_input.as_bytes());
    format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature.to_bytes()))
}

/// Parses the pubkey topic used throughout the suite.
fn pubkey_topic() -> Topic {
    Topic::parse("pubkey/up/edge-9/agent").expect("topic parses")
}

#[test]
fn verify_accepts_leaf_signed_envelope_under_leaf_policy() {
    let pki = test_pki();
    let (cert_pem, client_key) = issue_client_cert(&pki.issuer, "edge-9");
    let upload = PubKeyUpload {
        client_cert_pem: cert_pem,
        jws_message: sign_envelope(b"claimed key material", &client_key),
    };
    let verified = verify_upload(&upload, &pubkey_topic(), &pki.roots, SignerKeyPolicy::LeafKey)
        .expect("upload verifies");
    assert_eq!(verified.key_material, b"claimed key material");
    assert_eq!(verified.sender_id, "edge-9");
    assert_eq!(verified.component_id, "agent");
    assert!(verified.subject.contains("edge-9"));
}

#[test]
fn verify_accepts_root_signed_envelope_under_root_pool_policy() {
    let pki = test_pki();
    let (cert_pem, _client_key) = issue_client_cert(&pki.issuer, "edge-9");
    let upload = PubKeyUpload {
        client_cert_pem: cert_pem,
        jws_message: sign_envelope(b"pool key material", &pki.ca_signing),
    };
    let verified = verify_upload(&upload, &pubkey_topic(), &pki.roots, SignerKeyPolicy::RootPool)
        .expect("upload verifies");
    assert_eq!(verified.key_material, b"pool key material");
}

#[test]
fn verify_rejects_leaf_signed_envelope_under_root_pool_policy() {
    let pki = test_pki();
    let (cert_pem, client_key) = issue_client_cert(&pki.issuer, "edge-9");
    let upload = PubKeyUpload {
        client_cert_pem: cert_pem,
        jws_message: sign_envelope(b"payload", &client_key),
    };
    let err = verify_upload(&upload, &pubkey_topic(), &pki.roots, SignerKeyPolicy::RootPool)
        .expect_err("policy mismatch rejected");
    assert_eq!(err.kind(), "signature_invalid");
}

#[test]
fn verify_rejects_invalid_pem_block() {
    let pki = test_pki();
    let upload = PubKeyUpload {
        client_cert_pem: "not a pem block".to_string(),
        jws_message: "a.b.c".to_string(),
    };
    let err = verify_upload(&upload, &pubkey_topic(), &pki.roots, SignerKeyPolicy::LeafKey)
        .expect_err("pem rejected");
    assert!(matches!(err, VerifyError::CertDecode(_)));
}

#[test]
fn verify_rejects_certificate_from_unknown_ca() {
    let pool = test_pki();
    let foreign = test_pki();
    let (cert_pem, client_key) = issue_client_cert(&foreign.issuer, "edge-9");
    let upload = PubKeyUpload {
        client_cert_pem: cert_pem,
        jws_message: sign_envelope(b"payload", &client_key),
    };
    let err = verify_upload(&upload, &pubkey_topic(), &pool.roots, SignerKeyPolicy::LeafKey)
        .expect_err("untrusted cert rejected");
    assert!(matches!(err, VerifyError::UntrustedCert(_)));
}

#[test]
fn verify_rejects_tampered_envelope_for_valid_certificate() {
    let pki = test_pki();
    let (cert_pem, client_key) = issue_client_cert(&pki.issuer, "edge-9");
    let envelope = sign_envelope(b"payload", &client_key);
    let mut parts: Vec<&str> = envelope.split('.').collect();
    let forged = URL_SAFE_NO_PAD.encode(b"forged payload");
    parts[1] = &forged;
    let upload = PubKeyUpload {
        client_cert_pem: cert_pem,
        jws_message: parts.join("."),
    };
    let err = verify_upload(&upload, &pubkey_topic(), &pki.roots, SignerKeyPolicy::LeafKey)
        .expect_err("tamper rejected");
    assert!(matches!(err, VerifyError::SignatureInvalid(_)));
}

#[test]
fn verify_failure_kinds_are_distinguishable() {
    let pki = test_pki();
    let foreign = test_pki();
    let (good_pem, client_key) = issue_client_cert(&pki.issuer, "edge-9");
    let (foreign_pem, foreign_key) = issue_client_cert(&foreign.issuer, "edge-9");

    let bad_pem = verify_upload(
        &PubKeyUpload {
            client_cert_pem: "garbage".to_string(),
            jws_message: "a.b.c".to_string(),
        },
        &pubkey_topic(),
        &pki.roots,
        SignerKeyPolicy::LeafKey,
    )
    .expect_err("pem rejected");

    let untrusted = verify_upload(
        &PubKeyUpload {
            client_cert_pem: foreign_pem,
            jws_message: sign_envelope(b"payload", &foreign_key),
        },
        &pubkey_topic(),
        &pki.roots,
        SignerKeyPolicy::LeafKey,
    )
    .expect_err("untrusted rejected");

    let envelope = sign_envelope(b"payload", &client_key);
    let tampered = envelope.replace('.', "!");
    let bad_signature = verify_upload(
        &PubKeyUpload {
            client_cert_pem: good_pem,
            jws_message: tampered,
        },
        &pubkey_topic(),
        &pki.roots,
        SignerKeyPolicy::LeafKey,
    )
    .expect_err("signature rejected");

    assert_eq!(bad_pem.kind(), "cert_decode");
    assert_eq!(untrusted.kind(), "untrusted_cert");
    assert_eq!(bad_signature.kind(), "signature_invalid");
}
