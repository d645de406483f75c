// crates/edge-sentry-core/src/status.rs
// ============================================================================
// Module: Edge Sentry Health Reports
// Description: Health report model and status payload decoding.
// Purpose: Turn untrusted status payloads into typed, immutable reports.
// Dependencies: serde, serde_json, time, thiserror
// ============================================================================

//! ## Overview
//! Edge functions publish self-reported health as a JSON object carrying a
//! stable `functionId` and an ordered list of per-component entries. This
//! module decodes those payloads into [`HealthReport`] values. A report is
//! immutable once decoded and is superseded, never merged, by the next
//! report for the same function.
//! Invariants:
//! - Component order is preserved exactly as published.
//! - Decoding performs no cryptographic validation; channel validation
//!   policy is enforced by the subscription router.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Decode Errors
// ============================================================================

/// Errors returned when decoding a status payload.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is not well-formed for the expected schema or is missing
    /// required fields.
    #[error("malformed status payload: {0}")]
    MalformedPayload(String),
}

// ============================================================================
// SECTION: Component Outcome
// ============================================================================

/// Self-reported outcome for a single component.
///
/// # Invariants
/// - Variants are stable for audit labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Component is healthy.
    Ok,
    /// Component reported a warning.
    Warn,
    /// Component reported a failure.
    Fail,
}

impl Outcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Fail => "fail",
        }
    }
}

// ============================================================================
// SECTION: Health Report
// ============================================================================

/// Health entry for a single component of an edge function.
///
/// # Invariants
/// - Only the timestamp matching the current outcome is expected populated;
///   the others are carried through untouched when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatus {
    /// Component name within the reporting function.
    pub component: String,
    /// Reported outcome.
    pub status: Outcome,
    /// Free-text message accompanying the outcome.
    pub msg: String,
    /// Time of the last successful check, when reported.
    #[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub last_success: Option<OffsetDateTime>,
    /// Time of the last warning, when reported.
    #[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub last_warn: Option<OffsetDateTime>,
    /// Time of the last failure, when reported.
    #[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub last_fail: Option<OffsetDateTime>,
}

impl ComponentStatus {
    /// Returns the timestamp matching the current outcome, when populated.
    #[must_use]
    pub const fn outcome_time(&self) -> Option<OffsetDateTime> {
        match self.status {
            Outcome::Ok => self.last_success,
            Outcome::Warn => self.last_warn,
            Outcome::Fail => self.last_fail,
        }
    }
}

/// One edge function's self-reported health.
///
/// # Invariants
/// - Immutable once decoded.
/// - Superseded, not merged, by the next report for the same `function_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Stable identity of the reporting function.
    pub function_id: String,
    /// Ordered component entries as published.
    pub component_status: Vec<ComponentStatus>,
}

impl HealthReport {
    /// Decodes a raw status payload into a health report.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MalformedPayload`] when the payload is not
    /// well-formed JSON for the expected schema or the `functionId` is
    /// empty.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let report: Self = serde_json::from_slice(payload)
            .map_err(|err| DecodeError::MalformedPayload(err.to_string()))?;
        if report.function_id.is_empty() {
            return Err(DecodeError::MalformedPayload("empty functionId".to_string()));
        }
        Ok(report)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
