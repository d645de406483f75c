// crates/edge-sentry-core/src/audit.rs
// ============================================================================
// Module: Edge Sentry Audit Logging
// Description: Structured audit events for message handling outcomes.
// Purpose: Emit normalized JSON-line events without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! This module defines the normalized events the subscription router emits
//! for accepted reports, verified key uploads, and rejected messages, plus
//! the [`AuditSink`] seam and reference sinks. It is intentionally
//! lightweight so deployments can route events to their preferred logging
//! pipeline without redesign.
//! Invariants:
//! - Events never carry key material or payload bytes; only labels and
//!   derived metadata are recorded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use time::format_description::well_known::Rfc3339;

use crate::status::HealthReport;
use crate::topic::Topic;

// ============================================================================
// SECTION: Event Types
// ============================================================================

/// Per-component line recorded for an accepted status report.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentLine {
    /// Component name.
    pub component: String,
    /// Outcome label (`ok`, `warn`, `fail`).
    pub status: &'static str,
    /// Free-text message from the report.
    pub msg: String,
    /// RFC3339 time matching the outcome, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome_time: Option<String>,
}

/// Normalized audit event emitted by the router.
///
/// # Invariants
/// - The `event` tag is stable for downstream log pipelines.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A status report was decoded and applied to the cache.
    StatusAccepted {
        /// Event time in milliseconds since the Unix epoch.
        timestamp_ms: u128,
        /// Publishing edge node identity from the topic.
        sender_id: String,
        /// Publishing component from the topic.
        component_id: String,
        /// Function identity carried in the report.
        function_id: String,
        /// True when the channel was validated upstream.
        validated: bool,
        /// Per-component outcome lines.
        components: Vec<ComponentLine>,
    },
    /// A public-key upload passed certificate and signature verification.
    PubkeyVerified {
        /// Event time in milliseconds since the Unix epoch.
        timestamp_ms: u128,
        /// Publishing edge node identity from the topic.
        sender_id: String,
        /// Publishing component from the topic.
        component_id: String,
        /// Subject of the verified client certificate.
        subject: String,
    },
    /// A message was dropped; the router continues.
    MessageRejected {
        /// Event time in milliseconds since the Unix epoch.
        timestamp_ms: u128,
        /// Raw topic the message arrived on.
        topic: String,
        /// Sender identity when the topic parsed far enough to know it.
        #[serde(skip_serializing_if = "Option::is_none")]
        sender_id: Option<String>,
        /// Stable failure kind label.
        kind: &'static str,
        /// Human-readable failure detail.
        detail: String,
    },
    /// A status report was accepted on a channel with no upstream
    /// validation configured; the payload is advisory only.
    ValidationBypassed {
        /// Event time in milliseconds since the Unix epoch.
        timestamp_ms: u128,
        /// Raw topic the message arrived on.
        topic: String,
        /// Publishing edge node identity from the topic.
        sender_id: String,
    },
}

impl AuditEvent {
    /// Builds a status-accepted event from a decoded report.
    #[must_use]
    pub fn status_accepted(topic: &Topic, report: &HealthReport, validated: bool) -> Self {
        let components = report
            .component_status
            .iter()
            .map(|entry| ComponentLine {
                component: entry.component.clone(),
                status: entry.status.as_str(),
                msg: entry.msg.clone(),
                outcome_time: entry
                    .outcome_time()
                    .and_then(|when| when.format(&Rfc3339).ok()),
            })
            .collect();
        Self::StatusAccepted {
            timestamp_ms: now_ms(),
            sender_id: topic.sender_id.clone(),
            component_id: topic.component_id.clone(),
            function_id: report.function_id.clone(),
            validated,
            components,
        }
    }

    /// Builds a pubkey-verified event.
    #[must_use]
    pub fn pubkey_verified(topic: &Topic, subject: impl Into<String>) -> Self {
        Self::PubkeyVerified {
            timestamp_ms: now_ms(),
            sender_id: topic.sender_id.clone(),
            component_id: topic.component_id.clone(),
            subject: subject.into(),
        }
    }

    /// Builds a message-rejected event.
    #[must_use]
    pub fn message_rejected(
        topic: impl Into<String>,
        sender_id: Option<String>,
        kind: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        Self::MessageRejected {
            timestamp_ms: now_ms(),
            topic: topic.into(),
            sender_id,
            kind,
            detail: detail.into(),
        }
    }

    /// Builds a validation-bypassed event.
    #[must_use]
    pub fn validation_bypassed(topic: &Topic) -> Self {
        Self::ValidationBypassed {
            timestamp_ms: now_ms(),
            topic: topic.to_string(),
            sender_id: topic.sender_id.clone(),
        }
    }
}

/// Returns milliseconds since the Unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_millis())
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for router events.
pub trait AuditSink: Send + Sync {
    /// Records a normalized audit event.
    fn record(&self, event: &AuditEvent);
}

/// Append-only JSON-line file sink.
///
/// # Invariants
/// - Each event is written as one line; write failures are swallowed so a
///   full disk never interrupts message processing.
pub struct FileAuditSink {
    /// Open log file guarded for concurrent writers.
    file: Mutex<File>,
}

impl FileAuditSink {
    /// Opens (or creates) the audit log in append mode.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] when the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, io::Error> {
        let file = OpenOptions::new().append(true).create(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(line) = serde_json::to_string(event) {
            let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = writeln!(file, "{line}");
        }
    }
}

/// JSON-line sink writing to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(line) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{line}");
        }
    }
}

/// Sink that discards all events.
///
/// # Invariants
/// - Events are intentionally discarded.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &AuditEvent) {}
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
        reason = "Test-only audit serialization assertions."
    )]

    use std::fs;
    use std::sync::Arc;
    use std::sync::Mutex;

    use super::AuditEvent;
    use super::AuditSink;
    use super::FileAuditSink;
    use crate::status::HealthReport;
    use crate::topic::Topic;

    /// Collecting sink used by router tests as well.
    #[derive(Default)]
    struct VecSink {
        /// Recorded events.
        events: Arc<Mutex<Vec<AuditEvent>>>,
    }

    impl AuditSink for VecSink {
        fn record(&self, event: &AuditEvent) {
            if let Ok(mut events) = self.events.lock() {
                events.push(event.clone());
            }
        }
    }

    #[test]
    fn status_accepted_records_sender_component_and_outcome_lines() {
        let topic = Topic::parse("status/up/edge-7/resolver").expect("topic parses");
        let report = HealthReport::decode(
            br#"{"functionId":"edge-7","componentStatus":[
                {"component":"resolver","status":"ok","msg":"fine",
                 "lastSuccess":"2026-08-30T10:00:00Z"}]}"#,
        )
        .expect("report decodes");
        let event = AuditEvent::status_accepted(&topic, &report, true);
        let json = serde_json::to_value(&event).expect("event serializes");
        assert_eq!(json["event"], "status_accepted");
        assert_eq!(json["sender_id"], "edge-7");
        assert_eq!(json["component_id"], "resolver");
        assert_eq!(json["components"][0]["status"], "ok");
        assert_eq!(json["components"][0]["outcome_time"], "2026-08-30T10:00:00Z");
    }

    #[test]
    fn message_rejected_serializes_failure_kind() {
        let event =
            AuditEvent::message_rejected("bogus/up/x", None, "invalid_topic", "3 segments");
        let json = serde_json::to_value(&event).expect("event serializes");
        assert_eq!(json["event"], "message_rejected");
        assert_eq!(json["kind"], "invalid_topic");
        assert!(json.get("sender_id").is_none());
    }

    #[test]
    fn file_sink_appends_one_line_per_event() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("audit.log");
        let sink = FileAuditSink::open(&path).expect("sink opens");
        let topic = Topic::parse("pubkey/up/edge-9/agent").expect("topic parses");
        sink.record(&AuditEvent::pubkey_verified(&topic, "CN=edge-9"));
        sink.record(&AuditEvent::validation_bypassed(&topic));
        let contents = fs::read_to_string(&path).expect("log readable");
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.lines().next().map_or(false, |line| line.contains("pubkey_verified")));
    }

    #[test]
    fn vec_sink_collects_events() {
        let sink = VecSink::default();
        let topic = Topic::parse("pubkey/up/edge-9/agent").expect("topic parses");
        sink.record(&AuditEvent::pubkey_verified(&topic, "CN=edge-9"));
        assert_eq!(sink.events.lock().expect("events lock").len(), 1);
    }
}
