// crates/edge-sentry-core/src/topic.rs
// ============================================================================
// Module: Edge Sentry Topics
// Description: Validation and decomposition of subscription topic strings.
// Purpose: Reject malformed topics before any handler sees the payload.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Inbound messages arrive tagged with a slash-delimited topic of exactly
//! four segments: `<category>/<direction>/<senderId>/<componentId>`. This
//! module decomposes the topic into a typed [`Topic`] value and rejects
//! anything else before a decoder or verifier is invoked.
//! Invariants:
//! - Parsing is pure and total over its input domain.
//! - A parsed [`Topic`] always carries four non-empty segments.
//! - The category is a closed enum; unknown categories never reach a handler.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Topic Errors
// ============================================================================

/// Errors returned by topic parsing.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    /// Topic does not have exactly four non-empty segments.
    #[error("invalid topic shape: {0}")]
    InvalidShape(String),
    /// First segment is not a recognized category for this daemon.
    #[error("unknown topic category: {0}")]
    UnknownCategory(String),
}

// ============================================================================
// SECTION: Topic Category
// ============================================================================

/// Message category selecting the handler pipeline.
///
/// # Invariants
/// - Variants are stable for audit labeling and dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicCategory {
    /// Periodic health/status reports from edge functions.
    Status,
    /// Public-key upload announcements.
    Pubkey,
}

impl TopicCategory {
    /// Returns the wire form of the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Pubkey => "pubkey",
        }
    }

    /// Parses a category segment.
    fn from_segment(segment: &str) -> Result<Self, TopicError> {
        match segment {
            "status" => Ok(Self::Status),
            "pubkey" => Ok(Self::Pubkey),
            other => Err(TopicError::UnknownCategory(other.to_string())),
        }
    }
}

impl fmt::Display for TopicCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Topic
// ============================================================================

/// Decomposed subscription topic.
///
/// # Invariants
/// - Constructed once per inbound message and never mutated.
/// - All segments are non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    /// Handler category from the first segment.
    pub category: TopicCategory,
    /// Transport-defined direction segment (e.g. `up`).
    pub direction: String,
    /// Stable identity of the publishing edge node.
    pub sender_id: String,
    /// Component within the sender that produced the message.
    pub component_id: String,
}

impl Topic {
    /// Parses a raw topic string into its four segments.
    ///
    /// # Errors
    ///
    /// Returns [`TopicError::InvalidShape`] when the topic does not have
    /// exactly four non-empty segments, and [`TopicError::UnknownCategory`]
    /// when the first segment is not a recognized category.
    pub fn parse(topic: &str) -> Result<Self, TopicError> {
        let segments: Vec<&str> = topic.split('/').collect();
        if segments.len() != 4 || segments.iter().any(|segment| segment.is_empty()) {
            return Err(TopicError::InvalidShape(topic.to_string()));
        }
        let category = TopicCategory::from_segment(segments[0])?;
        Ok(Self {
            category,
            direction: segments[1].to_string(),
            sender_id: segments[2].to_string(),
            component_id: segments[3].to_string(),
        })
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.category, self.direction, self.sender_id, self.component_id)
    }
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
        reason = "Test-only parsing assertions."
    )]

    use super::Topic;
    use super::TopicCategory;
    use super::TopicError;

    #[test]
    fn parse_accepts_well_formed_status_topic() {
        let topic = Topic::parse("status/up/edge-7/resolver").expect("topic parses");
        assert_eq!(topic.category, TopicCategory::Status);
        assert_eq!(topic.direction, "up");
        assert_eq!(topic.sender_id, "edge-7");
        assert_eq!(topic.component_id, "resolver");
    }

    #[test]
    fn parse_accepts_well_formed_pubkey_topic() {
        let topic = Topic::parse("pubkey/up/edge-9/agent").expect("topic parses");
        assert_eq!(topic.category, TopicCategory::Pubkey);
        assert_eq!(topic.sender_id, "edge-9");
    }

    #[test]
    fn parse_rejects_three_segment_topic() {
        let err = Topic::parse("bogus/up/x").expect_err("shape rejected");
        assert_eq!(err, TopicError::InvalidShape("bogus/up/x".to_string()));
    }

    #[test]
    fn parse_rejects_five_segment_topic() {
        let err = Topic::parse("status/up/edge-7/resolver/extra").expect_err("shape rejected");
        assert!(matches!(err, TopicError::InvalidShape(_)));
    }

    #[test]
    fn parse_rejects_empty_segment() {
        let err = Topic::parse("status//edge-7/resolver").expect_err("shape rejected");
        assert!(matches!(err, TopicError::InvalidShape(_)));
    }

    #[test]
    fn parse_rejects_unknown_category() {
        let err = Topic::parse("bogus/up/edge-7/resolver").expect_err("category rejected");
        assert_eq!(err, TopicError::UnknownCategory("bogus".to_string()));
    }

    #[test]
    fn display_round_trips_segments() {
        let topic = Topic::parse("pubkey/up/edge-9/agent").expect("topic parses");
        assert_eq!(topic.to_string(), "pubkey/up/edge-9/agent");
    }
}
