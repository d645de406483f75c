// crates/edge-sentry-router/src/transport.rs
// ============================================================================
// Module: Edge Sentry Subscription Transport
// Description: Transport seam delivering inbound messages over bounded
//              channels.
// Purpose: Decouple the router engine from any concrete message broker.
// Dependencies: async-trait, bytes, tokio
// ============================================================================

//! ## Overview
//! The router engine consumes messages from a [`SubscriptionTransport`],
//! which hands back one bounded receiver per subscribed topic filter. The
//! seam keeps broker specifics (connection management, upstream channel
//! validation) out of the routing logic; an in-process
//! [`ChannelTransport`] backs tests and embedded deployments.
//! Invariants:
//! - Every subscription stream is bounded; a slow consumer exerts
//!   backpressure on publishers rather than growing memory.
//! - Filters use single-level (`+`) and multi-level (`#`) wildcards with
//!   the usual topic-segment semantics.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::PoisonError;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default bound for per-subscription delivery channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

// ============================================================================
// SECTION: Transport Errors
// ============================================================================

/// Errors raised by transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport could not establish the subscription.
    #[error("subscription failed for {filter}: {detail}")]
    SubscribeFailed {
        /// Topic filter that failed to subscribe.
        filter: String,
        /// Transport-specific failure detail.
        detail: String,
    },
    /// No active subscription matches the published topic.
    #[error("no subscriber for topic {0}")]
    NoSubscriber(String),
    /// The subscriber side of a delivery channel has gone away.
    #[error("delivery channel closed for {0}")]
    ChannelClosed(String),
}

// ============================================================================
// SECTION: Inbound Messages
// ============================================================================

/// A single message delivered by the transport.
///
/// # Invariants
/// - `validated` reflects whether the transport authenticated the
///   publishing channel; the router records bypasses when it is false.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Raw topic the message was published on.
    pub topic: String,
    /// Opaque payload bytes.
    pub payload: Bytes,
    /// True when the transport validated the publishing channel.
    pub validated: bool,
}

// ============================================================================
// SECTION: Transport Seam
// ============================================================================

/// Subscription transport delivering messages over bounded channels.
#[async_trait]
pub trait SubscriptionTransport: Send + Sync {
    /// Registers interest in a topic filter and returns the bounded
    /// stream of matching messages.
    ///
    /// `validator_key` names the key material the transport should use to
    /// authenticate publishers on this filter, when it supports upstream
    /// validation; transports without that capability ignore it and
    /// deliver messages with `validated` set to false.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::SubscribeFailed`] when the subscription
    /// cannot be established.
    async fn subscribe(
        &self,
        filter: &str,
        validator_key: Option<&str>,
    ) -> Result<mpsc::Receiver<InboundMessage>, TransportError>;
}

// ============================================================================
// SECTION: In-Process Transport
// ============================================================================

/// In-process transport routing published messages to subscribed filters.
///
/// # Invariants
/// - At most one subscription per filter; re-subscribing replaces the
///   previous delivery channel.
pub struct ChannelTransport {
    /// Bound applied to every delivery channel.
    capacity: usize,
    /// Active delivery senders keyed by topic filter.
    senders: Mutex<BTreeMap<String, mpsc::Sender<InboundMessage>>>,
}

impl ChannelTransport {
    /// Creates a transport with the given per-subscription channel bound.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            senders: Mutex::new(BTreeMap::new()),
        }
    }

    /// Publishes a message to the first subscription whose filter matches
    /// the topic, waiting for channel capacity when the stream is full.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NoSubscriber`] when no filter matches and
    /// [`TransportError::ChannelClosed`] when the matching subscriber has
    /// gone away.
    pub async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        self.publish_message(InboundMessage {
            topic: topic.to_string(),
            payload,
            validated: false,
        })
        .await
    }

    /// Publishes a message carrying an explicit channel-validation mark.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`ChannelTransport::publish`].
    pub async fn publish_message(&self, message: InboundMessage) -> Result<(), TransportError> {
        let sender = {
            let senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
            senders
                .iter()
                .find(|(filter, _)| filter_matches(filter, &message.topic))
                .map(|(_, sender)| sender.clone())
        };
        let Some(sender) = sender else {
            return Err(TransportError::NoSubscriber(message.topic));
        };
        let topic = message.topic.clone();
        sender
            .send(message)
            .await
            .map_err(|_| TransportError::ChannelClosed(topic))
    }
}

impl Default for ChannelTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

#[async_trait]
impl SubscriptionTransport for ChannelTransport {
    async fn subscribe(
        &self,
        filter: &str,
        _validator_key: Option<&str>,
    ) -> Result<mpsc::Receiver<InboundMessage>, TransportError> {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        senders.insert(filter.to_string(), sender);
        Ok(receiver)
    }
}

// ============================================================================
// SECTION: Filter Matching
// ============================================================================

/// Returns true when the topic matches the filter, segment by segment.
///
/// `+` matches exactly one segment, `#` matches the remainder of the
/// topic; all other segments must match literally.
#[must_use]
pub fn filter_matches(filter: &str, topic: &str) -> bool {
    let mut filter_segments = filter.split('/');
    let mut topic_segments = topic.split('/');
    loop {
        match (filter_segments.next(), topic_segments.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(expected), Some(actual)) if expected == actual => {}
            (None, None) => return true,
            _ => return false,
        }
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
        reason = "Test-only transport assertions."
    )]

    use bytes::Bytes;

    use super::ChannelTransport;
    use super::SubscriptionTransport;
    use super::TransportError;
    use super::filter_matches;

    #[test]
    fn filter_matches_literal_and_wildcards() {
        assert!(filter_matches("status/up/edge-1/agent", "status/up/edge-1/agent"));
        assert!(filter_matches("status/up/+/+", "status/up/edge-1/agent"));
        assert!(filter_matches("status/#", "status/up/edge-1/agent"));
        assert!(!filter_matches("status/up/+/+", "pubkey/up/edge-1/agent"));
        assert!(!filter_matches("status/up/+", "status/up/edge-1/agent"));
        assert!(!filter_matches("status/up/edge-1/agent", "status/up/edge-1"));
    }

    #[tokio::test]
    async fn publish_reaches_matching_subscription() {
        let transport = ChannelTransport::default();
        let mut stream = transport.subscribe("status/up/+/+", None).await.expect("subscribes");
        transport
            .publish("status/up/edge-1/agent", Bytes::from_static(b"{}"))
            .await
            .expect("publishes");
        let message = stream.recv().await.expect("message delivered");
        assert_eq!(message.topic, "status/up/edge-1/agent");
        assert!(!message.validated);
    }

    #[tokio::test]
    async fn publish_without_subscriber_is_an_error() {
        let transport = ChannelTransport::default();
        let err = transport
            .publish("status/up/edge-1/agent", Bytes::new())
            .await
            .expect_err("no subscriber");
        assert!(matches!(err, TransportError::NoSubscriber(_)));
    }

    #[tokio::test]
    async fn dropped_receiver_reports_closed_channel() {
        let transport = ChannelTransport::default();
        let stream = transport.subscribe("status/#", None).await.expect("subscribes");
        drop(stream);
        let err = transport
            .publish("status/up/edge-1/agent", Bytes::new())
            .await
            .expect_err("channel closed");
        assert!(matches!(err, TransportError::ChannelClosed(_)));
    }

    #[tokio::test]
    async fn resubscribe_replaces_previous_stream() {
        let transport = ChannelTransport::default();
        let first = transport.subscribe("status/#", None).await.expect("subscribes");
        let mut second = transport.subscribe("status/#", None).await.expect("resubscribes");
        drop(first);
        transport
            .publish("status/up/edge-1/agent", Bytes::new())
            .await
            .expect("publishes to replacement");
        assert!(second.recv().await.is_some());
    }
}
