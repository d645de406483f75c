// crates/edge-sentry-core/src/command.rs
// ============================================================================
// Module: Edge Sentry Control Commands
// Description: Closed command model and response bodies for the control API.
// Purpose: Map command strings to a total set of handler behaviors.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The control API accepts command-style requests. Commands form a closed
//! enum with a total mapping to handler behavior; unknown values are a
//! distinct, explicit error echoed back in the response body. Error
//! signaling is carried in the body's `error` flag, never in the HTTP
//! status code.
//! Invariants:
//! - `ControlCommand::parse` accepts exactly the wire forms returned by
//!   [`ControlCommand::as_str`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Commands supported by the control API.
///
/// # Invariants
/// - Variants are stable wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlCommand {
    /// Daemon liveness/status inquiry.
    Status,
    /// Request daemon shutdown.
    Stop,
    /// Start the subscription engine.
    MqttStart,
    /// Stop the subscription engine.
    MqttStop,
}

impl ControlCommand {
    /// Returns the wire form of the command.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Stop => "stop",
            Self::MqttStart => "mqtt-start",
            Self::MqttStop => "mqtt-stop",
        }
    }

    /// Parses a raw command string, returning the unrecognized name on
    /// failure so callers can echo it back.
    ///
    /// # Errors
    ///
    /// Returns the unrecognized command name when the value is not a
    /// supported command.
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw {
            "status" => Ok(Self::Status),
            "stop" => Ok(Self::Stop),
            "mqtt-start" => Ok(Self::MqttStart),
            "mqtt-stop" => Ok(Self::MqttStop),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Request/Response Bodies
// ============================================================================

/// Command request body posted to `/command` and `/debug`.
///
/// # Invariants
/// - The command is kept as a raw string so unknown values can be echoed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Raw command name.
    pub command: String,
}

/// Structured command response body.
///
/// # Invariants
/// - `error_msg` is non-empty exactly when `error` is true.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    /// Daemon-reported status label.
    pub status: String,
    /// Human-readable message.
    pub msg: String,
    /// True when the request failed.
    pub error: bool,
    /// Failure description when `error` is true.
    pub error_msg: String,
}

impl CommandResponse {
    /// Builds a success response.
    #[must_use]
    pub fn ok(status: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            msg: msg.into(),
            error: false,
            error_msg: String::new(),
        }
    }

    /// Builds an error response carrying the failure description.
    #[must_use]
    pub fn err(error_msg: impl Into<String>) -> Self {
        Self {
            status: String::new(),
            msg: String::new(),
            error: true,
            error_msg: error_msg.into(),
        }
    }

    /// Builds the error response for an unrecognized command name.
    #[must_use]
    pub fn unknown_command(name: &str) -> Self {
        Self::err(format!("Unknown command: {name}"))
    }
}

/// Liveness response body for `/ping`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResponse {
    /// Daemon name.
    pub daemon: String,
    /// Fixed acknowledgment label.
    pub status: String,
    /// Boot time as an RFC3339 string.
    pub boot_time: String,
    /// Seconds since boot.
    pub uptime_seconds: u64,
}

// ============================================================================
// SECTION: Tests
// ============================================================================
