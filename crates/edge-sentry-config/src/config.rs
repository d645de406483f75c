// crates/edge-sentry-config/src/config.rs
// ============================================================================
// Module: Edge Sentry Configuration
// Description: Configuration loading and validation for Edge Sentry.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: edge-sentry-router, edge-sentry-verify, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path
//! limits. Missing or invalid configuration fails closed: the daemon
//! refuses to start rather than running with a partial trust or API
//! surface. Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use edge_sentry_router::ChannelValidation;
use edge_sentry_router::DEFAULT_CHANNEL_CAPACITY;
use edge_sentry_router::RouterConfig;
use edge_sentry_verify::SignerKeyPolicy;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "edge-sentry.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "EDGE_SENTRY_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Minimum allowed delivery channel capacity.
pub(crate) const MIN_CHANNEL_CAPACITY: usize = 1;
/// Maximum allowed delivery channel capacity.
pub(crate) const MAX_CHANNEL_CAPACITY: usize = 65_536;
/// Maximum control API key length.
pub(crate) const MAX_API_KEY_LENGTH: usize = 256;
/// Maximum broker delivery quality-of-service level.
pub(crate) const MAX_QOS: u8 = 2;
/// Default broker endpoint.
const DEFAULT_BROKER: &str = "tcp://localhost:1883";
/// Default broker client identity.
const DEFAULT_CLIENT_ID: &str = "edge-sentry";
/// Default status topic filter.
const DEFAULT_STATUS_TOPIC: &str = "status/up/+/+";
/// Default pubkey topic filter.
const DEFAULT_PUBKEY_TOPIC: &str = "pubkey/up/+/+";
/// Default control API bind address.
const DEFAULT_API_ADDRESS: &str = "127.0.0.1:8081";

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Edge Sentry daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EdgeSentryConfig {
    /// Broker transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Topic filters and channel validation configuration.
    #[serde(default)]
    pub topics: TopicsConfig,
    /// Trust pool and signer policy configuration.
    #[serde(default)]
    pub trust: TrustConfig,
    /// Control API server configuration.
    #[serde(default)]
    pub apiserver: ApiServerConfig,
    /// Audit log configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl EdgeSentryConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.transport.validate()?;
        self.topics.validate()?;
        self.trust.validate()?;
        self.apiserver.validate()?;
        self.audit.validate()?;
        Ok(())
    }

    /// Builds the router engine configuration from the loaded sections.
    #[must_use]
    pub fn router_config(&self) -> RouterConfig {
        let status_validation = match &self.topics.status_validator_key {
            Some(key_ref) if !key_ref.trim().is_empty() => ChannelValidation::Validated {
                key_ref: key_ref.trim().to_string(),
            },
            _ => ChannelValidation::AdvisoryOnly,
        };
        RouterConfig {
            status_topic: self.topics.status_topic.clone(),
            pubkey_topic: self.topics.pubkey_topic.clone(),
            status_validation,
            signer_key_policy: self.trust.signer_key_policy,
        }
    }
}

/// Broker transport configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Broker endpoint URI.
    #[serde(default = "default_broker")]
    pub broker: String,
    /// Client identity presented to the broker.
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Delivery quality-of-service level (0, 1, or 2).
    #[serde(default = "default_qos")]
    pub qos: u8,
    /// Bound for per-subscription delivery channels.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl TransportConfig {
    /// Validates transport settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.trim().is_empty() {
            return Err(ConfigError::Invalid("transport.broker must be non-empty".to_string()));
        }
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Invalid("transport.client_id must be non-empty".to_string()));
        }
        if self.qos > MAX_QOS {
            return Err(ConfigError::Invalid(format!("transport.qos must be <= {MAX_QOS}")));
        }
        if self.channel_capacity < MIN_CHANNEL_CAPACITY
            || self.channel_capacity > MAX_CHANNEL_CAPACITY
        {
            return Err(ConfigError::Invalid(format!(
                "transport.channel_capacity must be in {MIN_CHANNEL_CAPACITY}..={MAX_CHANNEL_CAPACITY}"
            )));
        }
        Ok(())
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            broker: default_broker(),
            client_id: default_client_id(),
            qos: default_qos(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Topic filters and channel validation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TopicsConfig {
    /// Topic filter for status report subscriptions.
    #[serde(default = "default_status_topic")]
    pub status_topic: String,
    /// Validator key reference for upstream status-channel validation.
    /// When absent the channel is advisory only.
    #[serde(default)]
    pub status_validator_key: Option<String>,
    /// Topic filter for public-key upload subscriptions.
    #[serde(default = "default_pubkey_topic")]
    pub pubkey_topic: String,
}

impl TopicsConfig {
    /// Validates topic settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on empty filters or a malformed
    /// validator key reference.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.status_topic.trim().is_empty() {
            return Err(ConfigError::Invalid("topics.status_topic must be non-empty".to_string()));
        }
        if self.pubkey_topic.trim().is_empty() {
            return Err(ConfigError::Invalid("topics.pubkey_topic must be non-empty".to_string()));
        }
        if let Some(key_ref) = &self.status_validator_key {
            validate_path_string("topics.status_validator_key", key_ref)?;
        }
        Ok(())
    }
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            status_topic: default_status_topic(),
            status_validator_key: None,
            pubkey_topic: default_pubkey_topic(),
        }
    }
}

/// Trust pool and signer policy configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrustConfig {
    /// Path to the PEM bundle of trusted CA certificates.
    #[serde(default)]
    pub ca_bundle: String,
    /// Key material policy for upload envelope verification.
    #[serde(default)]
    pub signer_key_policy: SignerKeyPolicy,
}

impl TrustConfig {
    /// Validates trust settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the CA bundle path is
    /// missing or malformed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("trust.ca_bundle", &self.ca_bundle)
    }
}

/// Control API server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiServerConfig {
    /// Plaintext bind addresses.
    #[serde(default = "default_api_addresses")]
    pub addresses: Vec<SocketAddr>,
    /// TLS bind addresses.
    #[serde(default)]
    pub tls_addresses: Vec<SocketAddr>,
    /// Shared API key required on every request.
    #[serde(default)]
    pub api_key: String,
    /// Path to the TLS certificate chain (required with TLS addresses).
    #[serde(default)]
    pub cert_file: Option<String>,
    /// Path to the TLS private key (required with TLS addresses).
    #[serde(default)]
    pub key_file: Option<String>,
}

impl ApiServerConfig {
    /// Validates API server settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when no listener is configured,
    /// the API key is missing or oversized, or TLS listeners lack key
    /// material.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.addresses.is_empty() && self.tls_addresses.is_empty() {
            return Err(ConfigError::Invalid(
                "apiserver requires at least one bind address".to_string(),
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid("apiserver.api_key must be non-empty".to_string()));
        }
        if self.api_key.len() > MAX_API_KEY_LENGTH {
            return Err(ConfigError::Invalid("apiserver.api_key exceeds max length".to_string()));
        }
        if !self.tls_addresses.is_empty() {
            let cert = self.cert_file.as_deref().unwrap_or_default();
            let key = self.key_file.as_deref().unwrap_or_default();
            validate_path_string("apiserver.cert_file", cert)?;
            validate_path_string("apiserver.key_file", key)?;
        }
        Ok(())
    }
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            addresses: default_api_addresses(),
            tls_addresses: Vec::new(),
            api_key: String::new(),
            cert_file: None,
            key_file: None,
        }
    }
}

/// Audit log configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    /// JSON-line audit log path; events go to stderr when absent.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on a malformed log path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.log_file {
            validate_path_string("audit.log_file", &path.to_string_lossy())?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default broker endpoint.
fn default_broker() -> String {
    DEFAULT_BROKER.to_string()
}

/// Default broker client identity.
fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

/// Default delivery quality-of-service level.
const fn default_qos() -> u8 {
    1
}

/// Default delivery channel capacity.
const fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

/// Default status topic filter.
fn default_status_topic() -> String {
    DEFAULT_STATUS_TOPIC.to_string()
}

/// Default pubkey topic filter.
fn default_pubkey_topic() -> String {
    DEFAULT_PUBKEY_TOPIC.to_string()
}

/// Default control API bind addresses.
fn default_api_addresses() -> Vec<SocketAddr> {
    DEFAULT_API_ADDRESS.parse().map_or_else(|_| Vec::new(), |addr| vec![addr])
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let path = Path::new(trimmed);
    for component in path.components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
