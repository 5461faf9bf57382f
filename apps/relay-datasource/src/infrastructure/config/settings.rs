//! Relay Configuration Settings
//!
//! Configuration types for the relay, loaded from environment variables.
//! The upstream credential is only ever read from the environment; it is
//! never given a default.

use std::time::Duration;

use crate::application::services::{DEFAULT_QUEUE_DEPTH, ReconnectConfig};
use crate::domain::streaming::{BearerToken, DEFAULT_MAX_FRAME_BYTES, UpstreamEndpoint};

const UPSTREAM_URL: &str = "RELAY_UPSTREAM_URL";
const UPSTREAM_TOKEN: &str = "RELAY_UPSTREAM_TOKEN";
const UPSTREAM_ORIGIN: &str = "RELAY_UPSTREAM_ORIGIN";
const UPSTREAM_SUBPROTOCOL: &str = "RELAY_UPSTREAM_SUBPROTOCOL";

/// Default datasource identifier.
pub const DEFAULT_DATASOURCE_UID: &str = "relay";

/// Upstream websocket settings.
#[derive(Debug, Clone, PartialEq)]
pub struct WebSocketSettings {
    /// Largest accepted upstream message in bytes.
    pub max_frame_bytes: usize,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 0,
        }
    }
}

impl WebSocketSettings {
    /// Backoff settings for the supervisor.
    #[must_use]
    pub fn reconnect_config(&self) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: self.reconnect_delay_initial,
            max_delay: self.reconnect_delay_max,
            multiplier: self.reconnect_delay_multiplier,
            max_attempts: self.max_reconnect_attempts,
            ..ReconnectConfig::default()
        }
    }
}

/// Relay channel settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    /// Per-subscriber queue depth.
    pub subscriber_queue_depth: usize,
    /// Datasource identifier used in channel addresses.
    pub datasource_uid: String,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            subscriber_queue_depth: DEFAULT_QUEUE_DEPTH,
            datasource_uid: DEFAULT_DATASOURCE_UID.to_string(),
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSettings {
    /// Datasource API port.
    pub api_port: u16,
    /// Health check HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            api_port: 3000,
            health_port: 8082,
        }
    }
}

/// Complete relay configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    /// Upstream endpoint, including the credential.
    pub endpoint: UpstreamEndpoint,
    /// Upstream websocket settings.
    pub websocket: WebSocketSettings,
    /// Relay channel settings.
    pub relay: RelaySettings,
    /// Server port settings.
    pub server: ServerSettings,
}

impl RelayConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream address or token is missing or
    /// invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream address or token is missing or
    /// invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = required(&lookup, UPSTREAM_URL)?;
        let token = required(&lookup, UPSTREAM_TOKEN)?;

        let token = BearerToken::new(token).map_err(|e| ConfigError::Invalid {
            key: UPSTREAM_TOKEN.to_string(),
            reason: e.to_string(),
        })?;
        let mut endpoint = UpstreamEndpoint::new(url, token).map_err(|e| ConfigError::Invalid {
            key: UPSTREAM_URL.to_string(),
            reason: e.to_string(),
        })?;
        if let Some(origin) = lookup(UPSTREAM_ORIGIN) {
            endpoint = endpoint.with_origin(origin);
        }
        if let Some(subprotocol) = lookup(UPSTREAM_SUBPROTOCOL) {
            endpoint = endpoint.with_subprotocol(subprotocol);
        }

        let defaults = WebSocketSettings::default();
        let initial_ms = parse_or(
            &lookup,
            "RELAY_RECONNECT_DELAY_INITIAL_MS",
            millis(defaults.reconnect_delay_initial),
        );
        let reconnect_delay_initial = if initial_ms == 0 {
            defaults.reconnect_delay_initial
        } else {
            Duration::from_millis(initial_ms)
        };
        let multiplier = parse_or(
            &lookup,
            "RELAY_RECONNECT_DELAY_MULTIPLIER",
            defaults.reconnect_delay_multiplier,
        );
        let websocket = WebSocketSettings {
            max_frame_bytes: parse_or(&lookup, "RELAY_MAX_FRAME_BYTES", defaults.max_frame_bytes),
            reconnect_delay_initial,
            reconnect_delay_max: Duration::from_secs(parse_or(
                &lookup,
                "RELAY_RECONNECT_DELAY_MAX_SECS",
                defaults.reconnect_delay_max.as_secs(),
            ))
            .max(reconnect_delay_initial),
            reconnect_delay_multiplier: if multiplier.is_finite() {
                multiplier.max(1.0)
            } else {
                defaults.reconnect_delay_multiplier
            },
            max_reconnect_attempts: parse_or(
                &lookup,
                "RELAY_MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            ),
        };

        let relay = RelaySettings {
            subscriber_queue_depth: parse_or(
                &lookup,
                "RELAY_SUBSCRIBER_QUEUE_DEPTH",
                DEFAULT_QUEUE_DEPTH,
            )
            .max(1),
            datasource_uid: lookup("RELAY_DATASOURCE_UID")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DATASOURCE_UID.to_string()),
        };

        let server_defaults = ServerSettings::default();
        let server = ServerSettings {
            api_port: parse_or(&lookup, "RELAY_API_PORT", server_defaults.api_port),
            health_port: parse_or(&lookup, "RELAY_HEALTH_PORT", server_defaults.health_port),
        };

        Ok(Self {
            endpoint,
            websocket,
            relay,
            server,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has an unusable value.
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// Variable name.
        key: String,
        /// What is wrong with it.
        reason: String,
    },
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
