//! Client configuration parsed from environment variables.

use std::{fmt, time::Duration};

use crate::error::ConfigError;

/// Environment variable holding the server base URL.
pub const API_URL_ENV: &str = "ROOKLINE_API_URL";
/// Environment variable holding the connect timeout in milliseconds (`0` disables it).
pub const CONNECT_TIMEOUT_ENV: &str = "ROOKLINE_CONNECT_TIMEOUT_MS";
/// Environment variable toggling whether `lobby:create` waits for the server ack.
pub const AWAIT_LOBBY_ACK_ENV: &str = "ROOKLINE_AWAIT_LOBBY_ACK";

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 20_000;

/// Server-side namespace a channel is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Lobby,
    Game,
}

impl Namespace {
    /// Namespace path as used in URLs and Socket.IO packets
    pub fn path(&self) -> &'static str {
        match self {
            Namespace::Lobby => "/lobby",
            Namespace::Game => "/game",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Base URL plus namespace: one logical channel of one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base_url: String,
    namespace: Namespace,
}

impl Endpoint {
    pub fn new(base_url: impl Into<String>, namespace: Namespace) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            namespace,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Full endpoint URL, e.g. `http://localhost:3000/lobby`
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, self.namespace.path())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Automatic reconnection policy handed to the transport.
///
/// Delays double from `initial_delay` and are capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Policy that never reconnects.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Delay before the given reconnection attempt (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether another attempt is allowed after `attempts_made` failures.
    pub fn allows(&self, attempts_made: u32) -> bool {
        self.enabled && attempts_made < self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
            max_attempts: 5,
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server base URL (without namespace)
    pub base_url: String,
    /// Reconnection policy shared by both channels
    pub reconnect: ReconnectPolicy,
    /// Upper bound on a single `connect()`; `None` waits for the transport
    pub connect_timeout: Option<Duration>,
    /// Whether `lobby:create` waits for the server's acknowledgment
    pub await_lobby_ack: bool,
}

impl ClientConfig {
    /// Create a configuration for the given base URL with default settings.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConfigError> {
        let base_url = base_url.into();
        validate_base_url(&base_url)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        })
    }

    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(API_URL_ENV)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut config = Self::new(base_url.trim())?;

        if let Some(value) = lookup(CONNECT_TIMEOUT_ENV) {
            let millis: u64 = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: CONNECT_TIMEOUT_ENV.to_string(),
                value: value.clone(),
            })?;
            config.connect_timeout = (millis > 0).then(|| Duration::from_millis(millis));
        }

        if let Some(value) = lookup(AWAIT_LOBBY_ACK_ENV) {
            config.await_lobby_ack = parse_flag(&value).ok_or(ConfigError::InvalidValue {
                key: AWAIT_LOBBY_ACK_ENV.to_string(),
                value,
            })?;
        }

        Ok(config)
    }

    /// Endpoint of the given namespace on the configured server.
    pub fn endpoint(&self, namespace: Namespace) -> Endpoint {
        Endpoint::new(self.base_url.clone(), namespace)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            reconnect: ReconnectPolicy::default(),
            connect_timeout: Some(Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS)),
            await_lobby_ack: false,
        }
    }
}

fn validate_base_url(base_url: &str) -> Result<(), ConfigError> {
    let supported = ["http://", "https://", "ws://", "wss://"];
    let has_host = supported
        .iter()
        .find_map(|scheme| base_url.strip_prefix(scheme))
        .is_some_and(|rest| !rest.is_empty());

    if has_host {
        Ok(())
    } else {
        Err(ConfigError::UnsupportedScheme(base_url.to_string()))
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
