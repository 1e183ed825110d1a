//! Configuration for rtls-core
//!
//! Centralized configuration for the tracking engine: where the store
//! lives, how the server binds, and how contended writes are retried.

use serde::{Deserialize, Serialize};

/// System-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RtlsConfig {
    /// HTTP server settings
    pub server: ServerConfig,
    /// SQLite store settings
    pub store: StoreConfig,
    /// Kiosk scan feed settings
    pub scan: ScanConfig,
}

impl Default for RtlsConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            scan: ScanConfig::default(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address, host and port
    pub addr: String,
    /// How many times a handler retries a write that hit a busy store
    pub max_retries: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
            max_retries: 3,
        }
    }
}

/// SQLite store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file path, ":memory:" for an in-memory store
    pub path: String,
    /// How long a connection waits on a locked database before giving up
    pub busy_timeout_ms: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "rtls.db".to_string(),
            busy_timeout_ms: 5000,
        }
    }
}

/// Kiosk scan feed configuration
///
/// Defaults for feeds that do not name their own delimiters in the scan
/// request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Field delimiter for raw scanner lines, empty to take whole lines
    pub field_delimiter: String,
    /// Separator between scanner lines, empty to treat the payload as one
    pub line_separator: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            field_delimiter: ";".to_string(),
            line_separator: "\n".to_string(),
        }
    }
}

impl RtlsConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.path.is_empty() {
            return Err(ConfigError::MissingField(
                "store.path must not be empty".to_string(),
            ));
        }

        if self.server.addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::InvalidAddr(format!(
                "server.addr '{}' is not a host:port pair",
                self.server.addr
            )));
        }

        if self.store.busy_timeout_ms == 0 {
            return Err(ConfigError::OutOfRange(
                "store.busy_timeout_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Bind address cannot be parsed
    InvalidAddr(String),
    /// Value is out of valid range
    OutOfRange(String),
    /// Required field is missing
    MissingField(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidAddr(msg) => write!(f, "Invalid address: {}", msg),
            ConfigError::OutOfRange(msg) => write!(f, "Value out of range: {}", msg),
            ConfigError::MissingField(msg) => write!(f, "Missing field: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
