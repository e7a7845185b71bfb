//! # Configuration Management
//!
//! Centralized configuration for network channels.
//!
//! This module provides structured configuration for the channel state machine,
//! the shared packet pool, both transport bindings, and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`
//!
//! ## Limits
//! - `max_packet_size` bounds the length prefix accepted on the wire; it may never
//!   exceed [`MAX_PACKET_SIZE_LIMIT`]
//! - A zero heartbeat interval disables the heartbeat monitor

use crate::error::{ChannelError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Size in bytes of the length prefix in front of every packet.
pub const PACKET_HEADER_LENGTH: usize = 4;

/// Upper bound accepted for `max_packet_size` (16 MB).
pub const MAX_PACKET_SIZE_LIMIT: usize = 16 * 1024 * 1024;

/// Default maximum packet body size (64 KB).
pub const DEFAULT_MAX_PACKET_SIZE: usize = 64 * 1024;

/// Default interval between heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Default number of consecutive missed heartbeats tolerated.
pub const DEFAULT_MISSED_HEARTBEAT_THRESHOLD: u32 = 3;

/// Default timeout for socket connection attempts.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ChannelConfig {
    /// Channel state machine settings
    #[serde(default)]
    pub channel: ChannelSettings,

    /// Shared packet pool settings
    #[serde(default)]
    pub pool: PoolConfig,

    /// Async socket transport settings
    #[serde(default)]
    pub socket: SocketConfig,

    /// Bridge transport settings
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ChannelConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ChannelError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ChannelError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ChannelError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(size) = std::env::var("NETWORK_CHANNEL_MAX_PACKET_SIZE") {
            if let Ok(val) = size.parse::<usize>() {
                config.channel.max_packet_size = val;
            }
        }

        if let Ok(heartbeat) = std::env::var("NETWORK_CHANNEL_HEARTBEAT_INTERVAL_MS") {
            if let Ok(val) = heartbeat.parse::<u64>() {
                config.channel.heartbeat_interval = Duration::from_millis(val);
            }
        }

        if let Ok(threshold) = std::env::var("NETWORK_CHANNEL_MISSED_HEARTBEAT_THRESHOLD") {
            if let Ok(val) = threshold.parse::<u32>() {
                config.channel.missed_heartbeat_threshold = val;
            }
        }

        if let Ok(timeout) = std::env::var("NETWORK_CHANNEL_CONNECT_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.socket.connect_timeout = Duration::from_millis(val);
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ChannelError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ChannelError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.channel.validate());
        errors.extend(self.pool.validate());
        errors.extend(self.socket.validate());
        errors.extend(self.bridge.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ChannelError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Channel state machine settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelSettings {
    /// Largest body length accepted in a packet header
    pub max_packet_size: usize,

    /// Interval of the heartbeat monitor (zero disables it)
    #[serde(with = "duration_serde")]
    pub heartbeat_interval: Duration,

    /// Consecutive missed intervals that close the channel
    pub missed_heartbeat_threshold: u32,

    /// Whether a receive also restarts the current heartbeat interval
    pub reset_heartbeat_elapsed_on_receive: bool,

    /// Initial capacity of the receive buffer
    pub receive_buffer_size: usize,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            missed_heartbeat_threshold: DEFAULT_MISSED_HEARTBEAT_THRESHOLD,
            reset_heartbeat_elapsed_on_receive: true,
            receive_buffer_size: 8 * 1024,
        }
    }
}

impl ChannelSettings {
    /// Validate channel settings
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_packet_size == 0 {
            errors.push("Max packet size cannot be 0".to_string());
        } else if self.max_packet_size > MAX_PACKET_SIZE_LIMIT {
            errors.push(format!(
                "Max packet size too large: {} bytes (maximum: {} bytes)",
                self.max_packet_size, MAX_PACKET_SIZE_LIMIT
            ));
        }

        if !self.heartbeat_interval.is_zero() && self.heartbeat_interval.as_millis() < 10 {
            errors.push("Heartbeat interval too short (minimum: 10ms, or 0 to disable)".to_string());
        } else if self.heartbeat_interval.as_secs() > 3600 {
            errors.push("Heartbeat interval too long (maximum: 1 hour)".to_string());
        }

        if self.missed_heartbeat_threshold == 0 {
            errors.push("Missed heartbeat threshold must be greater than 0".to_string());
        }

        if self.receive_buffer_size < 64 {
            errors.push("Receive buffer size too small (minimum: 64 bytes)".to_string());
        }

        errors
    }
}

/// Shared packet pool settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Buffers preallocated when a packet kind is first used
    pub buffers_per_kind: usize,

    /// Capacity given to freshly allocated buffers
    pub initial_buffer_capacity: usize,

    /// Buffers that grew beyond this are freed instead of pooled
    pub max_pooled_buffer_size: usize,

    /// Idle buffers kept per packet kind
    pub max_buffers_per_kind: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            buffers_per_kind: 16,
            initial_buffer_capacity: 1024,
            max_pooled_buffer_size: 64 * 1024,
            max_buffers_per_kind: 256,
        }
    }
}

impl PoolConfig {
    /// Validate pool configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.buffers_per_kind > self.max_buffers_per_kind {
            errors.push(format!(
                "Preallocated buffers per kind ({}) exceed the per-kind limit ({})",
                self.buffers_per_kind, self.max_buffers_per_kind
            ));
        }

        if self.initial_buffer_capacity > self.max_pooled_buffer_size {
            errors.push(
                "Initial buffer capacity cannot be larger than max pooled buffer size".to_string(),
            );
        }

        errors
    }
}

/// Async socket transport settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SocketConfig {
    /// Timeout for connection attempts
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Disable Nagle's algorithm on connected sockets
    pub nodelay: bool,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            nodelay: true,
        }
    }
}

impl SocketConfig {
    /// Validate socket configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.connect_timeout.as_millis() < 100 {
            errors.push("Connection timeout too short (minimum: 100ms)".to_string());
        } else if self.connect_timeout.as_secs() > 300 {
            errors.push("Connection timeout too long (maximum: 300s)".to_string());
        }

        errors
    }
}

/// Bridge transport settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// URL scheme handed to the host connection (e.g. "ws")
    pub scheme: String,

    /// URL path appended after `host:port`
    pub path: String,

    /// Optional origin header value
    pub origin: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            scheme: String::from("ws"),
            path: String::from("/ws"),
            origin: None,
        }
    }
}

impl BridgeConfig {
    /// Validate bridge configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.scheme.is_empty() {
            errors.push("Bridge URL scheme cannot be empty".to_string());
        }

        if !self.path.is_empty() && !self.path.starts_with('/') {
            errors.push(format!("Bridge URL path must start with '/': '{}'", self.path));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,

    /// Whether to include span enter/exit events
    pub log_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("network-channel"),
            log_level: Level::INFO,
            json_format: false,
            log_spans: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
