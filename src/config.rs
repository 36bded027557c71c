//! # Configuration Management
//!
//! Centralized configuration for sessions, the cipher stack, keep-alive and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`
//!
//! Durations are written as integer milliseconds.

use crate::core::codec::MAX_FRAME_PAYLOAD;
use crate::crypto::rolling_iv::RollingIvFactory;
use crate::crypto::transform::{SubstitutionTable, DEFAULT_INITIAL_IV, IV_LENGTH};
use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Protocol version announced in the hello and mixed into every header
pub const PROTOCOL_VERSION: u16 = 83;

/// Default period between keep-alive pings
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(15_000);

/// Default number of unanswered pings tolerated before disconnecting
pub const MISSED_PINGS_ALLOWED: u32 = 3;

/// Default time allowed for the hello exchange
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub crypto: CryptoConfig,

    #[serde(default)]
    pub keepalive: KeepAliveConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetworkConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults overridden by `GAMEWIRE_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(version) = std::env::var("GAMEWIRE_PROTOCOL_VERSION") {
            config.crypto.version = version.parse::<u16>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid GAMEWIRE_PROTOCOL_VERSION: {e}"))
            })?;
        }

        if let Ok(flag) = std::env::var("GAMEWIRE_CUSTOM_CRYPTO") {
            config.crypto.custom_crypto = matches!(flag.as_str(), "1" | "true" | "yes");
        }

        if let Ok(interval) = std::env::var("GAMEWIRE_KEEPALIVE_INTERVAL_MS") {
            if let Ok(val) = interval.parse::<u64>() {
                config.keepalive.interval = Duration::from_millis(val);
            }
        }

        if let Ok(timeout) = std::env::var("GAMEWIRE_HANDSHAKE_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.session.handshake_timeout = Duration::from_millis(val);
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
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.session.validate());
        errors.extend(self.crypto.validate());
        errors.extend(self.keepalive.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Per-connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Time allowed for the hello exchange
    #[serde(with = "duration_serde")]
    pub handshake_timeout: Duration,

    /// Largest packet payload accepted in either direction
    pub max_packet_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: HANDSHAKE_TIMEOUT,
            max_packet_size: MAX_FRAME_PAYLOAD,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.handshake_timeout.as_millis() < 100 {
            errors.push("Handshake timeout too short (minimum: 100ms)".to_string());
        } else if self.handshake_timeout.as_secs() > 120 {
            errors.push("Handshake timeout too long (maximum: 120s)".to_string());
        }

        if self.max_packet_size == 0 {
            errors.push("Max packet size cannot be 0".to_string());
        } else if self.max_packet_size > MAX_FRAME_PAYLOAD {
            errors.push(format!(
                "Max packet size too large: {} bytes (header limit: {MAX_FRAME_PAYLOAD})",
                self.max_packet_size
            ));
        }

        errors
    }
}

/// Cipher stack settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CryptoConfig {
    /// Protocol version announced in the hello
    pub version: u16,

    /// Patch location string announced in the hello
    pub patch_location: String,

    /// Locale byte announced in the hello
    pub locale: u8,

    /// Layer the six-round cipher under the rolling cipher
    pub custom_crypto: bool,

    /// IV every per-packet shuffle starts from
    pub initial_iv: [u8; IV_LENGTH],
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            version: PROTOCOL_VERSION,
            patch_location: String::from("1"),
            locale: 8,
            custom_crypto: false,
            initial_iv: DEFAULT_INITIAL_IV,
        }
    }
}

impl CryptoConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.version == 0 {
            errors.push("Protocol version cannot be 0".to_string());
        }

        if self.patch_location.len() > 64 {
            errors.push(format!(
                "Patch location too long: {} bytes (maximum: 64)",
                self.patch_location.len()
            ));
        }

        errors
    }

    /// Rolling IV factory over the built-in substitution table.
    pub fn factory(&self) -> RollingIvFactory {
        RollingIvFactory::kmst(SubstitutionTable::standard(), self.initial_iv, self.version)
    }
}

/// Keep-alive settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeepAliveConfig {
    /// Period between pings
    #[serde(with = "duration_serde")]
    pub interval: Duration,

    /// Unanswered pings tolerated before disconnecting
    pub missed_pings_allowed: u32,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            interval: KEEPALIVE_INTERVAL,
            missed_pings_allowed: MISSED_PINGS_ALLOWED,
        }
    }
}

impl KeepAliveConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.interval.as_millis() < 100 {
            errors.push("Keep-alive interval too short (minimum: 100ms)".to_string());
        } else if self.interval.as_secs() > 3600 {
            errors.push("Keep-alive interval too long (maximum: 1 hour)".to_string());
        }

        if self.missed_pings_allowed == 0 {
            errors.push("Missed pings allowed must be greater than 0".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("gamewire"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
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

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
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
