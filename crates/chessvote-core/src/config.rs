//! Configuration loading and typed config structures for Chessvote.
//!
//! The configuration lives in `chessvote-config.yaml` (or the path named by
//! `CHESSVOTE_CONFIG`). Every section is optional and falls back to the
//! built-in defaults: port 8080, a 15 second voting
//! window, one tick per second.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Default config file name, resolved relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "chessvote-config.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for {var}: {reason}")]
    Env {
        /// The environment variable name.
        var: &'static str,
        /// The rejected value.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A value parsed but is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChessvoteConfig {
    /// HTTP listener and CORS settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Voting round timing.
    #[serde(default)]
    pub voting: VotingConfig,

    /// Viewer `WebSocket` settings.
    #[serde(default)]
    pub websocket: WebSocketConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ChessvoteConfig {
    /// Load configuration from a YAML file, then apply environment
    /// overrides and validate.
    ///
    /// A missing file is not an error: defaults plus environment are used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or
    /// parsed, or if the resulting values are invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_yml::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string without touching the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Override values from process environment variables:
    ///
    /// - `CHESSVOTE_HOST` overrides `server.host`
    /// - `CHESSVOTE_PORT` overrides `server.port`
    /// - `CHESSVOTE_VOTING_DURATION` overrides `voting.default_duration_secs`
    /// - `CHESSVOTE_LOG_FORMAT` overrides `logging.format`
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] if a numeric override does not parse.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("CHESSVOTE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("CHESSVOTE_PORT") {
            self.server.port = port.parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Env {
                    var: "CHESSVOTE_PORT",
                    value: port.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(duration) = lookup("CHESSVOTE_VOTING_DURATION") {
            self.voting.default_duration_secs =
                duration.parse().map_err(|e: std::num::ParseIntError| {
                    ConfigError::Env {
                        var: "CHESSVOTE_VOTING_DURATION",
                        value: duration.clone(),
                        reason: e.to_string(),
                    }
                })?;
        }
        if let Some(format) = lookup("CHESSVOTE_LOG_FORMAT") {
            self.logging.format = format;
        }
        Ok(())
    }

    /// Reject values the session cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.voting.default_duration_secs == 0 {
            return Err(ConfigError::Invalid(
                "voting.default_duration_secs must be positive".to_owned(),
            ));
        }
        if self.voting.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "voting.tick_interval_ms must be positive".to_owned(),
            ));
        }
        if self.websocket.ping_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "websocket.ping_interval_secs must be positive".to_owned(),
            ));
        }
        if self.websocket.send_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "websocket.send_timeout_secs must be positive".to_owned(),
            ));
        }
        if self.websocket.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "websocket.queue_capacity must be positive".to_owned(),
            ));
        }
        match self.logging.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(ConfigError::Invalid(format!(
                "logging.format must be `pretty` or `json`, got `{other}`"
            ))),
        }
    }
}

/// HTTP listener and CORS settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSection {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS. `*` allows any origin.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// Voting round timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VotingConfig {
    /// Round length used when `POST /start-voting` carries no duration.
    #[serde(default = "default_duration_secs")]
    pub default_duration_secs: u32,

    /// Real-time milliseconds between countdown ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl VotingConfig {
    /// The countdown tick interval as a [`Duration`].
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            default_duration_secs: default_duration_secs(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

/// Viewer `WebSocket` settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebSocketConfig {
    /// Seconds between keepalive pings to each viewer.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Seconds a single frame write may take before the viewer is
    /// dropped.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,

    /// Events queued per viewer before it is dropped as stalled.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl WebSocketConfig {
    /// The keepalive interval as a [`Duration`].
    pub const fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// The per-frame write timeout as a [`Duration`].
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: default_ping_interval_secs(),
            send_timeout_secs: default_send_timeout_secs(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: `pretty` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8080
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_owned()]
}

const fn default_duration_secs() -> u32 {
    15
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_ping_interval_secs() -> u64 {
    10
}

const fn default_send_timeout_secs() -> u64 {
    10
}

const fn default_queue_capacity() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_log_format() -> String {
    "pretty".to_owned()
}
