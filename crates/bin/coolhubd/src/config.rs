//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `coolhub.toml` in the working directory (or the path in
//! `COOLHUB_CONFIG`). Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use std::time::Duration;

use coolhub_adapter_mqtt::MqttConfig;
use coolhub_app::backoff::RetryPolicy;
use coolhub_app::coordinator::CoordinatorConfig;
use coolhub_domain::policy::HysteresisPolicy;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Control loop settings.
    pub control: ControlConfig,
    /// Broker settings.
    pub mqtt: MqttConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Thresholds and timings of the control loop.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Fan turns ON at or above this temperature (°C).
    pub t_high: f64,
    /// Fan turns OFF at or below this temperature (°C).
    pub t_low: f64,
    /// Tolerated backwards skew of reading timestamps, in seconds.
    pub stale_timestamp_skew_secs: u64,
    /// Manual override lifetime, in seconds.
    pub override_ttl_secs: u64,
    /// Capacity of the inbound message queue.
    pub queue_capacity: usize,
    pub persist_retry: RetryConfig,
}

/// Retry policy for control log appends.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
    pub max_connections: u32,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `coolhub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("COOLHUB_CONFIG").unwrap_or_else(|_| "coolhub.toml".to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    /// Apply overrides looked up through `var` (the process environment in
    /// production). Unparseable numbers are ignored.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("COOLHUB_T_HIGH")
            && let Ok(value) = val.parse()
        {
            self.control.t_high = value;
        }
        if let Some(val) = var("COOLHUB_T_LOW")
            && let Ok(value) = val.parse()
        {
            self.control.t_low = value;
        }
        if let Some(val) = var("COOLHUB_OVERRIDE_TTL_SECS")
            && let Ok(value) = val.parse()
        {
            self.control.override_ttl_secs = value;
        }
        if let Some(val) = var("COOLHUB_STALE_TIMESTAMP_SKEW_SECS")
            && let Ok(value) = val.parse()
        {
            self.control.stale_timestamp_skew_secs = value;
        }
        if let Some(val) = var("COOLHUB_MQTT_HOST") {
            self.mqtt.broker_host = val;
        }
        if let Some(val) = var("COOLHUB_MQTT_PORT")
            && let Ok(port) = val.parse()
        {
            self.mqtt.broker_port = port;
        }
        if let Some(val) = var("COOLHUB_MQTT_CLIENT_ID") {
            self.mqtt.client_id = val;
        }
        if let Some(val) = var("COOLHUB_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = var("COOLHUB_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.policy()?;
        if self.control.override_ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "override_ttl_secs must be non-zero".to_string(),
            ));
        }
        if self.control.stale_timestamp_skew_secs == 0 {
            return Err(ConfigError::Validation(
                "stale_timestamp_skew_secs must be non-zero".to_string(),
            ));
        }
        if self.control.queue_capacity == 0 {
            return Err(ConfigError::Validation(
                "queue_capacity must be non-zero".to_string(),
            ));
        }
        let retry = &self.control.persist_retry;
        if retry.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "persist_retry.max_attempts must be non-zero".to_string(),
            ));
        }
        if retry.initial_delay_ms > retry.max_delay_ms {
            return Err(ConfigError::Validation(
                "persist_retry.initial_delay_ms must not exceed max_delay_ms".to_string(),
            ));
        }
        if self.mqtt.broker_port == 0 {
            return Err(ConfigError::Validation(
                "mqtt port must be non-zero".to_string(),
            ));
        }
        if self.mqtt.keep_alive_secs == 0 {
            return Err(ConfigError::Validation(
                "mqtt keep_alive_secs must be non-zero".to_string(),
            ));
        }
        if self.mqtt.reconnect_min_ms == 0 || self.mqtt.reconnect_min_ms > self.mqtt.reconnect_max_ms
        {
            return Err(ConfigError::Validation(
                "mqtt reconnect backoff must satisfy 0 < min <= max".to_string(),
            ));
        }
        Ok(())
    }

    fn policy(&self) -> Result<HysteresisPolicy, ConfigError> {
        HysteresisPolicy::new(self.control.t_low, self.control.t_high)
            .map_err(|err| ConfigError::Validation(err.to_string()))
    }

    /// Build the coordinator configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the thresholds are invalid.
    pub fn coordinator(&self) -> Result<CoordinatorConfig, ConfigError> {
        let retry = &self.control.persist_retry;
        Ok(CoordinatorConfig {
            policy: self.policy()?,
            stale_timestamp_skew: Duration::from_secs(self.control.stale_timestamp_skew_secs),
            override_ttl: Duration::from_secs(self.control.override_ttl_secs),
            persist_retry: RetryPolicy {
                max_attempts: retry.max_attempts,
                initial_delay: Duration::from_millis(retry.initial_delay_ms),
                max_delay: Duration::from_millis(retry.max_delay_ms),
            },
        })
    }

    /// Return the storage adapter configuration.
    #[must_use]
    pub fn storage(&self) -> coolhub_adapter_storage_sqlite_sqlx::Config {
        coolhub_adapter_storage_sqlite_sqlx::Config {
            database_url: self.database.url.clone(),
            max_connections: self.database.max_connections,
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            t_high: 28.0,
            t_low: 26.0,
            stale_timestamp_skew_secs: CoordinatorConfig::DEFAULT_STALE_TIMESTAMP_SKEW.as_secs(),
            override_ttl_secs: CoordinatorConfig::DEFAULT_OVERRIDE_TTL.as_secs(),
            queue_capacity: 64,
            persist_retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 2_000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:coolhub.db?mode=rwc".to_string(),
            max_connections: 4,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "warn,coolhub=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
