use crate::application::TrackerSettings;
use relaysockets::{TieredBackoff, TransportClient, DEFAULT_QUEUE_CAPACITY, DEFAULT_URL};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Overrides `transport.url`
pub const WS_URL_ENV: &str = "CHRONICLE_WS_URL";

/// Overrides `bind_addr` for the collector
pub const BIND_ADDR_ENV: &str = "CHRONICLE_BIND_ADDR";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Activity agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_short_delay_secs")]
    pub short_delay_secs: u64,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_cooldown_every")]
    pub cooldown_every: usize,
    /// Omit or set to null to retry forever
    #[serde(default = "default_max_attempts")]
    pub max_attempts: Option<usize>,
    /// Null keeps every queued frame
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: Option<usize>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Keep-alive ping interval; off when absent
    #[serde(default)]
    pub heartbeat_secs: Option<u64>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            short_delay_secs: default_short_delay_secs(),
            cooldown_secs: default_cooldown_secs(),
            cooldown_every: default_cooldown_every(),
            max_attempts: default_max_attempts(),
            queue_capacity: default_queue_capacity(),
            connect_timeout_secs: default_connect_timeout_secs(),
            heartbeat_secs: None,
        }
    }
}

impl TransportConfig {
    pub fn reconnect_strategy(&self) -> TieredBackoff {
        TieredBackoff::new(
            Duration::from_secs(self.short_delay_secs),
            Duration::from_secs(self.cooldown_secs),
            self.cooldown_every,
            self.max_attempts,
        )
    }

    /// Build an unconnected client from these settings
    pub fn build_client(&self) -> relaysockets::Result<TransportClient> {
        let mut builder = TransportClient::builder()
            .url(self.url.clone())
            .reconnect_strategy(self.reconnect_strategy())
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs));

        builder = match self.queue_capacity {
            Some(capacity) => builder.queue_capacity(capacity),
            None => builder.unbounded_queue(),
        };

        if let Some(secs) = self.heartbeat_secs {
            builder = builder.heartbeat(Duration::from_secs(secs));
        }

        builder.build()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_true")]
    pub tracking_enabled: bool,
    #[serde(default)]
    pub blacklist: Vec<String>,
    #[serde(default = "default_inactivity_timeout_mins")]
    pub inactivity_timeout_mins: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tracking_enabled: true,
            blacklist: Vec::new(),
            inactivity_timeout_mins: default_inactivity_timeout_mins(),
        }
    }
}

impl TrackerConfig {
    pub fn settings(&self) -> TrackerSettings {
        TrackerSettings {
            tracking_enabled: self.tracking_enabled,
            blacklist: self.blacklist.clone(),
            inactivity_timeout: Duration::from_secs(self.inactivity_timeout_mins * 60),
        }
    }
}

impl AgentConfig {
    /// Load configuration from YAML file
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config: AgentConfig = serde_yaml::from_str(&yaml_content)?;

        if let Ok(url) = std::env::var(WS_URL_ENV) {
            info!("Overriding collector URL from environment variable");
            config.transport.url = url;
        }

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let url = &self.transport.url;
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ConfigError::ValidationError(format!(
                "transport.url must be a ws:// or wss:// address, got {:?}",
                url
            )));
        }

        if self.transport.short_delay_secs == 0 {
            return Err(ConfigError::ValidationError(
                "transport.short_delay_secs must be greater than 0".to_string(),
            ));
        }

        if self.transport.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "transport.connect_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.transport.queue_capacity == Some(0) {
            return Err(ConfigError::ValidationError(
                "transport.queue_capacity must be at least 1 (or null for unbounded)".to_string(),
            ));
        }

        if self.tracker.inactivity_timeout_mins == 0 {
            return Err(ConfigError::ValidationError(
                "tracker.inactivity_timeout_mins must be greater than 0".to_string(),
            ));
        }

        validate_log_level(&self.log_level)
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  Collector URL: {}", self.transport.url);
        info!(
            "  Reconnect: every {}s, {}s cooldown after every {} attempts, max {:?}",
            self.transport.short_delay_secs,
            self.transport.cooldown_secs,
            self.transport.cooldown_every,
            self.transport.max_attempts
        );
        info!("  Queue capacity: {:?}", self.transport.queue_capacity);
        info!("  Tracking enabled: {}", self.tracker.tracking_enabled);
        info!("  Blacklist: {:?}", self.tracker.blacklist);
        info!("  Inactivity timeout: {} min", self.tracker.inactivity_timeout_mins);
        info!("  Log level: {}", self.log_level);
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            tracker: TrackerConfig::default(),
            log_level: default_log_level(),
        }
    }
}

/// Development collector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl CollectorConfig {
    /// Load configuration from YAML file
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config: CollectorConfig = serde_yaml::from_str(&yaml_content)?;

        if let Ok(addr) = std::env::var(BIND_ADDR_ENV) {
            info!("Overriding bind address from environment variable");
            config.bind_addr = addr;
        }

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.bind_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "bind_addr must be host:port, got {:?}",
                self.bind_addr
            )));
        }

        if !self.path.starts_with('/') {
            return Err(ConfigError::ValidationError(
                "path must start with '/'".to_string(),
            ));
        }

        validate_log_level(&self.log_level)
    }

    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  Listening on: {}{}", self.bind_addr, self.path);
        info!("  Log level: {}", self.log_level);
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            path: default_path(),
            log_level: default_log_level(),
        }
    }
}

fn validate_log_level(level: &str) -> Result<()> {
    let valid_levels = ["error", "warn", "info", "debug", "trace"];
    if !valid_levels.contains(&level.to_lowercase().as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "log_level must be one of: {}",
            valid_levels.join(", ")
        )));
    }
    Ok(())
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_short_delay_secs() -> u64 {
    TieredBackoff::SHORT_DELAY.as_secs()
}

fn default_cooldown_secs() -> u64 {
    TieredBackoff::COOLDOWN.as_secs()
}

fn default_cooldown_every() -> usize {
    TieredBackoff::COOLDOWN_EVERY
}

fn default_max_attempts() -> Option<usize> {
    Some(TieredBackoff::MAX_ATTEMPTS)
}

fn default_queue_capacity() -> Option<usize> {
    Some(DEFAULT_QUEUE_CAPACITY)
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_inactivity_timeout_mins() -> u64 {
    30
}

fn default_bind_addr() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_path() -> String {
    "/ws".to_string()
}
