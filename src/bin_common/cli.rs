//! CLI utilities for binaries
//!
//! Handles configuration loading and environment variables
//! for all binary executables.

use std::path::PathBuf;

/// Type of configuration to load
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Agent configuration (agent.yaml)
    Agent,
    /// Development collector configuration (collector.yaml)
    Collector,
    /// Custom path
    Custom(String),
}

impl ConfigType {
    /// Get the default path for this config type
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Agent => "config/agent.yaml",
            ConfigType::Collector => "config/collector.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    /// Get the environment variable name for this config type
    pub fn env_var_name(&self) -> &str {
        match self {
            ConfigType::Agent => "CHRONICLE_AGENT_CONFIG",
            ConfigType::Collector => "CHRONICLE_COLLECTOR_CONFIG",
            ConfigType::Custom(_) => "CHRONICLE_CONFIG",
        }
    }
}

/// Load configuration path from environment or use default
///
/// # Examples
/// ```
/// use webchronicle::bin_common::{load_config_from_env, ConfigType};
///
/// let path = load_config_from_env(ConfigType::Agent);
/// ```
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    std::env::var(config_type.env_var_name())
        .unwrap_or_else(|_| config_type.default_path().to_string())
        .into()
}

/// The first positional argument wins over the environment
pub fn config_path(config_type: ConfigType, args: &[String]) -> PathBuf {
    match args.first() {
        Some(path) => PathBuf::from(path),
        None => load_config_from_env(config_type),
    }
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}
