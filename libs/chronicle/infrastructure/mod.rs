//! Infrastructure Layer
//!
//! Configuration files, logging and process shutdown.
//! This layer depends on the application layer only for its settings types.

pub mod config;
pub mod logging;
pub mod shutdown;

// Re-export config types
pub use config::{AgentConfig, CollectorConfig, ConfigError, TrackerConfig, TransportConfig};

// Re-export infrastructure services
pub use logging::{init_tracing, init_tracing_with_level};
pub use shutdown::ShutdownManager;
