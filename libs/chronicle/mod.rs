//! Chronicle
//!
//! Browsing session and activity tracking, reported to a collector over
//! a [`relaysockets`] connection.

pub mod application;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used items
pub use application::{EventSink, Tracker, TrackerError, TrackerSettings};
pub use domain::{kinds, Blacklist, SessionClock, TabEventKind, WindowData, INACTIVITY_TIMEOUT};
pub use infrastructure::{
    init_tracing, init_tracing_with_level, AgentConfig, CollectorConfig, ShutdownManager,
};
