//! WebChronicle - Main Library
//!
//! Activity tracking reported to a collector over a reconnecting
//! WebSocket transport.
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI, runners, host input)
//! - **chronicle**: Session and activity tracking (re-exported from workspace)
//! - **relaysockets**: WebSocket transport client (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust
//! use webchronicle::bin_common::{load_config_from_env, ConfigType};
//! use webchronicle::chronicle::Tracker;
//! ```

// Re-export workspace libraries for convenience
pub use chronicle;
pub use relaysockets;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod host;
    pub mod runner;

    pub use cli::{config_path, load_config_from_env, parse_args, ConfigType};
    pub use host::{parse_host_message, HostMessage};
    pub use runner::{BinaryRunner, RunConfig};
}
