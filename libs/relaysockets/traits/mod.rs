//! # RelaySockets Traits
//!
//! Core traits and types shared by the transport client:
//!
//! - **Frame / WsMessage**: the `{type, message}` wire frame
//! - **MessageHandler**: inbound frame subscribers
//! - **ReconnectionStrategy**: delay between attempts and when to give up

pub mod error;
pub mod frame;
pub mod handler;
pub mod reconnect;

// Re-export commonly used types
pub use error::{RelayError, Result};
pub use frame::{Frame, WsMessage};
pub use handler::MessageHandler;
pub use reconnect::{ExponentialBackoff, FixedDelay, NeverReconnect, ReconnectionStrategy, TieredBackoff};
