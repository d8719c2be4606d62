//! # RelaySockets
//!
//! A reconnecting WebSocket client for JSON `{type, message}` frames.
//!
//! ## Features
//!
//! - **Durable send queue**: frames sent while disconnected are delivered in
//!   order on the next open, before anything sent later
//! - **Pluggable reconnection**: tiered backoff with cooldowns by default,
//!   exponential and fixed delays available
//! - **At most one connection**: replacing or closing a connection never
//!   leaves a second socket writing
//! - **Typed subscriptions**: handlers per frame type plus a wildcard channel

pub mod traits;
pub mod core;

// Re-export all traits
pub use traits::*;

// Re-export core client functionality
pub use crate::core::{
    builder, client, config, connection_state, send_queue, subscriptions,
    builder::TransportClientBuilder,
    client::{ClientEvent, Metrics, TransportClient},
    config::{
        ClientConfig, DEFAULT_CLOSE_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, DEFAULT_URL,
        EVENT_CHANNEL_CAPACITY,
    },
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState},
    send_queue::{SendQueue, DEFAULT_QUEUE_CAPACITY},
    subscriptions::Subscriptions,
};
