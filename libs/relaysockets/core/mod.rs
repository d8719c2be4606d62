//! # RelaySockets core
//!
//! The transport client and the pieces it is made of:
//!
//! - **client**: public handle, shared state and lifecycle events
//! - **driver**: reconnect state machine (one task per client)
//! - **link**: one task per physical connection
//! - **send_queue**: the durable outbound backlog
//! - **subscriptions**: typed publish/subscribe registry
//!
//! ## Example
//!
//! ```rust,ignore
//! use relaysockets::{TransportClient, TieredBackoff};
//!
//! #[tokio::main]
//! async fn main() -> relaysockets::Result<()> {
//!     let client = TransportClient::builder()
//!         .url("ws://localhost:5000/ws")
//!         .reconnect_strategy(TieredBackoff::default())
//!         .build()?;
//!
//!     client.on_message("set_tracking", |frame: &relaysockets::Frame| -> relaysockets::Result<()> {
//!         println!("tracking: {}", frame.message);
//!         Ok(())
//!     });
//!
//!     // Queued until the connection opens
//!     client.send("tab_event", &serde_json::json!({ "event": "tab_activated" }))?;
//!     client.connect_default()?;
//!
//!     while let Ok(event) = client.recv_event() {
//!         println!("Event: {:?}", event);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod connection_state;
pub(crate) mod driver;
pub(crate) mod heartbeat;
pub(crate) mod link;
pub mod send_queue;
pub mod subscriptions;

// Re-export main types
pub use builder::TransportClientBuilder;
pub use client::{ClientEvent, Metrics, TransportClient};
pub use config::{
    ClientConfig, DEFAULT_CLOSE_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, DEFAULT_URL, EVENT_CHANNEL_CAPACITY,
};
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
pub use send_queue::{SendQueue, DEFAULT_QUEUE_CAPACITY};
pub use subscriptions::Subscriptions;
