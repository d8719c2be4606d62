use crate::traits::*;
use std::time::Duration;

/// Reference collector endpoint
pub const DEFAULT_URL: &str = "ws://localhost:5000/ws";

/// Default bound on a single connection attempt
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on the closing handshake
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle events kept for `try_recv_event`; newer events are dropped past it
pub const EVENT_CHANNEL_CAPACITY: usize = 1_024;

/// Configuration for TransportClient
///
/// Built with [`TransportClientBuilder`](crate::core::builder::TransportClientBuilder).
pub struct ClientConfig {
    /// Address used by `connect_default` (ws:// or wss://)
    pub(crate) url: String,

    /// Reconnection strategy
    pub(crate) reconnect_strategy: Box<dyn ReconnectionStrategy>,

    /// Send Queue bound (None = unbounded)
    pub(crate) queue_capacity: Option<usize>,

    /// Upper bound on a single connection attempt
    pub(crate) connect_timeout: Duration,

    /// Upper bound on the closing handshake when a connection is replaced or closed
    pub(crate) close_timeout: Duration,

    /// Optional keep-alive ping interval while open
    pub(crate) heartbeat: Option<Duration>,
}

impl ClientConfig {
    /// Get a reference to the default URL
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn queue_capacity(&self) -> Option<usize> {
        self.queue_capacity
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn close_timeout(&self) -> Duration {
        self.close_timeout
    }

    /// Check if heartbeat is configured
    pub fn has_heartbeat(&self) -> bool {
        self.heartbeat.is_some()
    }
}

/// Check that an address is a WebSocket URL
pub(crate) fn validate_url(url: &str) -> Result<()> {
    if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(())
    } else {
        Err(RelayError::Configuration(format!(
            "expected a ws:// or wss:// address, got {:?}",
            url
        )))
    }
}
