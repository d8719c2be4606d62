use crate::core::client::TransportClient;
use crate::core::config::{
    validate_url, ClientConfig, DEFAULT_CLOSE_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, DEFAULT_URL,
};
use crate::core::send_queue::DEFAULT_QUEUE_CAPACITY;
use crate::traits::*;
use std::time::Duration;

/// Builder for [`TransportClient`]
///
/// Every setting has a default, so `TransportClient::builder().build()` gives
/// a client for `ws://localhost:5000/ws` with the tiered reconnection policy.
pub struct TransportClientBuilder {
    url: String,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    queue_capacity: Option<usize>,
    connect_timeout: Duration,
    close_timeout: Duration,
    heartbeat: Option<Duration>,
}

impl TransportClientBuilder {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            reconnect_strategy: None,
            queue_capacity: Some(DEFAULT_QUEUE_CAPACITY),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            heartbeat: None,
        }
    }

    /// Address used by `connect_default`
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.reconnect_strategy = Some(Box::new(strategy));
        self
    }

    /// Bound the Send Queue; the oldest frame is dropped past `capacity`
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Keep every queued frame no matter how long the outage lasts
    pub fn unbounded_queue(mut self) -> Self {
        self.queue_capacity = None;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Send a WebSocket ping every `interval` while open
    pub fn heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = Some(interval);
        self
    }

    /// Validate the settings and spawn the client's driver task
    ///
    /// Fails with `Configuration` outside a Tokio runtime.
    pub fn build(self) -> Result<TransportClient> {
        validate_url(&self.url)?;

        if self.queue_capacity == Some(0) {
            return Err(RelayError::Configuration(
                "queue capacity must be at least 1".to_string(),
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(RelayError::Configuration(
                "connect timeout must be greater than zero".to_string(),
            ));
        }

        if tokio::runtime::Handle::try_current().is_err() {
            return Err(RelayError::Configuration(
                "TransportClient must be built inside a Tokio runtime".to_string(),
            ));
        }

        let reconnect_strategy = self
            .reconnect_strategy
            .unwrap_or_else(|| Box::new(TieredBackoff::default()));

        let config = ClientConfig {
            url: self.url,
            reconnect_strategy,
            queue_capacity: self.queue_capacity,
            connect_timeout: self.connect_timeout,
            close_timeout: self.close_timeout,
            heartbeat: self.heartbeat,
        };

        Ok(TransportClient::new(config))
    }
}

impl Default for TransportClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportClient {
    /// Create a new client builder
    pub fn builder() -> TransportClientBuilder {
        TransportClientBuilder::new()
    }
}
