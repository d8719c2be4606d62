use thiserror::Error;

/// Main error type for relaysockets
#[derive(Error, Debug)]
pub enum RelayError {
    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Inbound data that is not a `{type, message}` frame
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Outbound payload could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Channel send error (the client task is gone)
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The reconnection policy gave up
    #[error("Reconnection exhausted after {attempts} attempts")]
    ReconnectionExhausted { attempts: usize },

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// A subscriber returned an error
    #[error("Handler error: {0}")]
    Handler(String),
}

/// Result type for relaysockets operations
pub type Result<T> = std::result::Result<T, RelayError>;
