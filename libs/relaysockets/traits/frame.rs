//! Wire framing
//!
//! Every physical WebSocket message carries exactly one logical frame with
//! the shape `{"type": <string>, "message": <any JSON>}`.

use crate::traits::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw WebSocket payload, text or binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl WsMessage {
    /// Get the message as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WsMessage::Text(s) => Some(s),
            WsMessage::Binary(_) => None,
        }
    }

    /// Get the message as binary, if it is binary
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            WsMessage::Text(_) => None,
            WsMessage::Binary(b) => Some(b),
        }
    }
}

/// A typed frame exchanged with the collector
///
/// `message` may be any JSON value, including `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: Value,
}

impl Frame {
    pub fn new(kind: impl Into<String>, message: Value) -> Self {
        Self {
            kind: kind.into(),
            message,
        }
    }

    /// Build a frame from any serializable payload
    pub fn from_payload<T>(kind: impl Into<String>, payload: &T) -> Result<Self>
    where
        T: Serialize + ?Sized,
    {
        Ok(Self::new(kind, serde_json::to_value(payload)?))
    }

    /// Serialize to the JSON text sent on the wire
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a received WebSocket message
    ///
    /// Text and binary payloads are both read as UTF-8 JSON.
    pub fn parse(message: &WsMessage) -> Result<Self> {
        let value: Value = match message {
            WsMessage::Text(text) => serde_json::from_str(text),
            WsMessage::Binary(data) => serde_json::from_slice(data),
        }
        .map_err(|e| RelayError::MalformedFrame(format!("invalid JSON: {}", e)))?;

        Self::from_value(value)
    }

    /// Validate an already-decoded JSON value as a frame
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(RelayError::MalformedFrame(
                "frame is not a JSON object".to_string(),
            ));
        };

        let kind = match map.remove("type") {
            Some(Value::String(kind)) => kind,
            Some(other) => {
                return Err(RelayError::MalformedFrame(format!(
                    "`type` must be a string, got {}",
                    other
                )))
            }
            None => {
                return Err(RelayError::MalformedFrame(
                    "missing `type` field".to_string(),
                ))
            }
        };

        let message = map
            .remove("message")
            .ok_or_else(|| RelayError::MalformedFrame("missing `message` field".to_string()))?;

        Ok(Self { kind, message })
    }
}
