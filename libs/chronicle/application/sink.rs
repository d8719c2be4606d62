//! Outbound seam between the tracker and the transport

use crate::application::tracker::TrackerError;
use relaysockets::{Frame, TransportClient};
use serde_json::Value;
use std::sync::Arc;

/// Anything that can carry a `{type, message}` frame to the collector
///
/// The tracker only ever talks to this trait, so it can be driven by a
/// [`TransportClient`] in production and by a recording sink in tests.
///
/// The tracker calls `send_frame` with its state lock held, so
/// implementations must not block and must not call back into the tracker.
pub trait EventSink: Send + Sync {
    fn send_frame(&self, kind: &str, message: Value) -> Result<(), TrackerError>;
}

impl EventSink for TransportClient {
    /// Never fails: while disconnected the frame waits in the Send Queue
    fn send_frame(&self, kind: &str, message: Value) -> Result<(), TrackerError> {
        TransportClient::send_frame(self, Frame::new(kind, message));
        Ok(())
    }
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn send_frame(&self, kind: &str, message: Value) -> Result<(), TrackerError> {
        (**self).send_frame(kind, message)
    }
}
