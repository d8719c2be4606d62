//! Frame subscribers
//!
//! Inbound frames are dispatched synchronously, in registration order:
//!
//! ```text
//! WebSocket → Frame::parse ─┬─ malformed → on_error (dropped)
//!                           └─ valid → "any" handlers → handlers for frame.kind
//! ```

use crate::traits::error::Result;
use crate::traits::frame::Frame;

/// Handler invoked for each inbound frame it is subscribed to
///
/// Runs on the connection task. Keep it short; long work should be handed
/// off to another task.
///
/// # Errors
/// An error is logged and dispatch continues with the next handler.
///
/// # Example
///
/// ```ignore
/// struct BlacklistHandler {
///     sites: Arc<RwLock<Vec<String>>>,
/// }
///
/// impl MessageHandler for BlacklistHandler {
///     fn handle(&self, frame: &Frame) -> Result<()> {
///         let sites: Vec<String> = serde_json::from_value(frame.message.clone())?;
///         *self.sites.write() = sites;
///         Ok(())
///     }
/// }
/// ```
pub trait MessageHandler: Send + Sync + 'static {
    fn handle(&self, frame: &Frame) -> Result<()>;
}

impl<F> MessageHandler for F
where
    F: Fn(&Frame) -> Result<()> + Send + Sync + 'static,
{
    fn handle(&self, frame: &Frame) -> Result<()> {
        self(frame)
    }
}
