//! Publish/subscribe registry
//!
//! Maps frame types (plus one wildcard channel) to ordered handler lists,
//! and holds the lifecycle callbacks. Handlers are cloned out of the lock
//! before they run, so a handler may register further handlers.

use crate::traits::{Frame, MessageHandler, RelayError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, trace};

type LifecycleHandler = Arc<dyn Fn() + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(&RelayError) + Send + Sync>;
type ExhaustedHandler = Arc<dyn Fn(usize) + Send + Sync>;
type FrameHandler = Arc<dyn MessageHandler>;

#[derive(Default)]
struct Registry {
    open: Vec<LifecycleHandler>,
    close: Vec<LifecycleHandler>,
    error: Vec<ErrorHandler>,
    exhausted: Vec<ExhaustedHandler>,
    any: Vec<FrameHandler>,
    typed: HashMap<String, Vec<FrameHandler>>,
}

#[derive(Default)]
pub struct Subscriptions {
    registry: RwLock<Registry>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called each time a connection reaches `Open`
    pub fn on_open(&self, handler: impl Fn() + Send + Sync + 'static) {
        self.registry.write().open.push(Arc::new(handler));
    }

    /// Called each time an open connection goes away
    pub fn on_close(&self, handler: impl Fn() + Send + Sync + 'static) {
        self.registry.write().close.push(Arc::new(handler));
    }

    /// Called for transport errors and malformed inbound frames
    pub fn on_error(&self, handler: impl Fn(&RelayError) + Send + Sync + 'static) {
        self.registry.write().error.push(Arc::new(handler));
    }

    /// Called once when the reconnection policy gives up
    pub fn on_exhausted(&self, handler: impl Fn(usize) + Send + Sync + 'static) {
        self.registry.write().exhausted.push(Arc::new(handler));
    }

    /// Subscribe to every valid frame
    pub fn on_any_message(&self, handler: impl MessageHandler) {
        self.registry.write().any.push(Arc::new(handler));
    }

    /// Subscribe to frames of one type
    pub fn on_message(&self, kind: impl Into<String>, handler: impl MessageHandler) {
        self.registry
            .write()
            .typed
            .entry(kind.into())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Deliver a frame to "any" handlers, then to handlers of its type
    ///
    /// Returns how many handlers saw the frame.
    pub fn dispatch(&self, frame: &Frame) -> usize {
        let handlers: Vec<FrameHandler> = {
            let registry = self.registry.read();
            registry
                .any
                .iter()
                .chain(registry.typed.get(&frame.kind).into_iter().flatten())
                .cloned()
                .collect()
        };

        if handlers.is_empty() {
            trace!("No subscribers for frame type {:?}", frame.kind);
        }

        for handler in &handlers {
            if let Err(e) = handler.handle(frame) {
                error!("Handler error for frame type {:?}: {}", frame.kind, e);
            }
        }

        handlers.len()
    }

    pub(crate) fn notify_open(&self) {
        let handlers = self.registry.read().open.clone();
        handlers.iter().for_each(|h| h());
    }

    pub(crate) fn notify_close(&self) {
        let handlers = self.registry.read().close.clone();
        handlers.iter().for_each(|h| h());
    }

    pub(crate) fn notify_error(&self, err: &RelayError) {
        let handlers = self.registry.read().error.clone();
        handlers.iter().for_each(|h| h(err));
    }

    pub(crate) fn notify_exhausted(&self, attempts: usize) {
        let handlers = self.registry.read().exhausted.clone();
        handlers.iter().for_each(|h| h(attempts));
    }

    /// Number of frame handlers registered for a type (wildcard excluded)
    pub fn handler_count(&self, kind: &str) -> usize {
        self.registry.read().typed.get(kind).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&Frame) -> crate::Result<()> + Send + Sync>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = Arc::clone(&log);
        let make = move |label: &str| {
            let log = Arc::clone(&log_clone);
            let label = label.to_string();
            Box::new(move |frame: &Frame| {
                log.lock().push(format!("{}:{}", label, frame.kind));
                Ok(())
            }) as Box<dyn Fn(&Frame) -> crate::Result<()> + Send + Sync>
        };
        (log, make)
    }

    #[test]
    fn test_any_handlers_run_before_typed_in_registration_order() {
        let subs = Subscriptions::new();
        let (log, make) = recorder();

        subs.on_message("tab_event", make("typed1"));
        subs.on_any_message(make("any1"));
        subs.on_message("tab_event", make("typed2"));
        subs.on_any_message(make("any2"));

        let seen = subs.dispatch(&Frame::new("tab_event", json!({})));

        assert_eq!(seen, 4);
        assert_eq!(
            *log.lock(),
            vec!["any1:tab_event", "any2:tab_event", "typed1:tab_event", "typed2:tab_event"]
        );
    }

    #[test]
    fn test_unregistered_type_reaches_only_any_handlers() {
        let subs = Subscriptions::new();
        let (log, make) = recorder();

        subs.on_any_message(make("any"));
        subs.on_message("update_blacklist", make("typed"));

        subs.dispatch(&Frame::new("something_else", json!(null)));

        assert_eq!(*log.lock(), vec!["any:something_else"]);
    }

    #[test]
    fn test_handler_error_does_not_stop_dispatch() {
        let subs = Subscriptions::new();
        let (log, make) = recorder();

        subs.on_message("x", |_: &Frame| -> crate::Result<()> {
            Err(RelayError::Handler("boom".into()))
        });
        subs.on_message("x", make("after"));

        assert_eq!(subs.dispatch(&Frame::new("x", json!(1))), 2);
        assert_eq!(*log.lock(), vec!["after:x"]);
    }

    #[test]
    fn test_handler_may_subscribe_during_dispatch() {
        let subs = Arc::new(Subscriptions::new());
        let inner = Arc::clone(&subs);

        subs.on_message("register", move |_: &Frame| -> crate::Result<()> {
            inner.on_message("late", |_: &Frame| -> crate::Result<()> { Ok(()) });
            Ok(())
        });

        subs.dispatch(&Frame::new("register", json!(null)));
        assert_eq!(subs.handler_count("late"), 1);
    }

    #[test]
    fn test_lifecycle_callbacks() {
        let subs = Subscriptions::new();
        let hits = Arc::new(Mutex::new(Vec::new()));

        let h = Arc::clone(&hits);
        subs.on_open(move || h.lock().push("open".to_string()));
        let h = Arc::clone(&hits);
        subs.on_close(move || h.lock().push("close".to_string()));
        let h = Arc::clone(&hits);
        subs.on_exhausted(move |n| h.lock().push(format!("exhausted:{}", n)));
        let h = Arc::clone(&hits);
        subs.on_error(move |e| h.lock().push(format!("error:{}", e)));

        subs.notify_open();
        subs.notify_error(&RelayError::WebSocket("reset".into()));
        subs.notify_close();
        subs.notify_exhausted(25);

        assert_eq!(
            *hits.lock(),
            vec!["open", "error:WebSocket error: reset", "close", "exhausted:25"]
        );
    }
}
