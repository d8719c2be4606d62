use crate::core::config::{ClientConfig, EVENT_CHANNEL_CAPACITY};
use crate::core::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::core::driver::{ClientCommand, Driver};
use crate::core::send_queue::SendQueue;
use crate::core::subscriptions::Subscriptions;
use crate::traits::*;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, trace, warn};

/// Lifecycle events published by the client
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A connection reached `Open`
    Connected,
    /// An open connection went away
    Disconnected,
    /// A reconnect is scheduled (attempt number, delay before it)
    Reconnecting { attempt: usize, delay: Duration },
    /// Transport error
    Error(String),
    /// Inbound message that is not a valid frame
    MalformedFrame(String),
    /// The reconnection policy gave up after this many attempts
    Exhausted { attempts: usize },
}

/// Client metrics snapshot
#[derive(Debug, Clone)]
pub struct Metrics {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub malformed_frames: u64,
    pub reconnect_attempts: u64,
    pub frames_dropped: u64,
    pub queued: usize,
    pub connection_state: ConnectionState,
}

/// Queue, writer and generation, all behind one lock
///
/// `generation` names the only link allowed to touch the queue. `writer` is
/// set while that link is open and wakes it when a frame is queued.
pub(crate) struct LinkState {
    pub(crate) generation: u64,
    pub(crate) writer: Option<Arc<Notify>>,
    pub(crate) queue: SendQueue,
}

/// State shared by the client handle, the driver and the current link
pub(crate) struct Shared {
    pub(crate) state: AtomicConnectionState,
    pub(crate) metrics: AtomicMetrics,
    pub(crate) subscriptions: Subscriptions,
    pub(crate) link: Mutex<LinkState>,
    pub(crate) exhausted: AtomicBool,
    pub(crate) target: RwLock<Option<String>>,
    pub(crate) event_tx: Sender<ClientEvent>,
}

impl Shared {
    pub(crate) fn new(queue_capacity: Option<usize>, event_tx: Sender<ClientEvent>) -> Self {
        Self {
            state: AtomicConnectionState::new(ConnectionState::Disconnected),
            metrics: AtomicMetrics::new(),
            subscriptions: Subscriptions::new(),
            link: Mutex::new(LinkState {
                generation: 0,
                writer: None,
                queue: SendQueue::new(queue_capacity),
            }),
            exhausted: AtomicBool::new(false),
            target: RwLock::new(None),
            event_tx,
        }
    }

    /// Publish to the event channel; callbacks are unaffected when it is full
    pub(crate) fn emit(&self, event: ClientEvent) {
        if let Err(TrySendError::Full(event)) = self.event_tx.try_send(event) {
            trace!("Event channel full, dropping {:?}", event);
        }
    }

    /// Queue a frame and wake the open link, if any
    pub(crate) fn enqueue(&self, frame: Frame) {
        let mut link = self.link.lock();
        let kind = frame.kind.clone();

        if let Some(evicted) = link.queue.push(frame) {
            self.metrics.increment_dropped();
            warn!(
                "Send queue full ({} frames), dropped oldest {:?} frame",
                link.queue.len(),
                evicted.kind
            );
        }

        match &link.writer {
            Some(writer) => writer.notify_one(),
            None => debug!(
                "Not connected, queued {:?} frame ({} pending)",
                kind,
                link.queue.len()
            ),
        }
    }

    /// Start a new generation for a link that is about to connect
    pub(crate) fn begin_link(&self) -> u64 {
        let mut link = self.link.lock();
        link.generation += 1;
        link.writer = None;
        self.state.set(ConnectionState::Connecting);
        link.generation
    }

    /// Retire the current generation, returning whether it was open
    pub(crate) fn begin_close(&self) -> bool {
        let mut link = self.link.lock();
        link.generation += 1;
        link.writer = None;
        let was_open = self.state.is_open();
        self.state.set(ConnectionState::Closing);
        was_open
    }

    /// Called by a link once its socket is up; false if it is already stale
    pub(crate) fn mark_open(&self, generation: u64, wake: &Arc<Notify>) -> bool {
        let mut link = self.link.lock();
        if link.generation != generation {
            return false;
        }
        link.writer = Some(Arc::clone(wake));
        self.state.set(ConnectionState::Open);
        true
    }

    pub(crate) fn mark_disconnected(&self, generation: u64) {
        let mut link = self.link.lock();
        if link.generation == generation {
            link.writer = None;
            self.state.set(ConnectionState::Disconnected);
        }
    }

    pub(crate) fn set_disconnected(&self) {
        self.state.set(ConnectionState::Disconnected);
    }

    /// Copy of the head frame for the link of `generation`, if it is current and open
    ///
    /// The frame stays queued until [`Shared::complete_outbound`].
    pub(crate) fn next_outbound(&self, generation: u64) -> Option<(u64, Frame)> {
        let link = self.link.lock();
        if link.generation != generation || link.writer.is_none() {
            return None;
        }
        link.queue.front().map(|(seq, frame)| (seq, frame.clone()))
    }

    /// Take frame `seq` off the queue once it has been written
    ///
    /// Not tied to a generation: a frame written by a link that was retired
    /// mid-write still counts as delivered.
    pub(crate) fn complete_outbound(&self, seq: u64) {
        self.link.lock().queue.remove(seq);
    }

    pub(crate) fn queued_len(&self) -> usize {
        self.link.lock().queue.len()
    }

    pub(crate) fn report_error(&self, err: RelayError) {
        error!("{}", err);
        self.emit(ClientEvent::Error(err.to_string()));
        self.subscriptions.notify_error(&err);
    }

    /// Parse an inbound message and hand it to subscribers
    pub(crate) fn handle_incoming(&self, message: WsMessage) {
        self.metrics.increment_received();

        match Frame::parse(&message) {
            Ok(frame) => {
                self.subscriptions.dispatch(&frame);
            }
            Err(err) => {
                self.metrics.increment_malformed();
                error!("Discarding inbound message: {}", err);
                self.emit(ClientEvent::MalformedFrame(err.to_string()));
                self.subscriptions.notify_error(&err);
            }
        }
    }
}

/// Reconnecting WebSocket transport with a durable send queue
///
/// Frames sent while no connection is open wait in the Send Queue and are
/// delivered in order on the next open, before anything sent later. The
/// connection is owned by a background driver task; every method here
/// returns immediately.
///
/// Must be built inside a Tokio runtime, see [`TransportClient::builder`].
pub struct TransportClient {
    shared: Arc<Shared>,
    default_url: String,
    command_tx: mpsc::UnboundedSender<ClientCommand>,
    event_rx: Receiver<ClientEvent>,
    task_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl TransportClient {
    /// Called by the builder once the configuration is validated
    pub(crate) fn new(config: ClientConfig) -> Self {
        let (event_tx, event_rx) = bounded(EVENT_CHANNEL_CAPACITY);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::new(config.queue_capacity, event_tx));
        let default_url = config.url.clone();

        let driver = Driver::new(Arc::clone(&shared), config, command_rx);
        let task_handle = tokio::spawn(driver.run());

        Self {
            shared,
            default_url,
            command_tx,
            event_rx,
            task_handle: Mutex::new(Some(task_handle)),
        }
    }

    /// Open a connection to `url`, replacing any current one
    ///
    /// Clears the attempt counter and a previous exhausted condition.
    pub fn connect(&self, url: impl Into<String>) -> Result<()> {
        let url = url.into();
        crate::core::config::validate_url(&url)?;
        self.command(ClientCommand::Connect(url))
    }

    /// Connect to the configured default address
    pub fn connect_default(&self) -> Result<()> {
        self.connect(self.default_url.clone())
    }

    /// Serialize `payload` into a `{type, message}` frame and send or queue it
    ///
    /// Only a payload that cannot be serialized is an error; sending while
    /// disconnected queues the frame.
    pub fn send<T>(&self, kind: &str, payload: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let frame = Frame::from_payload(kind, payload)?;
        self.send_frame(frame);
        Ok(())
    }

    /// Send or queue an already built frame
    pub fn send_frame(&self, frame: Frame) {
        self.shared.enqueue(frame);
    }

    /// Close the connection without reconnecting
    pub fn close(&self) -> Result<()> {
        self.command(ClientCommand::Close)
    }

    /// Close the connection and stop the driver task
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down transport client");
        let _ = self.command_tx.send(ClientCommand::Shutdown);

        let handle = self.task_handle.lock().take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| RelayError::ChannelSend(format!("driver task failed: {}", e)))?;
        }

        Ok(())
    }

    fn command(&self, command: ClientCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| RelayError::ChannelSend("client driver has stopped".to_string()))
    }

    /// Lifecycle and frame subscriptions
    pub fn subscriptions(&self) -> &Subscriptions {
        &self.shared.subscriptions
    }

    pub fn on_open(&self, handler: impl Fn() + Send + Sync + 'static) {
        self.shared.subscriptions.on_open(handler);
    }

    pub fn on_close(&self, handler: impl Fn() + Send + Sync + 'static) {
        self.shared.subscriptions.on_close(handler);
    }

    pub fn on_error(&self, handler: impl Fn(&RelayError) + Send + Sync + 'static) {
        self.shared.subscriptions.on_error(handler);
    }

    pub fn on_exhausted(&self, handler: impl Fn(usize) + Send + Sync + 'static) {
        self.shared.subscriptions.on_exhausted(handler);
    }

    pub fn on_message(&self, kind: impl Into<String>, handler: impl MessageHandler) {
        self.shared.subscriptions.on_message(kind, handler);
    }

    pub fn on_any_message(&self, handler: impl MessageHandler) {
        self.shared.subscriptions.on_any_message(handler);
    }

    /// Get current connection state
    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.shared.state.is_open()
    }

    /// True once the reconnection policy has given up, until the next `connect`
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.shared.exhausted.load(Ordering::Acquire)
    }

    /// Frames waiting in the Send Queue
    pub fn queued_len(&self) -> usize {
        self.shared.queued_len()
    }

    /// Address of the last `connect`, cleared by `close`
    pub fn target(&self) -> Option<String> {
        self.shared.target.read().clone()
    }

    /// Default address used by `connect_default`
    pub fn default_url(&self) -> &str {
        &self.default_url
    }

    /// Get current metrics
    pub fn metrics(&self) -> Metrics {
        let metrics = &self.shared.metrics;
        Metrics {
            frames_sent: metrics.frames_sent(),
            frames_received: metrics.frames_received(),
            malformed_frames: metrics.malformed_frames(),
            reconnect_attempts: metrics.reconnect_attempts(),
            frames_dropped: metrics.frames_dropped(),
            queued: self.shared.queued_len(),
            connection_state: self.shared.state.get(),
        }
    }

    /// Try to receive an event (non-blocking)
    ///
    /// The channel keeps at most [`EVENT_CHANNEL_CAPACITY`] undrained events;
    /// later ones are dropped until it is read. Callers that only register
    /// callbacks never need to drain it.
    pub fn try_recv_event(&self) -> Option<ClientEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive an event (blocking)
    pub fn recv_event(&self) -> std::result::Result<ClientEvent, crossbeam_channel::RecvError> {
        self.event_rx.recv()
    }

    /// Receive an event, giving up after `timeout`
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<ClientEvent> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for TransportClient {
    fn drop(&mut self) {
        let _ = self.command_tx.send(ClientCommand::Shutdown);
    }
}

impl std::fmt::Debug for TransportClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportClient")
            .field("state", &self.connection_state())
            .field("target", &self.target())
            .field("queued", &self.queued_len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shared(capacity: Option<usize>) -> (Shared, Receiver<ClientEvent>) {
        let (tx, rx) = bounded(EVENT_CHANNEL_CAPACITY);
        (Shared::new(capacity, tx), rx)
    }

    #[test]
    fn test_enqueue_without_link_only_queues() {
        let (shared, _rx) = shared(None);
        shared.enqueue(Frame::new("tab_event", json!({ "n": 1 })));
        shared.enqueue(Frame::new("tab_event", json!({ "n": 2 })));

        assert_eq!(shared.queued_len(), 2);
        assert_eq!(shared.metrics.frames_dropped(), 0);
    }

    #[test]
    fn test_full_queue_counts_drops() {
        let (shared, _rx) = shared(Some(2));
        for n in 0..5 {
            shared.enqueue(Frame::new("tab_event", json!(n)));
        }

        assert_eq!(shared.queued_len(), 2);
        assert_eq!(shared.metrics.frames_dropped(), 3);
    }

    #[test]
    fn test_stale_generation_cannot_open_or_pop() {
        let (shared, _rx) = shared(None);
        let wake = Arc::new(Notify::new());

        let old = shared.begin_link();
        let new = shared.begin_link();
        shared.enqueue(Frame::new("x", json!(null)));

        assert!(!shared.mark_open(old, &wake));
        assert!(shared.next_outbound(old).is_none());

        assert!(shared.mark_open(new, &wake));
        assert_eq!(shared.state.get(), ConnectionState::Open);
        let (seq, _) = shared.next_outbound(new).unwrap();

        // Still queued until the write completes
        assert_eq!(shared.queued_len(), 1);
        shared.complete_outbound(seq);
        assert_eq!(shared.queued_len(), 0);
    }

    #[test]
    fn test_stale_disconnect_leaves_state_alone() {
        let (shared, _rx) = shared(None);
        let wake = Arc::new(Notify::new());

        let old = shared.begin_link();
        let new = shared.begin_link();
        assert!(shared.mark_open(new, &wake));

        shared.mark_disconnected(old);
        assert!(shared.state.is_open());

        shared.mark_disconnected(new);
        assert!(shared.state.is_disconnected());
    }

    #[test]
    fn test_queue_not_drained_before_open() {
        let (shared, _rx) = shared(None);
        let generation = shared.begin_link();
        shared.enqueue(Frame::new("x", json!(1)));

        assert!(shared.next_outbound(generation).is_none());
        assert_eq!(shared.queued_len(), 1);
    }

    #[test]
    fn test_malformed_inbound_is_reported() {
        let (shared, rx) = shared(None);
        let seen = Arc::new(Mutex::new(0));
        let seen_clone = Arc::clone(&seen);
        shared
            .subscriptions
            .on_any_message(move |_: &Frame| -> crate::Result<()> {
                *seen_clone.lock() += 1;
                Ok(())
            });

        shared.handle_incoming(WsMessage::Text("not json".into()));
        shared.handle_incoming(WsMessage::Text(r#"{"type":"ok","message":1}"#.into()));

        assert_eq!(*seen.lock(), 1);
        assert_eq!(shared.metrics.frames_received(), 2);
        assert_eq!(shared.metrics.malformed_frames(), 1);
        assert!(matches!(rx.try_recv(), Ok(ClientEvent::MalformedFrame(_))));
    }

    #[test]
    fn test_begin_close_reports_previous_open() {
        let (shared, _rx) = shared(None);
        let wake = Arc::new(Notify::new());
        let generation = shared.begin_link();
        shared.mark_open(generation, &wake);

        assert!(shared.begin_close());
        assert!(shared.state.is_closing());
        assert!(shared.next_outbound(generation).is_none());
    }

    #[test]
    fn test_undrained_events_are_capped() {
        let (tx, rx) = bounded(4);
        let shared = Shared::new(None, tx);
        let errors = Arc::new(Mutex::new(0));
        let errors_clone = Arc::clone(&errors);
        shared.subscriptions.on_error(move |_| *errors_clone.lock() += 1);

        for _ in 0..10 {
            shared.handle_incoming(WsMessage::Text("{broken".into()));
        }

        assert_eq!(rx.len(), 4);
        assert_eq!(*errors.lock(), 10);
        assert_eq!(shared.metrics.malformed_frames(), 10);

        // Draining makes room again
        while rx.try_recv().is_ok() {}
        shared.emit(ClientEvent::Connected);
        assert_eq!(rx.try_recv(), Ok(ClientEvent::Connected));
    }
}
