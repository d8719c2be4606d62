//! Common test utilities for RelaySockets integration tests
//!
//! `MockCollector` is a small WebSocket server that records every text frame
//! it receives, can push frames to connected clients, kick them, or refuse
//! new handshakes to simulate an outage.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use relaysockets::{ClientEvent, TransportClient};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

#[derive(Debug, Clone)]
enum Control {
    Push(String),
    Kick,
}

/// A frame as seen by the collector
#[derive(Debug, Clone)]
pub struct Received {
    pub connection: usize,
    pub frame: Value,
}

struct CollectorState {
    received: Mutex<Vec<Received>>,
    accepted: AtomicUsize,
    active: AtomicUsize,
    refusing: AtomicBool,
}

pub struct MockCollector {
    pub addr: SocketAddr,
    state: Arc<CollectorState>,
    control: broadcast::Sender<Control>,
    shutdown: watch::Sender<bool>,
}

impl MockCollector {
    /// Create and start a new mock collector
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = Arc::new(CollectorState {
            received: Mutex::new(Vec::new()),
            accepted: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            refusing: AtomicBool::new(false),
        });
        let (control, _) = broadcast::channel(64);
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        {
            let state = Arc::clone(&state);
            let control = control.clone();
            let shutdown_rx_conn = shutdown.subscribe();

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        result = listener.accept() => match result {
                            Ok((stream, _)) => {
                                if state.refusing.load(Ordering::Acquire) {
                                    drop(stream);
                                    continue;
                                }
                                let state = Arc::clone(&state);
                                let control_rx = control.subscribe();
                                let shutdown = shutdown_rx_conn.clone();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, state, control_rx, shutdown).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        },
                        _ = shutdown_rx.changed() => break,
                    }
                }
            });
        }

        Self {
            addr,
            state,
            control,
            shutdown,
        }
    }

    async fn handle_connection(
        stream: TcpStream,
        state: Arc<CollectorState>,
        mut control_rx: broadcast::Receiver<Control>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let connection = state.accepted.fetch_add(1, Ordering::AcqRel) + 1;
        state.active.fetch_add(1, Ordering::AcqRel);
        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(frame) = serde_json::from_str::<Value>(&text) {
                            state.received.lock().push(Received { connection, frame });
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
                control = control_rx.recv() => match control {
                    Ok(Control::Push(text)) => {
                        if write.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Control::Kick) | Err(_) => {
                        let _ = write.close().await;
                        break;
                    }
                },
                _ = shutdown.changed() => break,
            }
        }

        state.active.fetch_sub(1, Ordering::AcqRel);
    }

    /// Get the WebSocket URL for this collector
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Send a raw text message to every connected client
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.control.send(Control::Push(text.into()));
    }

    /// Close every open connection from the server side
    pub fn kick(&self) {
        let _ = self.control.send(Control::Kick);
    }

    /// Drop new TCP connections before the handshake while `refuse` is true
    pub fn set_refusing(&self, refuse: bool) {
        self.state.refusing.store(refuse, Ordering::Release);
    }

    pub fn received(&self) -> Vec<Received> {
        self.state.received.lock().clone()
    }

    /// Frames received so far, `type` and `message` only
    pub fn frames(&self) -> Vec<(String, Value)> {
        self.received()
            .into_iter()
            .map(|r| {
                let kind = r.frame["type"].as_str().unwrap_or_default().to_string();
                (kind, r.frame["message"].clone())
            })
            .collect()
    }

    pub fn accepted(&self) -> usize {
        self.state.accepted.load(Ordering::Acquire)
    }

    pub fn active(&self) -> usize {
        self.state.active.load(Ordering::Acquire)
    }

    /// Wait until at least `count` frames arrived
    pub async fn wait_for_frames(&self, count: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.state.received.lock().len() >= count).await
    }

    /// Shutdown the collector
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl Drop for MockCollector {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Wait for the first client event matching `predicate`, skipping others
pub async fn wait_for_event(
    client: &TransportClient,
    timeout: Duration,
    mut predicate: impl FnMut(&ClientEvent) -> bool,
) -> Option<ClientEvent> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        while let Some(event) = client.try_recv_event() {
            verbose_println!("  event: {:?}", event);
            if predicate(&event) {
                return Some(event);
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    None
}

/// Collect every event that arrives within `window`
pub async fn drain_events(client: &TransportClient, window: Duration) -> Vec<ClientEvent> {
    tokio::time::sleep(window).await;
    std::iter::from_fn(|| client.try_recv_event()).collect()
}

/// An address nothing listens on
pub async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}/ws", addr)
}
