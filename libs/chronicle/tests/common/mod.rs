//! Common test utilities for chronicle integration tests

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
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

/// Records every `{type, message}` frame and can push frames back
pub struct Collector {
    pub addr: SocketAddr,
    frames: Arc<Mutex<Vec<(String, Value)>>>,
    push_tx: broadcast::Sender<String>,
}

impl Collector {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let frames = Arc::new(Mutex::new(Vec::new()));
        let (push_tx, _) = broadcast::channel::<String>(16);

        {
            let frames = Arc::clone(&frames);
            let push_tx = push_tx.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let frames = Arc::clone(&frames);
                    let mut push_rx = push_tx.subscribe();
                    tokio::spawn(async move {
                        let Ok(ws) = accept_async(stream).await else {
                            return;
                        };
                        let (mut write, mut read) = ws.split();
                        loop {
                            tokio::select! {
                                msg = read.next() => match msg {
                                    Some(Ok(Message::Text(text))) => {
                                        if let Ok(frame) = serde_json::from_str::<Value>(&text) {
                                            let kind = frame["type"].as_str().unwrap_or_default().to_string();
                                            frames.lock().push((kind, frame["message"].clone()));
                                        }
                                    }
                                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                                    Some(Ok(_)) => {}
                                },
                                pushed = push_rx.recv() => match pushed {
                                    Ok(text) => {
                                        if write.send(Message::Text(text)).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(_) => break,
                                },
                            }
                        }
                    });
                }
            });
        }

        Self { addr, frames, push_tx }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn push(&self, frame: Value) {
        let _ = self.push_tx.send(frame.to_string());
    }

    pub fn frames(&self) -> Vec<(String, Value)> {
        self.frames.lock().clone()
    }

    pub fn kinds(&self) -> Vec<String> {
        self.frames().into_iter().map(|(kind, _)| kind).collect()
    }

    pub async fn wait_for_frames(&self, count: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.frames.lock().len() >= count).await
    }
}

pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
