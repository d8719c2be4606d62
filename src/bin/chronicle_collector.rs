//! Development collector
//!
//! Accepts agent connections on the configured path and logs every frame.
//! Malformed input is logged and otherwise ignored. Lines typed on stdin that
//! are valid frames (e.g. `{"type":"set_tracking","message":{"enabled":false}}`)
//! are pushed to every connected agent.

use anyhow::{Context, Result};
use chronicle::{init_tracing_with_level, CollectorConfig, ShutdownManager};
use futures::{SinkExt, StreamExt};
use relaysockets::{Frame, WsMessage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use webchronicle::bin_common::{config_path, parse_args, BinaryRunner, ConfigType, RunConfig};

struct CollectorApp {
    run_config: RunConfig,
    config: CollectorConfig,
    shutdown: ShutdownManager,
    frames: Arc<AtomicU64>,
    connections: u64,
}

impl CollectorApp {
    fn new(config: CollectorConfig) -> Self {
        let shutdown = ShutdownManager::new();
        shutdown.spawn_signal_handler();

        Self {
            run_config: RunConfig::new("Chronicle Collector"),
            config,
            shutdown,
            frames: Arc::new(AtomicU64::new(0)),
            connections: 0,
        }
    }

    fn spawn_stdin_relay(push_tx: broadcast::Sender<String>) {
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                match Frame::parse(&WsMessage::Text(line)).and_then(|f| f.to_text()) {
                    Ok(text) => {
                        info!("Pushing frame to {} agent(s)", push_tx.receiver_count());
                        let _ = push_tx.send(text);
                    }
                    Err(e) => warn!("Not pushing invalid frame: {}", e),
                }
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    id: u64,
    path: String,
    frames: Arc<AtomicU64>,
    mut push_rx: broadcast::Receiver<String>,
    shutdown: ShutdownManager,
) {
    let check_path = |request: &Request, response: Response| {
        if request.uri().path() == path {
            Ok(response)
        } else {
            let mut rejection = ErrorResponse::new(Some("not found".to_string()));
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            Err(rejection)
        }
    };

    let ws = match accept_hdr_async(stream, check_path).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("[agent {}] Handshake rejected: {}", id, e);
            return;
        }
    };
    info!("[agent {}] Connected", id);

    let (mut write, mut read) = ws.split();
    loop {
        tokio::select! {
            msg = read.next() => {
                let raw = match msg {
                    Some(Ok(Message::Text(text))) => WsMessage::Text(text),
                    Some(Ok(Message::Binary(data))) => WsMessage::Binary(data),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("[agent {}] Read error: {}", id, e);
                        break;
                    }
                };

                match Frame::parse(&raw) {
                    Ok(frame) => {
                        frames.fetch_add(1, Ordering::Relaxed);
                        info!("[agent {}] {}: {}", id, frame.kind, frame.message);
                    }
                    Err(e) => warn!("[agent {}] Ignoring malformed frame: {}", id, e),
                }
            }
            pushed = push_rx.recv() => match pushed {
                Ok(text) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        warn!("[agent {}] Push failed: {}", id, e);
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("[agent {}] Skipped {} pushed frames", id, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = shutdown.wait() => {
                let _ = write.close().await;
                break;
            }
        }
    }

    info!("[agent {}] Disconnected", id);
}

impl BinaryRunner for CollectorApp {
    async fn run(&mut self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.config.bind_addr))?;
        info!("Listening on ws://{}{}", self.config.bind_addr, self.config.path);

        let (push_tx, _) = broadcast::channel::<String>(64);
        Self::spawn_stdin_relay(push_tx.clone());

        let shutdown = self.shutdown.clone();
        while shutdown.is_running() {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        self.connections += 1;
                        debug!("[agent {}] TCP connection from {}", self.connections, peer);
                        tokio::spawn(handle_connection(
                            stream,
                            self.connections,
                            self.config.path.clone(),
                            Arc::clone(&self.frames),
                            push_tx.subscribe(),
                            shutdown.clone(),
                        ));
                    }
                    Err(e) => error!("Accept failed: {}", e),
                },
                _ = shutdown.wait() => break,
            }
        }

        Ok(())
    }

    fn config(&self) -> &RunConfig {
        &self.run_config
    }

    fn summary(&self) -> Option<String> {
        Some(format!(
            "{} connections, {} frames received",
            self.connections,
            self.frames.load(Ordering::Relaxed)
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Load config first (before logging is initialized)
    let path = config_path(ConfigType::Collector, &parse_args());
    let config = if path.exists() {
        CollectorConfig::load(&path)
            .with_context(|| format!("Failed to load {}", path.display()))?
    } else {
        CollectorConfig::default()
    };

    init_tracing_with_level(&config.log_level);
    if !path.exists() {
        info!("No config at {}, using defaults", path.display());
    }
    config.log();

    let mut app = CollectorApp::new(config);
    app.execute().await
}
