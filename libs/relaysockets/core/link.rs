//! One physical WebSocket connection
//!
//! A link is spawned per connection attempt and never reused. It connects,
//! flips the shared state to `Open`, drains the Send Queue, and then pumps
//! reads, queued writes and heartbeats until the socket ends or the driver
//! asks it to close. Every touch of shared state is guarded by the link's
//! generation: once the driver moves on, a stale link can no longer open,
//! pop frames, or change the state.

use crate::core::client::Shared;
use crate::core::heartbeat::Heartbeat;
use crate::traits::*;
use futures::{Sink, SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Per-link settings copied out of the client configuration
#[derive(Debug, Clone)]
pub(crate) struct LinkSettings {
    pub(crate) connect_timeout: Duration,
    pub(crate) heartbeat: Option<Duration>,
}

#[derive(Debug)]
pub(crate) enum LinkEvent {
    /// The socket is open and the link owns the outbound side
    Opened,
    /// The link is gone; `was_open` is false for a failed attempt
    Closed { was_open: bool, reason: String },
}

/// Link event tagged with the generation that produced it
#[derive(Debug)]
pub(crate) struct LinkNotice {
    pub(crate) generation: u64,
    pub(crate) event: LinkEvent,
}

/// Driver-side handle to a running link
pub(crate) struct LinkHandle {
    pub(crate) generation: u64,
    close_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl LinkHandle {
    pub(crate) fn spawn(
        shared: Arc<Shared>,
        url: String,
        generation: u64,
        settings: LinkSettings,
        notices: mpsc::UnboundedSender<LinkNotice>,
    ) -> Self {
        let (close_tx, close_rx) = oneshot::channel();
        let task = tokio::spawn(run_link(shared, url, generation, settings, close_rx, notices));

        Self {
            generation,
            close_tx: Some(close_tx),
            task,
        }
    }

    /// Ask the link to close and wait for it, aborting after `timeout`
    pub(crate) async fn close(mut self, timeout: Duration) {
        if let Some(close_tx) = self.close_tx.take() {
            let _ = close_tx.send(());
        }

        if tokio::time::timeout(timeout, &mut self.task).await.is_err() {
            warn!(
                "Connection {} did not close within {:?}, aborting",
                self.generation, timeout
            );
            self.task.abort();
        }
    }
}

async fn run_link(
    shared: Arc<Shared>,
    url: String,
    generation: u64,
    settings: LinkSettings,
    mut close_rx: oneshot::Receiver<()>,
    notices: mpsc::UnboundedSender<LinkNotice>,
) {
    debug!("Connection {} connecting to {}", generation, url);

    let attempt = tokio::time::timeout(settings.connect_timeout, connect_async(url.as_str()));
    let ws_stream = tokio::select! {
        _ = &mut close_rx => {
            debug!("Connection attempt {} cancelled", generation);
            return;
        }
        result = attempt => match result {
            Ok(Ok((ws_stream, _))) => ws_stream,
            Ok(Err(e)) => {
                let reason = format!("failed to connect to {}: {}", url, e);
                shared.report_error(RelayError::WebSocket(reason.clone()));
                finish(&shared, &notices, generation, false, reason);
                return;
            }
            Err(_) => {
                let reason = format!(
                    "connecting to {} took longer than {:?}",
                    url, settings.connect_timeout
                );
                shared.report_error(RelayError::Timeout(reason.clone()));
                finish(&shared, &notices, generation, false, reason);
                return;
            }
        }
    };

    let (mut write, mut read) = ws_stream.split();
    let wake = Arc::new(Notify::new());

    if !shared.mark_open(generation, &wake) {
        debug!("Connection {} was replaced while connecting, closing it", generation);
        let _ = write.close().await;
        return;
    }

    info!("Connected to {}", url);
    let _ = notices.send(LinkNotice {
        generation,
        event: LinkEvent::Opened,
    });

    let mut heartbeat = Heartbeat::new(settings.heartbeat);

    let reason = loop {
        // Backlog first: anything queued before this point leaves before
        // anything queued after it.
        if let Err(e) = flush(&shared, generation, &mut write).await {
            let reason = e.to_string();
            shared.report_error(e);
            break reason;
        }

        tokio::select! {
            _ = &mut close_rx => {
                debug!("Closing connection {}", generation);
                let _ = write.close().await;
                return;
            }

            _ = wake.notified() => {}

            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => shared.handle_incoming(WsMessage::Text(text)),
                Some(Ok(Message::Binary(data))) => shared.handle_incoming(WsMessage::Binary(data)),
                Some(Ok(Message::Close(frame))) => {
                    break match frame {
                        Some(frame) => format!("closed by server ({}): {}", frame.code, frame.reason),
                        None => "closed by server".to_string(),
                    };
                }
                // Pings are answered by tungstenite itself
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let reason = e.to_string();
                    shared.report_error(RelayError::WebSocket(reason.clone()));
                    break reason;
                }
                None => break "stream ended".to_string(),
            },

            _ = heartbeat.tick() => {
                if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                    let reason = format!("failed to send heartbeat: {}", e);
                    shared.report_error(RelayError::WebSocket(reason.clone()));
                    break reason;
                }
                debug!("Heartbeat sent on connection {}", generation);
            }
        }
    };

    warn!("Connection to {} lost: {}", url, reason);
    finish(&shared, &notices, generation, true, reason);
}

/// Write queued frames until the queue is empty or this link is stale
///
/// A frame leaves the queue only after its write succeeds, so a failed or
/// aborted write leaves it at the head for the next connection.
async fn flush<S>(shared: &Shared, generation: u64, write: &mut S) -> Result<()>
where
    S: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    while let Some((seq, frame)) = shared.next_outbound(generation) {
        let text = match frame.to_text() {
            Ok(text) => text,
            Err(e) => {
                warn!("Dropping frame {:?} that cannot be encoded: {}", frame.kind, e);
                shared.complete_outbound(seq);
                continue;
            }
        };

        write
            .send(Message::Text(text))
            .await
            .map_err(|e| RelayError::WebSocket(format!("failed to send frame: {}", e)))?;

        shared.complete_outbound(seq);
        shared.metrics.increment_sent();
    }

    Ok(())
}

fn finish(
    shared: &Shared,
    notices: &mpsc::UnboundedSender<LinkNotice>,
    generation: u64,
    was_open: bool,
    reason: String,
) {
    shared.mark_disconnected(generation);
    let _ = notices.send(LinkNotice {
        generation,
        event: LinkEvent::Closed { was_open, reason },
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio_tungstenite::tungstenite;

    /// Records text frames; refuses the write at index `fail_at`
    struct ScriptedSink {
        written: Vec<String>,
        fail_at: Option<usize>,
    }

    impl ScriptedSink {
        fn new(fail_at: Option<usize>) -> Self {
            Self {
                written: Vec::new(),
                fail_at,
            }
        }

        fn seqs(&self) -> Vec<u64> {
            self.written
                .iter()
                .map(|text| {
                    let value: serde_json::Value = serde_json::from_str(text).unwrap();
                    value["message"]["seq"].as_u64().unwrap()
                })
                .collect()
        }
    }

    impl Sink<Message> for ScriptedSink {
        type Error = tungstenite::Error;

        fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(mut self: Pin<&mut Self>, item: Message) -> std::result::Result<(), Self::Error> {
            if self.fail_at == Some(self.written.len()) {
                return Err(tungstenite::Error::ConnectionClosed);
            }
            if let Message::Text(text) = item {
                self.written.push(text);
            }
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
    }

    fn open_shared(frames: u64) -> (Shared, u64) {
        let (event_tx, _event_rx) = crossbeam_channel::bounded(16);
        let shared = Shared::new(None, event_tx);
        for seq in 0..frames {
            shared.enqueue(Frame::new("tab_event", json!({ "seq": seq })));
        }

        let generation = shared.begin_link();
        assert!(shared.mark_open(generation, &Arc::new(Notify::new())));
        (shared, generation)
    }

    #[tokio::test]
    async fn test_failed_write_keeps_frame_at_head() {
        let (shared, generation) = open_shared(3);

        let mut broken = ScriptedSink::new(Some(1));
        assert!(flush(&shared, generation, &mut broken).await.is_err());
        assert_eq!(broken.seqs(), vec![0]);
        assert_eq!(shared.queued_len(), 2);
        assert_eq!(shared.metrics.frames_sent(), 1);

        // The next connection picks up exactly where the last one stopped
        let generation = shared.begin_link();
        assert!(shared.mark_open(generation, &Arc::new(Notify::new())));
        let mut healthy = ScriptedSink::new(None);
        flush(&shared, generation, &mut healthy).await.unwrap();

        assert_eq!(healthy.seqs(), vec![1, 2]);
        assert_eq!(shared.queued_len(), 0);
        assert_eq!(shared.metrics.frames_sent(), 3);
    }

    #[tokio::test]
    async fn test_stale_link_writes_nothing() {
        let (shared, generation) = open_shared(2);
        shared.begin_close();

        let mut sink = ScriptedSink::new(None);
        flush(&shared, generation, &mut sink).await.unwrap();

        assert!(sink.written.is_empty());
        assert_eq!(shared.queued_len(), 2);
    }
}
