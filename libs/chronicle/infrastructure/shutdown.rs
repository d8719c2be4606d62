//! Graceful shutdown management

use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

/// Manages graceful shutdown for long-running processes
///
/// Clones share one flag; any of them can trigger shutdown and every
/// `wait` resolves once it has been triggered.
#[derive(Clone)]
pub struct ShutdownManager {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl ShutdownManager {
    /// Create a new shutdown manager with running state
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    /// Spawn a Ctrl+C signal handler that triggers shutdown
    pub fn spawn_signal_handler(&self) {
        let manager = self.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                info!("");
                info!("Received shutdown signal (Ctrl+C)");
                info!("Shutting down gracefully...");
                manager.trigger();
            }
        });
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Check if the process should continue running
    pub fn is_running(&self) -> bool {
        !*self.rx.borrow()
    }

    /// Resolve once shutdown has been triggered
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// Sleep for a duration, but wake early if shutdown is triggered
    ///
    /// Returns false when woken by shutdown.
    pub async fn interruptible_sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_running(),
            _ = self.wait() => false,
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}
