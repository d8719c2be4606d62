//! Reconnect state machine
//!
//! The driver task owns everything that decides *when* to connect: the
//! current link, the attempt counter and the single reconnect timer.
//! Commands from the client handle and notices from links are handled one
//! at a time, so a timer can never fire for a connection that has already
//! been replaced or closed.

use crate::core::client::{ClientEvent, Shared};
use crate::core::config::ClientConfig;
use crate::core::link::{LinkEvent, LinkHandle, LinkNotice, LinkSettings};
use crate::traits::{ReconnectionStrategy, RelayError};
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Sleep};
use tracing::{debug, error, info};

#[derive(Debug)]
pub(crate) enum ClientCommand {
    Connect(String),
    Close,
    Shutdown,
}

pub(crate) struct Driver {
    shared: Arc<Shared>,
    strategy: Box<dyn ReconnectionStrategy>,
    settings: LinkSettings,
    close_timeout: Duration,
    commands: mpsc::UnboundedReceiver<ClientCommand>,
    notice_tx: mpsc::UnboundedSender<LinkNotice>,
    notice_rx: mpsc::UnboundedReceiver<LinkNotice>,
    link: Option<LinkHandle>,
    target: Option<String>,
    attempts: usize,
    timer: Option<Pin<Box<Sleep>>>,
}

impl Driver {
    pub(crate) fn new(
        shared: Arc<Shared>,
        config: ClientConfig,
        commands: mpsc::UnboundedReceiver<ClientCommand>,
    ) -> Self {
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        Self {
            shared,
            strategy: config.reconnect_strategy,
            settings: LinkSettings {
                connect_timeout: config.connect_timeout,
                heartbeat: config.heartbeat,
            },
            close_timeout: config.close_timeout,
            commands,
            notice_tx,
            notice_rx,
            link: None,
            target: None,
            attempts: 0,
            timer: None,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(ClientCommand::Connect(url)) => self.connect(url).await,
                    Some(ClientCommand::Close) => self.close().await,
                    Some(ClientCommand::Shutdown) | None => {
                        self.close().await;
                        break;
                    }
                },

                Some(notice) = self.notice_rx.recv() => self.handle_notice(notice),

                _ = wait_timer(&mut self.timer) => {
                    self.timer = None;
                    self.attempts += 1;
                    self.shared.metrics.increment_reconnects();
                    info!("Reconnecting (attempt {})", self.attempts);
                    self.start_link();
                }
            }
        }

        info!("Client task exiting");
    }

    async fn connect(&mut self, url: String) {
        self.timer = None;

        if self.link.is_some() && self.shared.state.is_open() {
            info!(
                "Replacing open connection to {} with {}",
                self.target.as_deref().unwrap_or("?"),
                url
            );
        }
        self.retire_link().await;

        self.attempts = 0;
        self.strategy.reset();
        if self.shared.exhausted.swap(false, Ordering::AcqRel) {
            info!("Clearing exhausted reconnection state");
        }

        *self.shared.target.write() = Some(url.clone());
        self.target = Some(url);
        self.start_link();
    }

    async fn close(&mut self) {
        self.timer = None;
        self.target = None;
        *self.shared.target.write() = None;

        self.retire_link().await;
    }

    fn start_link(&mut self) {
        let Some(url) = self.target.clone() else {
            debug!("No target address, not connecting");
            return;
        };

        let generation = self.shared.begin_link();
        debug!("Starting connection {} to {}", generation, url);

        self.link = Some(LinkHandle::spawn(
            Arc::clone(&self.shared),
            url,
            generation,
            self.settings.clone(),
            self.notice_tx.clone(),
        ));
    }

    /// Close the current link, if any, without consulting the policy
    async fn retire_link(&mut self) {
        let Some(link) = self.link.take() else {
            return;
        };

        let was_open = self.shared.begin_close();
        link.close(self.close_timeout).await;
        self.shared.set_disconnected();

        if was_open {
            self.shared.emit(ClientEvent::Disconnected);
            self.shared.subscriptions.notify_close();
        }
    }

    fn handle_notice(&mut self, notice: LinkNotice) {
        let current = self.link.as_ref().map(|link| link.generation);
        if current != Some(notice.generation) {
            debug!("Ignoring notice from stale connection {}", notice.generation);
            return;
        }

        match notice.event {
            LinkEvent::Opened => {
                self.attempts = 0;
                self.strategy.reset();
                self.timer = None;
                self.shared.emit(ClientEvent::Connected);
                self.shared.subscriptions.notify_open();
            }
            LinkEvent::Closed { was_open, reason } => {
                self.link = None;
                debug!("Connection {} ended: {}", notice.generation, reason);

                if was_open {
                    self.shared.emit(ClientEvent::Disconnected);
                    self.shared.subscriptions.notify_close();
                }

                self.schedule_reconnect();
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        self.timer = None;

        match self.strategy.next_delay(self.attempts) {
            Some(delay) => {
                let attempt = self.attempts + 1;
                info!("Reconnecting in {:?} (attempt {})", delay, attempt);
                self.timer = Some(Box::pin(sleep(delay)));
                self.shared.emit(ClientEvent::Reconnecting { attempt, delay });
            }
            None => {
                if self.shared.exhausted.swap(true, Ordering::AcqRel) {
                    return;
                }
                let err = RelayError::ReconnectionExhausted {
                    attempts: self.attempts,
                };
                error!("{}, giving up", err);
                self.shared.emit(ClientEvent::Exhausted {
                    attempts: self.attempts,
                });
                self.shared.subscriptions.notify_exhausted(self.attempts);
            }
        }
    }
}

async fn wait_timer(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
