//! Activity agent
//!
//! Reads newline-delimited JSON host messages from stdin, feeds them to the
//! tracker and reports to the collector. Stops on Ctrl+C or when stdin closes.

use anyhow::{Context, Result};
use chrono::Utc;
use chronicle::{init_tracing_with_level, AgentConfig, ShutdownManager, Tracker};
use relaysockets::{ClientEvent, TransportClient};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use webchronicle::bin_common::{
    config_path, parse_args, parse_host_message, BinaryRunner, ConfigType, RunConfig,
};

struct AgentApp {
    run_config: RunConfig,
    client: Arc<TransportClient>,
    tracker: Arc<Tracker>,
    shutdown: ShutdownManager,
    relayed: u64,
    rejected: u64,
}

impl AgentApp {
    fn new(config: &AgentConfig) -> Result<Self> {
        let client = Arc::new(
            config
                .transport
                .build_client()
                .context("Failed to build transport client")?,
        );
        let tracker = Arc::new(Tracker::new(client.clone(), config.tracker.settings()));
        tracker.attach(&client);

        client.on_exhausted(|attempts| {
            error!(
                "Collector unreachable after {} attempts; frames will queue until restart",
                attempts
            );
        });

        let shutdown = ShutdownManager::new();
        shutdown.spawn_signal_handler();

        Ok(Self {
            run_config: RunConfig::new("Chronicle Agent"),
            client,
            tracker,
            shutdown,
            relayed: 0,
            rejected: 0,
        })
    }

    fn handle_line(&mut self, line: &str) {
        let message = match parse_host_message(line) {
            Ok(Some(message)) => message,
            Ok(None) => return,
            Err(e) => {
                warn!("Ignoring host message: {}", e);
                self.rejected += 1;
                return;
            }
        };

        match message.apply(&self.tracker, Utc::now()) {
            Ok(true) => self.relayed += 1,
            Ok(false) => debug!("Host message produced no report"),
            Err(e) => {
                warn!("Host message failed: {}", e);
                self.rejected += 1;
            }
        }
    }

    fn log_status(&self) {
        while let Some(event) = self.client.try_recv_event() {
            if let ClientEvent::Error(e) = &event {
                debug!("Transport error: {}", e);
            } else {
                debug!("Transport event: {:?}", event);
            }
        }

        let metrics = self.client.metrics();
        info!(
            "Status: {:?}, session {}, {} sent, {} queued, {} dropped",
            metrics.connection_state,
            self.tracker.session_id().unwrap_or_else(|| "-".to_string()),
            metrics.frames_sent,
            metrics.queued,
            metrics.frames_dropped
        );
    }
}

impl BinaryRunner for AgentApp {
    async fn run(&mut self) -> Result<()> {
        self.tracker.start(Utc::now())?;
        self.client.connect_default()?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut inactivity = tokio::time::interval(self.run_config.inactivity_check_interval);
        let mut status = tokio::time::interval(self.run_config.status_interval);
        let shutdown = self.shutdown.clone();

        while shutdown.is_running() {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.handle_line(&line),
                    Ok(None) => {
                        info!("Host input closed");
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read host input: {}", e);
                        break;
                    }
                },
                _ = inactivity.tick() => {
                    if let Err(e) = self.tracker.check_inactivity(Utc::now()) {
                        warn!("Inactivity check failed: {}", e);
                    }
                }
                _ = status.tick() => self.log_status(),
                _ = shutdown.wait() => break,
            }
        }

        self.client.shutdown().await?;
        Ok(())
    }

    fn config(&self) -> &RunConfig {
        &self.run_config
    }

    fn summary(&self) -> Option<String> {
        let metrics = self.client.metrics();
        Some(format!(
            "Relayed {} host messages ({} rejected), {} frames sent, {} left unsent",
            self.relayed, self.rejected, metrics.frames_sent, metrics.queued
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Load config first (before logging is initialized)
    let path = config_path(ConfigType::Agent, &parse_args());
    let config = AgentConfig::load(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    init_tracing_with_level(&config.log_level);
    config.log();

    let mut app = AgentApp::new(&config)?;
    app.execute().await
}
