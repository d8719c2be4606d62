//! Session/activity tracker
//!
//! Turns host activity (tab changes, window info, page interactions) into
//! frames for the collector, gated by the tracking toggle and the blacklist,
//! and keeps the session clock. Frames reach the sink while the state lock
//! is held, so the collector sees them in the order the state changed: no
//! activity frame can follow the `tracking_state_changed` that disabled it.

use crate::application::sink::EventSink;
use crate::domain::*;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use relaysockets::{Frame, RelayError, TransportClient};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Transport error: {0}")]
    Transport(#[from] RelayError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub tracking_enabled: bool,
    pub blacklist: Vec<String>,
    pub inactivity_timeout: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            tracking_enabled: true,
            blacklist: Vec::new(),
            inactivity_timeout: INACTIVITY_TIMEOUT,
        }
    }
}

struct TrackerState {
    tracking: bool,
    clock: SessionClock,
    blacklist: Blacklist,
}

/// Frames collected by one state change, sent together
type Outbox = Vec<(&'static str, Value)>;

fn push<T: Serialize>(outbox: &mut Outbox, kind: &'static str, payload: &T) -> Result<()> {
    outbox.push((kind, serde_json::to_value(payload)?));
    Ok(())
}

fn push_session(
    outbox: &mut Outbox,
    session_id: String,
    action: SessionAction,
    now: DateTime<Utc>,
) -> Result<()> {
    info!("Session {:?}: {}", action, session_id);
    push(
        outbox,
        kinds::SESSION_STATE_CHANGED,
        &SessionStateChanged {
            session_id,
            action,
            timestamp: iso_timestamp(now),
        },
    )
}

pub struct Tracker {
    sink: Arc<dyn EventSink>,
    state: Mutex<TrackerState>,
}

impl Tracker {
    pub fn new(sink: Arc<dyn EventSink>, settings: TrackerSettings) -> Self {
        Self {
            sink,
            state: Mutex::new(TrackerState {
                tracking: settings.tracking_enabled,
                clock: SessionClock::new(settings.inactivity_timeout),
                blacklist: Blacklist::new(settings.blacklist),
            }),
        }
    }

    /// Subscribe to the collector's policy frames on `client`
    ///
    /// Handlers hold only a weak reference, so dropping the tracker
    /// silently disables them.
    pub fn attach(self: &Arc<Self>, client: &TransportClient) {
        let weak: Weak<Tracker> = Arc::downgrade(self);
        client.on_message(
            kinds::UPDATE_BLACKLIST,
            move |frame: &Frame| -> relaysockets::Result<()> {
                let Some(tracker) = weak.upgrade() else {
                    return Ok(());
                };
                let sites: Vec<String> = serde_json::from_value(frame.message.clone())?;
                tracker.apply_blacklist(sites);
                Ok(())
            },
        );

        let weak: Weak<Tracker> = Arc::downgrade(self);
        client.on_message(
            kinds::SET_TRACKING,
            move |frame: &Frame| -> relaysockets::Result<()> {
                let Some(tracker) = weak.upgrade() else {
                    return Ok(());
                };
                let payload: SetTracking = serde_json::from_value(frame.message.clone())?;
                tracker
                    .apply_tracking(payload.enabled, false, Utc::now())
                    .map_err(|e| RelayError::Handler(e.to_string()))
            },
        );
    }

    pub fn is_tracking(&self) -> bool {
        self.state.lock().tracking
    }

    pub fn session_id(&self) -> Option<String> {
        self.state.lock().clock.session_id().map(str::to_string)
    }

    pub fn blacklist(&self) -> Vec<String> {
        self.state.lock().blacklist.sites().to_vec()
    }

    /// Report the tracking state and, while tracking, open a session
    pub fn start(&self, now: DateTime<Utc>) -> Result<()> {
        let mut outbox = Outbox::new();
        let mut state = self.state.lock();
        info!("Tracking enabled: {}", state.tracking);
        push(
            &mut outbox,
            kinds::TRACKING_STATE_CHANGED,
            &TrackingStateChanged {
                enabled: state.tracking,
                session_id: state.clock.session_id().map(str::to_string),
                timestamp: iso_timestamp(now),
            },
        )?;

        if state.tracking {
            Self::inactivity_frames(&mut state, &mut outbox, now)?;
        }
        self.flush(outbox)
    }

    /// End a stale session and start a new one (or start the first one)
    pub fn check_inactivity(&self, now: DateTime<Utc>) -> Result<()> {
        let mut outbox = Outbox::new();
        let mut state = self.state.lock();
        if !state.tracking {
            debug!("Tracking is disabled, skipping inactivity check");
            return Ok(());
        }
        Self::inactivity_frames(&mut state, &mut outbox, now)?;
        self.flush(outbox)
    }

    fn inactivity_frames(
        state: &mut TrackerState,
        outbox: &mut Outbox,
        now: DateTime<Utc>,
    ) -> Result<()> {
        match state.clock.check_inactivity(now) {
            InactivityOutcome::Started { started } => {
                info!("No previous session found, starting new session");
                push_session(outbox, started, SessionAction::Start, now)
            }
            InactivityOutcome::RolledOver { ended, started } => {
                info!("Session timeout detected, starting new session");
                push_session(outbox, ended, SessionAction::End, now)?;
                push_session(outbox, started, SessionAction::Start, now)
            }
            InactivityOutcome::Active { session_id, idle } => {
                debug!("Session {} still active ({}s idle)", session_id, idle.as_secs());
                Ok(())
            }
        }
    }

    /// Switch tracking on or off from the host side
    pub fn set_tracking(&self, enabled: bool, now: DateTime<Utc>) -> Result<()> {
        self.apply_tracking(enabled, true, now)
    }

    /// `report` is false for changes that came from the collector itself
    fn apply_tracking(&self, enabled: bool, report: bool, now: DateTime<Utc>) -> Result<()> {
        let mut outbox = Outbox::new();
        let mut state = self.state.lock();
        if state.tracking == enabled {
            debug!("Tracking already {}", if enabled { "enabled" } else { "disabled" });
            return Ok(());
        }
        state.tracking = enabled;
        info!("Tracking state changed: {}", enabled);

        if enabled {
            let started = state.clock.start(now);
            push_session(&mut outbox, started, SessionAction::Start, now)?;
        } else if let Some(ended) = state.clock.end() {
            push_session(&mut outbox, ended.id, SessionAction::End, now)?;
        }

        if report {
            push(
                &mut outbox,
                kinds::TRACKING_STATE_CHANGED,
                &TrackingStateChanged {
                    enabled,
                    session_id: state.clock.session_id().map(str::to_string),
                    timestamp: iso_timestamp(now),
                },
            )?;
        }
        self.flush(outbox)
    }

    /// Replace the blacklist locally and tell the collector
    pub fn update_blacklist(&self, sites: Vec<String>) -> Result<()> {
        let mut state = self.state.lock();
        state.blacklist.set(sites);
        info!("Updated blacklisted sites: {:?}", state.blacklist.sites());
        self.sink.send_frame(
            kinds::UPDATE_BLACKLIST,
            serde_json::to_value(state.blacklist.sites())?,
        )
    }

    fn apply_blacklist(&self, sites: Vec<String>) {
        let mut state = self.state.lock();
        state.blacklist.set(sites);
        info!("Blacklist replaced by collector: {:?}", state.blacklist.sites());
    }

    /// Report a tab change if tracking and the page is trackable
    ///
    /// Returns whether a frame was sent.
    pub fn tab_event(
        &self,
        kind: TabEventKind,
        tab_id: i64,
        url: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if kind == TabEventKind::TabClosed {
            return self.tab_closed(tab_id, now);
        }

        let mut state = self.state.lock();
        if !state.tracking || !state.blacklist.is_trackable(url) {
            return Ok(false);
        }
        state.clock.touch(now);

        let frame = TabEvent {
            event: kind,
            timestamp: iso_timestamp(now),
            details: TabDetails {
                tab_id,
                url: url.unwrap_or_default().to_string(),
            },
        };

        debug!("Tab event: {:?}", frame);
        self.sink
            .send_frame(kinds::TAB_EVENT, serde_json::to_value(&frame)?)?;
        Ok(true)
    }

    /// Tab close carries no URL, so only the tracking toggle applies
    pub fn tab_closed(&self, tab_id: i64, now: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.lock();
        if !state.tracking {
            return Ok(false);
        }
        state.clock.touch(now);

        self.sink
            .send_frame(kinds::TAB_EVENT, serde_json::to_value(TabClosed::new(tab_id))?)?;
        Ok(true)
    }

    pub fn window_data(&self, data: &WindowData) -> Result<bool> {
        let state = self.state.lock();
        if !state.tracking {
            return Ok(false);
        }
        self.sink
            .send_frame(kinds::WINDOW_DATA, serde_json::to_value(data)?)?;
        Ok(true)
    }

    /// Forward a page interaction payload unchanged
    pub fn log_event(&self, payload: Value, now: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.lock();
        if !state.tracking {
            return Ok(false);
        }
        state.clock.touch(now);

        info!("Event logged: {}", payload);
        self.sink.send_frame(kinds::EVENT_LOGGED, payload)?;
        Ok(true)
    }

    /// Build an `event_logged` payload for one interaction and forward it
    pub fn log_interaction(&self, event: &str, details: Value, now: DateTime<Utc>) -> Result<bool> {
        let logged = LoggedEvent {
            timestamp: iso_timestamp(now),
            event: event.to_string(),
            details,
        };
        self.log_event(serde_json::to_value(logged)?, now)
    }

    /// Handle a `{type, message}` message from the host's page scripts
    ///
    /// Only `event_logged` is understood; other types are ignored.
    pub fn handle_runtime_message(&self, message: &Value, now: DateTime<Utc>) -> Result<bool> {
        let message: RuntimeMessage = serde_json::from_value(message.clone())
            .map_err(|e| TrackerError::InvalidMessage(e.to_string()))?;

        if message.kind == kinds::EVENT_LOGGED {
            self.log_event(message.message, now)
        } else {
            warn!("Ignoring runtime message of type {:?}", message.kind);
            Ok(false)
        }
    }

    /// Called with the state lock held
    fn flush(&self, outbox: Outbox) -> Result<()> {
        for (kind, message) in outbox {
            self.sink.send_frame(kind, message)?;
        }
        Ok(())
    }
}
