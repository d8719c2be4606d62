//! Browsing sessions
//!
//! A session is a run of activity without a gap longer than the inactivity
//! timeout. The clock only keeps bookkeeping; the tracker turns its outcomes
//! into `session_state_changed` frames.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;

/// Gap after which the next inactivity check starts a new session
pub const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const ID_SUFFIX_LEN: usize = 7;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `session_<epoch-ms>_<7 base36 chars>`
pub fn generate_session_id<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("session_{}_{}", now.timestamp_millis(), suffix)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Result of an inactivity check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InactivityOutcome {
    /// No session existed; one was started
    Started { started: String },
    /// The session went stale; it was ended and a new one started
    RolledOver { ended: String, started: String },
    /// The session is still live
    Active { session_id: String, idle: Duration },
}

#[derive(Debug)]
pub struct SessionClock {
    current: Option<Session>,
    inactivity_timeout: Duration,
}

impl SessionClock {
    pub fn new(inactivity_timeout: Duration) -> Self {
        Self {
            current: None,
            inactivity_timeout,
        }
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.id.as_str())
    }

    pub fn inactivity_timeout(&self) -> Duration {
        self.inactivity_timeout
    }

    /// Start a fresh session, replacing any current one, and return its id
    pub fn start(&mut self, now: DateTime<Utc>) -> String {
        let id = generate_session_id(now, &mut rand::thread_rng());
        self.current = Some(Session {
            id: id.clone(),
            started_at: now,
            last_activity: now,
        });
        id
    }

    /// Forget the current session, returning it
    pub fn end(&mut self) -> Option<Session> {
        self.current.take()
    }

    /// Record activity in the current session
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if let Some(session) = self.current.as_mut() {
            if now > session.last_activity {
                session.last_activity = now;
            }
        }
    }

    /// Time since the last recorded activity
    pub fn idle(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.current
            .as_ref()
            .map(|s| (now - s.last_activity).to_std().unwrap_or(Duration::ZERO))
    }

    /// Start a session if there is none, or roll over a stale one
    pub fn check_inactivity(&mut self, now: DateTime<Utc>) -> InactivityOutcome {
        let Some(idle) = self.idle(now) else {
            return InactivityOutcome::Started {
                started: self.start(now),
            };
        };

        if idle > self.inactivity_timeout {
            let ended = self.end().map(|s| s.id).unwrap_or_default();
            let started = self.start(now);
            InactivityOutcome::RolledOver { ended, started }
        } else {
            InactivityOutcome::Active {
                session_id: self.session_id().unwrap_or_default().to_string(),
                idle,
            }
        }
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new(INACTIVITY_TIMEOUT)
    }
}
