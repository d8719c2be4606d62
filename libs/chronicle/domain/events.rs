//! Activity frames sent to the collector
//!
//! Field names follow the collector's JSON contract (camelCase ids,
//! snake_case event names, ISO-8601 UTC timestamps with milliseconds).

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frame types produced or consumed by the tracker
pub mod kinds {
    pub const SESSION_STATE_CHANGED: &str = "session_state_changed";
    pub const TRACKING_STATE_CHANGED: &str = "tracking_state_changed";
    pub const TAB_EVENT: &str = "tab_event";
    pub const UPDATE_BLACKLIST: &str = "update_blacklist";
    pub const WINDOW_DATA: &str = "window_data";
    pub const EVENT_LOGGED: &str = "event_logged";
    /// Inbound only: the collector switches tracking on or off
    pub const SET_TRACKING: &str = "set_tracking";
}

/// `2024-01-01T12:00:00.000Z`
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionAction {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStateChanged {
    pub session_id: String,
    pub action: SessionAction,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingStateChanged {
    pub enabled: bool,
    /// `null` when no session is running
    pub session_id: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabEventKind {
    TabCreated,
    TabUpdated,
    TabHighlighted,
    TabClosed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabDetails {
    pub tab_id: i64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabEvent {
    pub event: TabEventKind,
    pub timestamp: String,
    pub details: TabDetails,
}

/// Tab close is reported flat and without a timestamp or URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabClosed {
    pub event: TabEventKind,
    pub tab_id: i64,
    pub url: String,
}

impl TabClosed {
    pub fn new(tab_id: i64) -> Self {
        Self {
            event: TabEventKind::TabClosed,
            tab_id,
            url: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowData {
    pub width: u32,
    pub height: u32,
    pub zoom: f64,
}

/// A page-level interaction (click, scroll, input) relayed by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedEvent {
    pub timestamp: String,
    pub event: String,
    #[serde(default)]
    pub details: Value,
}

/// Message from the host side, shaped `{type, message}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: Value,
}

/// Inbound `set_tracking` payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetTracking {
    pub enabled: bool,
}
