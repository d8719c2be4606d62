//! Host input for the agent
//!
//! The host (a browser bridge, a script, a person at a terminal) writes one
//! JSON object per line, tagged by `kind`:
//!
//! ```text
//! {"kind":"tab","event":"tab_updated","tabId":3,"url":"https://example.com"}
//! {"kind":"window","width":1280,"height":800,"zoom":1.0}
//! {"kind":"blacklist","sites":["facebook.com"]}
//! {"kind":"tracking","enabled":false}
//! {"kind":"runtime","message":{"type":"event_logged","message":{...}}}
//! {"kind":"interaction","event":"click","details":{"x":10}}
//! ```

use chrono::{DateTime, Utc};
use chronicle::{TabEventKind, Tracker, WindowData};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostMessage {
    #[serde(rename_all = "camelCase")]
    Tab {
        event: TabEventKind,
        tab_id: i64,
        #[serde(default)]
        url: Option<String>,
    },
    Window {
        width: u32,
        height: u32,
        zoom: f64,
    },
    Blacklist {
        sites: Vec<String>,
    },
    Tracking {
        enabled: bool,
    },
    /// A `{type, message}` message relayed from page scripts
    Runtime {
        message: Value,
    },
    Interaction {
        event: String,
        #[serde(default)]
        details: Value,
    },
}

/// Blank lines yield `None`
pub fn parse_host_message(line: &str) -> serde_json::Result<Option<HostMessage>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

impl HostMessage {
    /// Apply to the tracker; returns whether anything was reported
    pub fn apply(self, tracker: &Tracker, now: DateTime<Utc>) -> chronicle::application::Result<bool> {
        match self {
            HostMessage::Tab { event, tab_id, url } => {
                tracker.tab_event(event, tab_id, url.as_deref(), now)
            }
            HostMessage::Window { width, height, zoom } => {
                tracker.window_data(&WindowData { width, height, zoom })
            }
            HostMessage::Blacklist { sites } => tracker.update_blacklist(sites).map(|_| true),
            HostMessage::Tracking { enabled } => {
                tracker.set_tracking(enabled, now).map(|_| true)
            }
            HostMessage::Runtime { message } => tracker.handle_runtime_message(&message, now),
            HostMessage::Interaction { event, details } => {
                tracker.log_interaction(&event, details, now)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle::{EventSink, TrackerError, TrackerSettings};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorder {
        frames: Mutex<Vec<(String, Value)>>,
    }

    impl EventSink for Recorder {
        fn send_frame(&self, kind: &str, message: Value) -> Result<(), TrackerError> {
            self.frames.lock().push((kind.to_string(), message));
            Ok(())
        }
    }

    #[test]
    fn test_parse_each_kind() {
        let tab = parse_host_message(
            r#"{"kind":"tab","event":"tab_created","tabId":4,"url":"https://example.com"}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            tab,
            HostMessage::Tab {
                event: TabEventKind::TabCreated,
                tab_id: 4,
                url: Some("https://example.com".to_string()),
            }
        );

        let closed = parse_host_message(r#"{"kind":"tab","event":"tab_closed","tabId":4}"#)
            .unwrap()
            .unwrap();
        assert!(matches!(closed, HostMessage::Tab { url: None, .. }));

        let tracking = parse_host_message(r#"{"kind":"tracking","enabled":true}"#)
            .unwrap()
            .unwrap();
        assert_eq!(tracking, HostMessage::Tracking { enabled: true });

        assert!(parse_host_message("   ").unwrap().is_none());
        assert!(parse_host_message(r#"{"kind":"unknown"}"#).is_err());
        assert!(parse_host_message("not json").is_err());
    }

    #[test]
    fn test_apply_routes_to_tracker() {
        let recorder = Arc::new(Recorder::default());
        let sink: Arc<dyn EventSink> = recorder.clone();
        let tracker = Tracker::new(sink, TrackerSettings::default());
        let now = Utc::now();
        tracker.start(now).unwrap();
        let baseline = recorder.frames.lock().len();

        let sent = HostMessage::Interaction {
            event: "click".to_string(),
            details: json!({ "x": 1 }),
        }
        .apply(&tracker, now)
        .unwrap();
        assert!(sent);

        let sent = HostMessage::Runtime {
            message: json!({ "type": "something_else", "message": {} }),
        }
        .apply(&tracker, now)
        .unwrap();
        assert!(!sent);

        let frames = recorder.frames.lock();
        assert_eq!(frames.len(), baseline + 1);
        assert_eq!(frames[baseline].0, "event_logged");
        assert_eq!(frames[baseline].1["event"], json!("click"));
    }
}
