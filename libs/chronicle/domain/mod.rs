//! Domain Layer
//!
//! Sessions, the blacklist and the frames the tracker reports.
//! This layer has no dependencies on the transport or the application layer.

pub mod blacklist;
pub mod events;
pub mod session;

pub use blacklist::{is_host_allowed, Blacklist};
pub use events::{
    iso_timestamp, kinds, LoggedEvent, RuntimeMessage, SessionAction, SessionStateChanged,
    SetTracking, TabClosed, TabDetails, TabEvent, TabEventKind, TrackingStateChanged, WindowData,
};
pub use session::{generate_session_id, InactivityOutcome, Session, SessionClock, INACTIVITY_TIMEOUT};
