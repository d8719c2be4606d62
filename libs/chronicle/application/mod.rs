//! Application Layer
//!
//! The tracker use case and the sink it reports through.

pub mod sink;
pub mod tracker;

pub use sink::EventSink;
pub use tracker::{Result, Tracker, TrackerError, TrackerSettings};
