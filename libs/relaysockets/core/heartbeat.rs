//! Keep-alive pings for an open connection
//!
//! The connection task selects on [`Heartbeat::tick`] next to its socket
//! reads; each tick sends one WebSocket ping. With no interval configured
//! the tick never completes.

use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

pub(crate) struct Heartbeat {
    interval: Option<Interval>,
}

impl Heartbeat {
    /// The first tick fires one full period after the connection opens
    pub(crate) fn new(period: Option<Duration>) -> Self {
        let interval = period.filter(|p| !p.is_zero()).map(|period| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        Self { interval }
    }

    pub(crate) async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending().await,
        }
    }
}
