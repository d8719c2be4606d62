use std::time::Duration;

/// Trait for defining reconnection strategies
///
/// Implement this trait to control how long the client waits between
/// reconnection attempts and when it gives up.
pub trait ReconnectionStrategy: Send + Sync {
    /// Get the delay before the next reconnection attempt
    ///
    /// # Arguments
    /// * `attempts` - Reconnection attempts already made since the last
    ///   successful open (0 right after a live connection drops)
    ///
    /// # Returns
    /// * `Some(duration)` - Wait this long, then attempt again
    /// * `None` - Stop reconnecting
    fn next_delay(&self, attempts: usize) -> Option<Duration>;

    /// Check if another attempt is allowed after `attempts` attempts
    fn should_reconnect(&self, attempts: usize) -> bool {
        self.next_delay(attempts).is_some()
    }

    /// Attempt ceiling, if any (used for logging)
    fn max_attempts(&self) -> Option<usize> {
        None
    }

    /// Reset the strategy state (called after a successful open)
    fn reset(&mut self) {}
}

/// Two-tier backoff: a short fixed delay, plus one long cooldown after
/// every `cooldown_every` attempts, up to an attempt ceiling.
///
/// With the reference values the client retries every 5s; after attempts
/// 5, 10, 15 and 20 it first waits out a 60s cooldown, and after 25 failed
/// attempts it gives up.
#[derive(Debug, Clone)]
pub struct TieredBackoff {
    short_delay: Duration,
    cooldown: Duration,
    cooldown_every: usize,
    max_attempts: Option<usize>,
}

impl TieredBackoff {
    pub const SHORT_DELAY: Duration = Duration::from_secs(5);
    pub const COOLDOWN: Duration = Duration::from_secs(60);
    pub const COOLDOWN_EVERY: usize = 5;
    pub const MAX_ATTEMPTS: usize = 25;

    /// Create a new tiered backoff strategy
    ///
    /// # Arguments
    /// * `short_delay` - Delay before a regular attempt
    /// * `cooldown` - Extra wait inserted after every `cooldown_every` attempts
    /// * `cooldown_every` - Cooldown period in attempts (0 disables the cooldown)
    /// * `max_attempts` - Maximum number of attempts (None = unlimited)
    pub fn new(
        short_delay: Duration,
        cooldown: Duration,
        cooldown_every: usize,
        max_attempts: Option<usize>,
    ) -> Self {
        Self {
            short_delay,
            cooldown,
            cooldown_every,
            max_attempts,
        }
    }

    /// Whether the wait after `attempts` attempts includes the cooldown
    pub fn is_cooldown(&self, attempts: usize) -> bool {
        self.cooldown_every > 0 && attempts > 0 && attempts % self.cooldown_every == 0
    }

    pub fn short_delay(&self) -> Duration {
        self.short_delay
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

impl Default for TieredBackoff {
    fn default() -> Self {
        Self::new(
            Self::SHORT_DELAY,
            Self::COOLDOWN,
            Self::COOLDOWN_EVERY,
            Some(Self::MAX_ATTEMPTS),
        )
    }
}

impl ReconnectionStrategy for TieredBackoff {
    fn next_delay(&self, attempts: usize) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempts >= max) {
            return None;
        }

        if self.is_cooldown(attempts) {
            Some(self.cooldown + self.short_delay)
        } else {
            Some(self.short_delay)
        }
    }

    fn max_attempts(&self) -> Option<usize> {
        self.max_attempts
    }
}

/// Exponential backoff reconnection strategy
///
/// Delays grow as initial_delay * 2^attempts, capped at max_delay.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<usize>,
}

impl ExponentialBackoff {
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_attempts,
        }
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, attempts: usize) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempts >= max) {
            return None;
        }

        let factor = u32::try_from(attempts)
            .ok()
            .and_then(|shift| 1u64.checked_shl(shift))
            .unwrap_or(u64::MAX);
        let initial_ms = u64::try_from(self.initial_delay.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);

        Some(Duration::from_millis(initial_ms.saturating_mul(factor).min(max_ms)))
    }

    fn max_attempts(&self) -> Option<usize> {
        self.max_attempts
    }
}

/// Fixed delay reconnection strategy
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<usize>,
}

impl FixedDelay {
    pub fn new(delay: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&self, attempts: usize) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempts >= max) {
            return None;
        }
        Some(self.delay)
    }

    fn max_attempts(&self) -> Option<usize> {
        self.max_attempts
    }
}

/// Never reconnect; the first unexpected close exhausts the policy
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverReconnect;

impl ReconnectionStrategy for NeverReconnect {
    fn next_delay(&self, _attempts: usize) -> Option<Duration> {
        None
    }

    fn max_attempts(&self) -> Option<usize> {
        Some(0)
    }
}
