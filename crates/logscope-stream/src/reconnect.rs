use std::time::Duration;

/// Backoff schedule for reconnecting after an unintended closure
///
/// Holds no state of its own; the attempt counter lives with the caller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    multiplier: f64,
    max_attempts: u32,
}

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

impl ReconnectPolicy {
    /// A zero base delay or a multiplier not above 1.0 falls back to the default,
    /// so every delay is longer than the one before
    pub fn new(base_delay: Duration, multiplier: f64, max_attempts: u32) -> Self {
        let base_delay = if base_delay.is_zero() {
            DEFAULT_BASE_DELAY
        } else {
            base_delay
        };
        let multiplier = if multiplier.is_finite() && multiplier > 1.0 {
            multiplier
        } else {
            DEFAULT_MULTIPLIER
        };
        Self {
            base_delay,
            multiplier,
            max_attempts,
        }
    }

    /// Delay before attempt number `attempt` (1-based): `base * multiplier^(attempt-1)`
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Whether `attempt` reconnects have already been spent
    pub fn should_give_up(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MULTIPLIER, DEFAULT_MAX_ATTEMPTS)
    }
}
