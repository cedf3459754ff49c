//! Jittered multiplicative backoff schedule.

use std::time::Duration;

/// Delay schedule between retry attempts.
///
/// The first retry waits exactly `initial`. Every following delay is drawn
/// uniformly from `[initial, 3 * previous]` and clamped to `max`, so growth is
/// roughly geometric while concurrent callers drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
}

impl Backoff {
    /// Creates a schedule. A `max` below `initial` is raised to `initial`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
        }
    }

    /// Computes the delay following `previous` using `unit` as the random draw.
    ///
    /// `unit` is clamped into `[0, 1]`. Passing `None` yields the seed delay.
    pub fn next_delay(&self, previous: Option<Duration>, unit: f64) -> Duration {
        let Some(previous) = previous else {
            return self.initial;
        };

        let unit = unit.clamp(0.0, 1.0);
        let initial = self.initial.as_nanos();
        let spread = (3 * previous.as_nanos()).saturating_sub(initial);
        let jitter = (unit * spread as f64) as u128;
        let nanos = u64::try_from(initial + jitter).unwrap_or(u64::MAX);

        Duration::from_nanos(nanos).clamp(self.initial, self.max)
    }

    /// Draws the next delay from the thread-local RNG.
    pub fn next_jittered(&self, previous: Option<Duration>) -> Duration {
        self.next_delay(previous, rand::random::<f64>())
    }
}
