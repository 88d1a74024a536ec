//! Bounded exponential backoff for completion polling

use std::time::Duration;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Poll schedule: starts at `initial`, doubles after every idle poll and
/// never exceeds `max`. Intervals are at least one millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBackoff {
    pub initial: Duration,
    pub max: Duration,
    /// Longest tolerated period without playback progress
    pub stall_timeout: Duration,
}

impl Default for PollBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(10),
            max: Duration::from_millis(500),
            stall_timeout: Duration::from_secs(5),
        }
    }
}

impl PollBackoff {
    pub fn new(initial: Duration, max: Duration, stall_timeout: Duration) -> Self {
        Self {
            initial: initial.max(MIN_INTERVAL).min(max.max(MIN_INTERVAL)),
            max: max.max(MIN_INTERVAL),
            stall_timeout,
        }
    }

    /// Interval following `current`.
    pub fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max)
    }

    /// Iterator over successive intervals, starting with `initial`.
    pub fn intervals(&self) -> impl Iterator<Item = Duration> + '_ {
        std::iter::successors(Some(self.initial), move |&d| Some(self.next(d)))
    }
}
