//! Overall time budget for one extraction.

use std::time::Duration;

use tokio::time::Instant;

/// A point in time after which no further work should be started.
///
/// One deadline is created per extraction and shared by every fetch, token
/// lookup and probe it makes, so retries consume the same budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// A deadline no later than this one and no more than `max` away.
    pub fn narrowed(&self, max: Duration) -> Self {
        Self {
            at: self.at.min(Instant::now() + max),
        }
    }

    pub fn instant(&self) -> Instant {
        self.at
    }
}
