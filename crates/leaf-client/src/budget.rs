//! Caller-imposed time budgets

use std::time::Duration;

use tokio::time::Instant;

/// Default safety margin kept back from a deadline so the socket gives up
/// before whoever imposed the deadline does.
pub const DEFAULT_MARGIN: Duration = Duration::from_millis(500);

/// Source of "milliseconds remaining" for the current operation.
///
/// Queried right before every network call. Zero or negative means no time
/// is left and the call must not be attempted.
pub trait TimeBudget: Send + Sync {
    fn remaining_millis(&self) -> i64;
}

impl<F> TimeBudget for F
where
    F: Fn() -> i64 + Send + Sync,
{
    fn remaining_millis(&self) -> i64 {
        self()
    }
}

/// A fixed point in time minus a safety margin
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    margin: Duration,
}

impl Deadline {
    /// Deadline `budget` from now, with [`DEFAULT_MARGIN`]
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            margin: DEFAULT_MARGIN,
        }
    }

    pub fn with_margin(mut self, margin: Duration) -> Self {
        self.margin = margin;
        self
    }
}

impl TimeBudget for Deadline {
    fn remaining_millis(&self) -> i64 {
        let left = self.at.saturating_duration_since(Instant::now());
        left.as_millis() as i64 - self.margin.as_millis() as i64
    }
}
