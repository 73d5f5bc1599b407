use std::time::{Duration, Instant};

/// Tracks a deadline against the monotonic clock.
///
/// A `Timeout` captures its start instant at construction. Budgets are
/// measured either from the stored duration or from per-call overrides,
/// so a single start point can serve several layered bounds.
#[derive(Debug, Clone, Copy)]
pub struct Timeout {
    start: Instant,
    duration: Duration,
}

impl Timeout {
    /// Start a timeout with the given budget.
    pub fn new(duration: Duration) -> Self {
        Self {
            start: Instant::now(),
            duration,
        }
    }

    /// True once the stored budget is used up.
    pub fn elapsed(&self) -> bool {
        self.elapsed_with(self.duration)
    }

    /// True once `budget` is used up, measured from this timeout's start.
    pub fn elapsed_with(&self, budget: Duration) -> bool {
        self.start.elapsed() >= budget
    }

    /// Time left in the stored budget, saturating at zero.
    pub fn remaining(&self) -> Duration {
        self.remaining_with(self.duration)
    }

    /// Time left in `budget`, saturating at zero.
    pub fn remaining_with(&self, budget: Duration) -> Duration {
        budget.saturating_sub(self.start.elapsed())
    }
}

impl Default for Timeout {
    /// A zero-budget timeout, meant to be used with explicit overrides.
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_budget_is_elapsed_immediately() {
        let timeout = Timeout::new(Duration::ZERO);
        assert!(timeout.elapsed());
        assert_eq!(timeout.remaining(), Duration::ZERO);
    }

    #[test]
    fn fresh_budget_is_not_elapsed() {
        let timeout = Timeout::new(Duration::from_secs(60));
        assert!(!timeout.elapsed());
        assert!(timeout.remaining() > Duration::from_secs(59));
    }

    #[test]
    fn overrides_measure_from_the_same_start() {
        let timeout = Timeout::default();
        assert!(timeout.elapsed());
        assert!(!timeout.elapsed_with(Duration::from_secs(60)));
        assert!(timeout.remaining_with(Duration::from_secs(60)) > Duration::from_secs(59));
    }

    #[test]
    fn elapses_after_sleeping_past_the_budget() {
        let timeout = Timeout::new(Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(10));
        assert!(timeout.elapsed());
        assert_eq!(timeout.remaining(), Duration::ZERO);
    }
}
