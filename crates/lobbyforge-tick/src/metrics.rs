//! Per-scheduler counters.

use std::time::Duration;

/// How a tick's work time compares to its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BudgetLevel {
    Ok,
    Warn,
    Critical,
}

/// Runtime counters for one scheduler.
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Longest work time reported through
    /// [`TickScheduler::record_tick_end`](crate::TickScheduler::record_tick_end).
    pub max_tick_time: Duration,
    /// Last tick's work time over the interval. Above 1.0 means the lobby
    /// can't keep up.
    pub budget_utilization: f64,
}

impl TickMetrics {
    pub(crate) fn on_fire(&mut self, overrun: bool, skipped: u64) {
        self.total_ticks += 1;
        self.total_skipped += skipped;
        if overrun {
            self.total_overruns += 1;
        }
    }

    /// Records one tick's work time and classifies it against the budget.
    pub(crate) fn on_work(&mut self, work: Duration, budget: Duration, warn: f64, critical: f64) -> BudgetLevel {
        self.max_tick_time = self.max_tick_time.max(work);
        self.budget_utilization = work.as_secs_f64() / budget.as_secs_f64();
        match self.budget_utilization {
            u if u >= critical => BudgetLevel::Critical,
            u if u >= warn => BudgetLevel::Warn,
            _ => BudgetLevel::Ok,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUDGET: Duration = Duration::from_millis(20);

    #[test]
    fn test_on_fire_counts_overruns_and_skips() {
        let mut m = TickMetrics::default();
        m.on_fire(false, 0);
        m.on_fire(true, 3);

        assert_eq!(m.total_ticks, 2);
        assert_eq!(m.total_overruns, 1);
        assert_eq!(m.total_skipped, 3);
    }

    #[test]
    fn test_on_work_classifies_against_thresholds() {
        let mut m = TickMetrics::default();
        assert_eq!(m.on_work(Duration::from_millis(5), BUDGET, 0.8, 1.0), BudgetLevel::Ok);
        assert_eq!(m.on_work(Duration::from_millis(17), BUDGET, 0.8, 1.0), BudgetLevel::Warn);
        assert_eq!(m.on_work(Duration::from_millis(25), BUDGET, 0.8, 1.0), BudgetLevel::Critical);
    }

    #[test]
    fn test_on_work_keeps_maximum() {
        let mut m = TickMetrics::default();
        m.on_work(Duration::from_millis(9), BUDGET, 0.8, 1.0);
        m.on_work(Duration::from_millis(2), BUDGET, 0.8, 1.0);

        assert_eq!(m.max_tick_time, Duration::from_millis(9));
        assert!((m.budget_utilization - 0.1).abs() < 1e-9);
    }
}
