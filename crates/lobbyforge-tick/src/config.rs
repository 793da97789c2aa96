//! Scheduler settings.

use std::time::Duration;

/// How the scheduler catches up after firing late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPolicy {
    /// Forget the missed slots: the next tick is one interval after the
    /// late one actually fired. No bursts.
    #[default]
    Skip,
    /// Stay on the fixed grid: the next tick is one interval after the slot
    /// that was due, even if that slot is already past.
    Drop,
}

/// Tick interval, catch-up policy and budget thresholds for one lobby.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks. 20 ms unless configured.
    pub interval: Duration,
    pub policy: TickPolicy,
    /// Fraction of the interval a tick's work may use before a warning is
    /// logged. 0.8 by default.
    pub budget_warn_threshold: f64,
    /// Fraction at which the tick counts as over budget. 1.0 by default.
    pub budget_critical_threshold: f64,
    /// Upper bound (µs) of a random delay added before the first tick.
    /// Spreads out lobbies created in the same instant.
    pub initial_jitter_us: u64,
}

impl TickConfig {
    /// The lobby tick interval used when nothing else is configured.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(20);

    /// Shortest interval accepted. Anything below is clamped up.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    /// Returns a copy with every field forced into range.
    ///
    /// [`TickScheduler::new`](crate::TickScheduler::new) always goes
    /// through this, so a bad config degrades instead of failing:
    /// - the interval is at least [`Self::MIN_INTERVAL`];
    /// - both thresholds lie in `0.0..=1.0`;
    /// - the warning threshold never exceeds the critical one.
    pub fn validated(self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            tracing::warn!(
                requested_us = self.interval.as_micros() as u64,
                "tick interval too short, using 1ms"
            );
        }
        let critical = self.budget_critical_threshold.clamp(0.0, 1.0);
        let warn = self.budget_warn_threshold.clamp(0.0, 1.0).min(critical);
        Self {
            interval: self.interval.max(Self::MIN_INTERVAL),
            budget_warn_threshold: warn,
            budget_critical_threshold: critical,
            ..self
        }
    }
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            policy: TickPolicy::Skip,
            budget_warn_threshold: 0.8,
            budget_critical_threshold: 1.0,
            initial_jitter_us: 2_000,
        }
    }
}
