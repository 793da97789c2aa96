//! The scheduler itself.

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::Instant as Deadline;

use crate::config::{TickConfig, TickPolicy};
use crate::metrics::{BudgetLevel, TickMetrics};

/// What [`TickScheduler::wait_for_tick`] reports about the tick that just
/// fired.
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// 1 for the first tick, then counting up.
    pub tick: u64,
    /// The configured interval. Lobbies step with a fixed `dt`, not with
    /// the measured gap.
    pub dt: Duration,
    /// The tick fired more than a tenth of an interval late.
    pub overrun: bool,
    /// Whole intervals jumped over (Skip policy only).
    pub ticks_skipped: u64,
}

/// Fixed-interval tick scheduler. One per lobby actor.
pub struct TickScheduler {
    config: TickConfig,
    fired: u64,
    due: Deadline,
    /// Set when a tick fires, taken by `record_tick_end`.
    work_started: Option<Instant>,
    stopped: bool,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// Schedules the first tick one interval (plus jitter) from now.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let jitter = match config.initial_jitter_us {
            0 => Duration::ZERO,
            max => Duration::from_micros(rand::rng().random_range(0..max)),
        };
        tracing::debug!(
            interval_ms = config.interval.as_secs_f64() * 1000.0,
            policy = ?config.policy,
            jitter_us = jitter.as_micros() as u64,
            "tick scheduler created"
        );

        Self {
            due: Deadline::now() + config.interval + jitter,
            config,
            fired: 0,
            work_started: None,
            stopped: false,
            metrics: TickMetrics::default(),
        }
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self::new(TickConfig::with_interval(interval))
    }

    /// Sleeps until the next tick is due and reports on it.
    ///
    /// After [`stop`](Self::stop) this never resolves, which lets a
    /// `select!` loop keep draining its other branches.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        if self.stopped {
            std::future::pending::<()>().await;
        }

        let due = self.due;
        let interval = self.config.interval;
        tokio::time::sleep_until(due).await;

        let fired_at = Deadline::now();
        self.work_started = Some(Instant::now());
        self.fired += 1;

        let late = fired_at.saturating_duration_since(due);
        let overrun = late > interval / 10;
        let (next, skipped) = self.reschedule(due, fired_at, late, overrun);
        self.due = next;
        self.metrics.on_fire(overrun, skipped);

        tracing::trace!(tick = self.fired, overrun, "tick");
        TickInfo {
            tick: self.fired,
            dt: interval,
            overrun,
            ticks_skipped: skipped,
        }
    }

    /// Picks the next deadline according to the policy.
    fn reschedule(&self, due: Deadline, fired_at: Deadline, late: Duration, overrun: bool) -> (Deadline, u64) {
        let interval = self.config.interval;
        match self.config.policy {
            TickPolicy::Skip => {
                let skipped = if overrun {
                    (late.as_nanos() / interval.as_nanos()) as u64
                } else {
                    0
                };
                if skipped > 0 {
                    tracing::warn!(
                        tick = self.fired,
                        skipped,
                        late_ms = late.as_secs_f64() * 1000.0,
                        "lobby tick fell behind, skipping ahead"
                    );
                }
                (fired_at + interval, skipped)
            }
            TickPolicy::Drop => {
                if overrun {
                    tracing::warn!(
                        tick = self.fired,
                        late_ms = late.as_secs_f64() * 1000.0,
                        "lobby tick late, staying on schedule"
                    );
                }
                (due + interval, 0)
            }
        }
    }

    /// Marks the end of the current tick's work and checks it against the
    /// budget. Does nothing unless a tick has fired since the last call.
    pub fn record_tick_end(&mut self) {
        let Some(started) = self.work_started.take() else {
            return;
        };
        let work = started.elapsed();
        let budget = self.config.interval;
        let level = self.metrics.on_work(
            work,
            budget,
            self.config.budget_warn_threshold,
            self.config.budget_critical_threshold,
        );
        let work_ms = work.as_secs_f64() * 1000.0;
        let budget_ms = budget.as_secs_f64() * 1000.0;
        match level {
            BudgetLevel::Critical => {
                tracing::warn!(tick = self.fired, work_ms, budget_ms, "tick work over budget")
            }
            BudgetLevel::Warn => {
                tracing::warn!(tick = self.fired, work_ms, budget_ms, "tick work near budget")
            }
            BudgetLevel::Ok => {}
        }
    }

    /// Stops ticking for good. Calling it again is harmless.
    pub fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            tracing::debug!(ticks = self.fired, "tick scheduler stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.fired
    }

    /// The interval after validation.
    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }
}
