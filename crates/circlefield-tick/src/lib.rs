//! Fixed-timestep tick scheduler for Circlefield rounds.
//!
//! A room only ticks while a round is running, so the scheduler starts out
//! idle and is switched on with [`TickScheduler::start`] when the round
//! begins and off with [`TickScheduler::stop`] when it ends or the room is
//! torn down. While idle, [`TickScheduler::wait_for_tick`] pends forever.
//!
//! # Integration
//!
//! The scheduler sits inside a room actor's `tokio::select!` loop, next to
//! the command channel:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         biased;
//!         cmd = cmd_rx.recv() => { /* handle commands, maybe scheduler.start() */ }
//!         _ = scheduler.wait_for_tick() => {
//!             let outcome = game.tick();
//!             scheduler.record_tick_end();
//!             if outcome.finished { scheduler.stop(); }
//!         }
//!     }
//! }
//! ```
//!
//! Because the actor awaits one branch at a time, ticks of a room never
//! overlap each other or a command.

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when a tick fires late.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TickPolicy {
    /// Forget the missed tick(s) and schedule the next one a full period
    /// from now.
    #[default]
    Skip,
    /// Keep the original cadence: the next tick fires at its originally
    /// scheduled time, which may be immediately.
    Drop,
}

/// Full configuration for the tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Tick rate in Hz, `1..=MAX_TICK_RATE_HZ`.
    pub tick_rate_hz: u32,
    /// Overrun handling policy.
    pub policy: TickPolicy,
    /// Fraction of the tick budget (0.0–1.0) above which a tick logs a
    /// warning. Default: 0.80.
    pub budget_warn_threshold: f64,
    /// Fraction of the tick budget above which a tick is reported as
    /// critical. Default: 1.0.
    pub budget_critical_threshold: f64,
    /// Track average and maximum tick time.
    pub metrics_enabled: bool,
    /// Random delay (0–max µs) before the first tick after each
    /// [`TickScheduler::start`], so rounds started together do not tick
    /// in lockstep.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: Self::DEFAULT_TICK_RATE_HZ,
            policy: TickPolicy::default(),
            budget_warn_threshold: 0.80,
            budget_critical_threshold: 1.0,
            metrics_enabled: true,
            initial_jitter_us: 2_000,
        }
    }
}

impl TickConfig {
    pub const DEFAULT_TICK_RATE_HZ: u32 = 60;
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    /// A config for `tick_rate_hz` with every other setting at its default.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Default::default()
        }
    }

    /// Clamps out-of-range values so the config is safe to use.
    ///
    /// Called by [`TickScheduler::new`]:
    /// - `tick_rate_hz` clamped to `1..=MAX_TICK_RATE_HZ`.
    /// - Thresholds clamped to `0.0..=1.0`.
    /// - `budget_warn_threshold` forced ≤ `budget_critical_threshold`.
    pub fn validated(mut self) -> Self {
        let clamped = self.tick_rate_hz.clamp(1, Self::MAX_TICK_RATE_HZ);
        if clamped != self.tick_rate_hz {
            warn!(
                rate = self.tick_rate_hz,
                clamped,
                "tick_rate_hz out of range, clamping"
            );
            self.tick_rate_hz = clamped;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self.budget_critical_threshold = self.budget_critical_threshold.clamp(0.0, 1.0);
        if self.budget_warn_threshold > self.budget_critical_threshold {
            self.budget_warn_threshold = self.budget_critical_threshold;
        }
        self
    }

    /// Duration of a single tick. A rate of 0 is treated as 1 Hz.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)))
    }
}

// ---------------------------------------------------------------------------
// Tick info (returned to caller each tick)
// ---------------------------------------------------------------------------

/// Information about one fired tick, returned by
/// [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Tick number since the scheduler was created, starting at 1.
    pub tick: u64,
    /// Fixed delta time, always `1 / tick_rate`.
    pub dt: Duration,
    /// `true` if this tick fired more than 10% of a period late.
    pub overrun: bool,
    /// Whole periods skipped because of the overrun.
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Runtime metrics for the tick scheduler.
///
/// Timing values refer to the round simulation time reported via
/// [`TickScheduler::record_tick_end`].
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Exponential moving average of tick execution time (α = 0.1).
    pub avg_tick_time: Duration,
    pub max_tick_time: Duration,
    /// Last tick's share of the budget. Above 1.0 means overrun.
    pub budget_utilization: f64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-timestep tick scheduler. One per room actor.
pub struct TickScheduler {
    config: TickConfig,
    tick_duration: Duration,
    tick_count: u64,
    /// When the next tick should fire. `None` while idle.
    next_tick: Option<TokioInstant>,
    /// Wall-clock start of the current tick's simulation work.
    tick_start: Option<Instant>,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// Creates an idle scheduler.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let tick_duration = config.tick_duration();
        debug!(
            rate_hz = config.tick_rate_hz,
            budget_ms = tick_duration.as_secs_f64() * 1000.0,
            policy = ?config.policy,
            "tick scheduler created"
        );
        Self {
            config,
            tick_duration,
            tick_count: 0,
            next_tick: None,
            tick_start: None,
            metrics: TickMetrics::default(),
        }
    }

    /// An idle scheduler for `tick_rate_hz` with default settings.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Starts ticking. The first tick fires one period (plus jitter) from
    /// now. Returns `false` and changes nothing if already running.
    pub fn start(&mut self) -> bool {
        if self.next_tick.is_some() {
            return false;
        }
        let jitter = if self.config.initial_jitter_us > 0 {
            Duration::from_micros(rand::rng().random_range(0..self.config.initial_jitter_us))
        } else {
            Duration::ZERO
        };
        self.next_tick = Some(TokioInstant::now() + self.tick_duration + jitter);
        debug!(tick = self.tick_count, "tick scheduler started");
        true
    }

    /// Stops ticking. Idempotent.
    pub fn stop(&mut self) {
        if self.next_tick.take().is_some() {
            self.tick_start = None;
            debug!(tick = self.tick_count, "tick scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Waits until the next tick is due.
    ///
    /// While idle this future never resolves, so the other branches of a
    /// `tokio::select!` keep being served. Cancel-safe: dropping the
    /// future before it resolves leaves the schedule untouched.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let Some(next) = self.next_tick else {
            return std::future::pending().await;
        };

        time::sleep_until(next).await;

        let tick_dur = self.tick_duration;
        let now = TokioInstant::now();
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > tick_dur / 10;
        let mut ticks_skipped = 0u64;

        self.next_tick = Some(match self.config.policy {
            TickPolicy::Skip => {
                if overrun {
                    ticks_skipped = (late_by.as_nanos() / tick_dur.as_nanos()) as u64;
                    if ticks_skipped > 0 {
                        warn!(
                            tick = self.tick_count,
                            skipped = ticks_skipped,
                            late_ms = late_by.as_secs_f64() * 1000.0,
                            "tick overrun, skipping ahead"
                        );
                    }
                }
                now + tick_dur
            }
            TickPolicy::Drop => {
                if overrun {
                    warn!(
                        tick = self.tick_count,
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "tick overrun, keeping original schedule"
                    );
                }
                next + tick_dur
            }
        });

        if overrun {
            self.metrics.total_overruns += 1;
        }
        self.metrics.total_skipped += ticks_skipped;
        self.metrics.total_ticks += 1;

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            dt: tick_dur,
            overrun,
            ticks_skipped,
        }
    }

    /// Marks the simulation work of the current tick as done.
    ///
    /// Feeds budget warnings and metrics. A no-op when no tick is in
    /// progress.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();
        let budget = self.tick_duration;
        let utilization = elapsed.as_secs_f64() / budget.as_secs_f64();
        self.metrics.budget_utilization = utilization;

        if utilization >= self.config.budget_critical_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = budget.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "CRITICAL: tick exceeded budget"
            );
        } else if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = budget.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "tick approaching budget limit"
            );
        }

        if self.config.metrics_enabled {
            if elapsed > self.metrics.max_tick_time {
                self.metrics.max_tick_time = elapsed;
            }
            let alpha = 0.1;
            let prev = self.metrics.avg_tick_time.as_secs_f64();
            let curr = elapsed.as_secs_f64();
            self.metrics.avg_tick_time =
                Duration::from_secs_f64(prev * (1.0 - alpha) + curr * alpha);
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }
}
