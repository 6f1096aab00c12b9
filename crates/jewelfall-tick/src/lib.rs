//! Gravity clock for a Jewelfall room.
//!
//! A [`TickScheduler`] fires at a fixed rate while a match is running and
//! stays silent otherwise. It is built to sit in one branch of a room
//! actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* join, leave, input, ... */ }
//!         _ = scheduler.wait_for_tick() => {
//!             room.tick();
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```
//!
//! A new scheduler starts **stopped**. The room calls [`TickScheduler::resume`]
//! when the match enters `playing` and [`TickScheduler::pause`] when it
//! leaves it. Both are synchronous, so once `pause` returns no further tick
//! can be observed by the actor.
//!
//! [`TickScheduler::wait_for_tick`] is cancel safe: it only mutates state
//! after its sleep completes, so losing a `select!` race costs nothing.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// What to do when the actor wakes up later than the scheduled tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPolicy {
    /// Forget the missed ticks and schedule the next one from now.
    #[default]
    Skip,
    /// Keep the original cadence. Late ticks fire back to back until the
    /// schedule has caught up.
    Drop,
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Ticks per second. Clamped to `1..=MAX_TICK_RATE_HZ`.
    pub tick_rate_hz: u32,
    pub policy: TickPolicy,
    /// Fraction of the tick interval (0.0–1.0) a single tick may spend in
    /// game logic before a warning is logged.
    pub budget_warn_threshold: f64,
    /// Upper bound of random delay added to the first tick after each
    /// resume, so rooms started together do not tick in lockstep.
    pub resume_jitter: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: Self::DEFAULT_TICK_RATE_HZ,
            policy: TickPolicy::default(),
            budget_warn_threshold: 0.8,
            resume_jitter: Duration::ZERO,
        }
    }
}

impl TickConfig {
    /// One fall step every 100 ms.
    pub const DEFAULT_TICK_RATE_HZ: u32 = 10;
    pub const MAX_TICK_RATE_HZ: u32 = 120;

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Default::default()
        }
    }

    /// Returns a copy with every field forced into range.
    pub fn validated(mut self) -> Self {
        let clamped = self.tick_rate_hz.clamp(1, Self::MAX_TICK_RATE_HZ);
        if clamped != self.tick_rate_hz {
            warn!(
                requested = self.tick_rate_hz,
                used = clamped,
                "tick rate out of range, clamping"
            );
            self.tick_rate_hz = clamped;
        }
        if !self.budget_warn_threshold.is_finite() {
            self.budget_warn_threshold = 0.8;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }

    /// Length of one tick at the configured rate.
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)))
    }
}

/// Returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInfo {
    /// Ticks fired since the scheduler was created, starting at 1.
    pub tick: u64,
    /// The wake-up was more than a tenth of an interval late.
    pub overrun: bool,
    /// Whole intervals skipped under [`TickPolicy::Skip`].
    pub ticks_skipped: u64,
}

/// Running totals kept by the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub ticks: u64,
    pub overruns: u64,
    pub skipped: u64,
    pub slow_ticks: u64,
}

/// Fixed-rate tick source for one room.
#[derive(Debug)]
pub struct TickScheduler {
    config: TickConfig,
    interval: Duration,
    /// `None` while stopped.
    next_tick: Option<Instant>,
    tick_started: Option<Instant>,
    stats: TickStats,
}

impl TickScheduler {
    /// Creates a stopped scheduler.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let interval = config.interval();
        debug!(
            rate_hz = config.tick_rate_hz,
            interval_ms = interval.as_secs_f64() * 1000.0,
            policy = ?config.policy,
            "tick scheduler created"
        );
        Self {
            config,
            interval,
            next_tick: None,
            tick_started: None,
            stats: TickStats::default(),
        }
    }

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Waits for the next tick. Pends forever while stopped.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let Some(due) = self.next_tick else {
            return std::future::pending().await;
        };

        time::sleep_until(due).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(due);
        let overrun = late_by > self.interval / 10;
        let mut ticks_skipped = 0;

        self.next_tick = Some(match self.config.policy {
            TickPolicy::Skip => {
                if overrun {
                    ticks_skipped = (late_by.as_nanos() / self.interval.as_nanos()) as u64;
                    if ticks_skipped > 0 {
                        warn!(
                            skipped = ticks_skipped,
                            late_ms = late_by.as_secs_f64() * 1000.0,
                            "tick overrun, skipping ahead"
                        );
                    }
                }
                now + self.interval
            }
            TickPolicy::Drop => {
                if overrun {
                    warn!(late_ms = late_by.as_secs_f64() * 1000.0, "tick overrun");
                }
                due + self.interval
            }
        });

        self.stats.ticks += 1;
        self.stats.skipped += ticks_skipped;
        if overrun {
            self.stats.overruns += 1;
        }
        self.tick_started = Some(now);
        trace!(tick = self.stats.ticks, overrun, "tick");

        TickInfo {
            tick: self.stats.ticks,
            overrun,
            ticks_skipped,
        }
    }

    /// Marks the end of the work done for the last tick and warns if it
    /// used more of the interval than the configured threshold.
    pub fn record_tick_end(&mut self) {
        let Some(started) = self.tick_started.take() else {
            return;
        };
        let elapsed = started.elapsed();
        let used = elapsed.as_secs_f64() / self.interval.as_secs_f64();
        if used >= self.config.budget_warn_threshold && elapsed > Duration::ZERO {
            self.stats.slow_ticks += 1;
            warn!(
                tick = self.stats.ticks,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = self.interval.as_secs_f64() * 1000.0,
                "tick work is close to the tick interval"
            );
        }
    }

    /// Stops ticking. Idempotent.
    pub fn pause(&mut self) {
        if self.next_tick.take().is_some() {
            self.tick_started = None;
            debug!(tick = self.stats.ticks, "tick scheduler stopped");
        }
    }

    /// Starts ticking. The first tick fires one interval (plus jitter) from
    /// now. Idempotent: resuming a running scheduler keeps its schedule.
    pub fn resume(&mut self) {
        if self.next_tick.is_some() {
            return;
        }
        let jitter = if self.config.resume_jitter.is_zero() {
            Duration::ZERO
        } else {
            let max_us = self.config.resume_jitter.as_micros() as u64;
            Duration::from_micros(rand::rng().random_range(0..=max_us))
        };
        self.next_tick = Some(Instant::now() + self.interval + jitter);
        debug!(tick = self.stats.ticks, "tick scheduler started");
    }

    pub fn is_paused(&self) -> bool {
        self.next_tick.is_none()
    }

    pub fn tick_count(&self) -> u64 {
        self.stats.ticks
    }

    pub fn stats(&self) -> TickStats {
        self.stats
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
