//! Periodic tick scheduling for Invigil.
//!
//! Every time source in the exam core is one of these schedulers: the
//! 1 Hz countdown tick, the 1 Hz grace-period tick, the 1 Hz roster
//! decrement on the admin side, and the coarse polling fallback. One
//! type, configured by period, covers them all.
//!
//! # Manual mode
//!
//! When `period` is `None`, the scheduler is in manual mode and
//! [`TickScheduler::wait_for_tick`] pends forever. Flexible-timer
//! sessions use this: their select! loop keeps the same shape as a
//! strict session's, but the countdown branch simply never fires.
//!
//! # Integration
//!
//! The scheduler is designed to sit inside a controller's
//! `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         tick = countdown.wait_for_tick() => {
//!             machine.on_tick();
//!         }
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the task owning the scheduler wakes up late (the
/// event loop was busy past one or more tick deadlines).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPolicy {
    /// Skip the missed tick(s) and reschedule from now. Safest default:
    /// a countdown decrement is saturating, so replaying missed ticks
    /// buys nothing.
    #[default]
    Skip,
    /// Keep the original cadence regardless of the overrun; the next
    /// tick fires at its originally scheduled time.
    Drop,
}

/// Full configuration for a tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks. `None` = manual mode (tick never fires).
    pub period: Option<Duration>,
    /// Overrun handling policy.
    pub policy: TickPolicy,
    /// Random jitter (0–max ms) added to the *first* tick so that many
    /// sessions mounted at the same instant don't all tick on the same
    /// millisecond (thundering-herd mitigation; matters for the admin
    /// view of a classroom that started together).
    pub initial_jitter_ms: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            period: None,
            policy: TickPolicy::default(),
            initial_jitter_ms: 250,
        }
    }
}

impl TickConfig {
    /// One tick per second — the countdown and roster cadence.
    pub fn seconds() -> Self {
        Self::every(Duration::from_secs(1))
    }

    /// A tick every `period`.
    pub fn every(period: Duration) -> Self {
        Self {
            period: Some(period),
            ..Default::default()
        }
    }

    /// Manual mode: the scheduler never fires on its own.
    pub fn manual() -> Self {
        Self {
            period: None,
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Information about a fired tick, returned by
/// [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// The configured period.
    pub period: Duration,
    /// `true` if this tick fired late (scheduler detected overrun).
    pub overrun: bool,
    /// How many ticks were skipped due to overrun (0 normally).
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Running counters for diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickCounters {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Periodic tick scheduler. One per time source, owned by the
/// controller task that consumes it — dropping the controller drops the
/// scheduler and with it any pending tick.
pub struct TickScheduler {
    config: TickConfig,
    tick_count: u64,
    /// When the next tick should fire (`None` in manual mode).
    next_tick: Option<TokioInstant>,
    paused: bool,
    counters: TickCounters,
}

impl TickScheduler {
    /// Creates a new scheduler from config.
    ///
    /// The first tick is scheduled with optional jitter to desynchronize
    /// schedulers created at the same instant.
    pub fn new(config: TickConfig) -> Self {
        let next_tick = config.period.map(|period| {
            let jitter = if config.initial_jitter_ms > 0 {
                let ms = rand::rng().random_range(0..config.initial_jitter_ms);
                Duration::from_millis(ms)
            } else {
                Duration::ZERO
            };
            TokioInstant::now() + period + jitter
        });

        match config.period {
            None => debug!("tick scheduler created in manual mode"),
            Some(period) => {
                debug!(period_ms = period.as_millis() as u64, "tick scheduler created")
            }
        }

        Self {
            config,
            tick_count: 0,
            next_tick,
            paused: false,
            counters: TickCounters::default(),
        }
    }

    /// Shorthand for the 1 Hz configuration.
    pub fn seconds() -> Self {
        Self::new(TickConfig::seconds())
    }

    /// Shorthand for a scheduler that never fires.
    pub fn manual() -> Self {
        Self::new(TickConfig::manual())
    }

    /// Waits until the next tick is due. Returns [`TickInfo`].
    ///
    /// In manual mode or while paused this future pends forever — it
    /// never resolves on its own, but `tokio::select!` still services
    /// the loop's other branches.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (next, period) = match (self.next_tick, self.config.period) {
            (Some(next), Some(period)) if !self.paused => (next, period),
            _ => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        };

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        self.tick_count += 1;

        // Overrun: woke up more than 10% of a period late.
        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > period / 10;
        let mut ticks_skipped = 0u64;

        self.next_tick = Some(match self.config.policy {
            TickPolicy::Skip => {
                if overrun {
                    ticks_skipped =
                        late_by.as_nanos() as u64 / period.as_nanos() as u64;
                    if ticks_skipped > 0 {
                        warn!(
                            tick = self.tick_count,
                            skipped = ticks_skipped,
                            late_ms = late_by.as_millis() as u64,
                            "tick overrun — skipping ahead"
                        );
                    }
                }
                // Reschedule from now, not from the missed deadline.
                now + period
            }
            TickPolicy::Drop => {
                if overrun {
                    warn!(
                        tick = self.tick_count,
                        late_ms = late_by.as_millis() as u64,
                        "tick overrun — keeping original cadence"
                    );
                }
                next + period
            }
        });

        if overrun {
            self.counters.total_overruns += 1;
        }
        self.counters.total_skipped += ticks_skipped;
        self.counters.total_ticks += 1;

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            period,
            overrun,
            ticks_skipped,
        }
    }

    /// Pauses the tick loop. `wait_for_tick` pends until
    /// [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "tick scheduler paused");
        }
    }

    /// Resumes after a pause.
    ///
    /// Resets the next deadline to `now + period` so the time spent
    /// paused doesn't burst out as immediate catch-up ticks.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if let Some(period) = self.config.period {
                self.next_tick = Some(TokioInstant::now() + period);
            }
            debug!(tick = self.tick_count, "tick scheduler resumed");
        }
    }

    /// Whether the scheduler is currently paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether this scheduler is in manual mode.
    pub fn is_manual(&self) -> bool {
        self.config.period.is_none()
    }

    /// Current tick count.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Snapshot of the running counters.
    pub fn counters(&self) -> TickCounters {
        self.counters
    }

    /// The configured period, or `None` in manual mode.
    pub fn period(&self) -> Option<Duration> {
        self.config.period
    }
}
