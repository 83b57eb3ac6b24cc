//! The timer/phase state machine for one exam attempt.
//!
//! Pure and synchronous: the controller feeds it ticks, syncs, and user
//! decisions; it answers with what happened. All timing laws live here,
//! where they can be unit-tested without a runtime.
//!
//! ```text
//!   Running ──(countdown hits 0)──→ ExpiredGrace
//!      ↑                                 │
//!      └──(sync with remaining > 0)──────┤
//!                                        │ (grace hits 0, or the
//!   Running/ExpiredGrace ──(manual)──┐   │  student finishes)
//!                                    ▼   ▼
//!                                  Submitting ──→ Terminated
//!
//!   any non-terminal ──(ExamForceFinished)──→ Terminated
//! ```
//!
//! Flexible-timer sessions never see a tick, so they sit in `Running`
//! until a manual finish or a force-finish.

use std::time::Instant;

use invigil_protocol::TimerType;
use invigil_sync::{AuthoritativeCell, SyncSource};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The controller-local lifecycle phase of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Initial fetch in flight. No timers run yet.
    Loading,
    /// Countdown active (strict) or open-ended (flexible).
    Running,
    /// Local countdown expired; waiting out the grace window before
    /// committing to an auto-submit.
    ExpiredGrace,
    /// The finish decision is made; the gateway call is outstanding.
    Submitting,
    /// Absorbing. Ticks and syncs are no-ops from here on.
    Terminated,
}

impl Phase {
    /// Returns `true` once no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

// ---------------------------------------------------------------------------
// TimerState
// ---------------------------------------------------------------------------

/// The derived, client-local timer view. Not persisted; rebuilt from
/// the authoritative remaining time on mount and on every sync.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerState {
    pub countdown_seconds: u64,
    pub grace_seconds: Option<u64>,
    pub last_synced_at: Option<Instant>,
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What a 1 Hz tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing — flexible timer, wrong phase, or already submitted.
    Idle,
    /// Countdown decremented to this value (still > 0).
    Countdown(u64),
    /// Countdown exhausted; grace window opened at this value.
    GraceStarted(u64),
    /// Grace decremented to this value (still > 0).
    Grace(u64),
    /// Grace exhausted with no rescue sync — submit now. Fires at most
    /// once per attempt.
    AutoSubmit,
}

/// What an authoritative sync did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Dropped by the version guard (older than the last applied sync)
    /// or arrived after the attempt left the timer phases.
    Stale,
    /// Applied: countdown restored to the value, local drift discarded.
    Applied {
        countdown: u64,
        /// `true` if an in-flight grace window was cancelled.
        grace_cancelled: bool,
    },
}

// ---------------------------------------------------------------------------
// SessionMachine
// ---------------------------------------------------------------------------

/// Default grace window after local countdown expiry, in seconds.
pub const DEFAULT_GRACE_SECONDS: u64 = 60;

/// The pure attempt state machine. One per mounted exam attempt.
#[derive(Debug)]
pub struct SessionMachine {
    phase: Phase,
    timer_type: TimerType,
    /// Authoritative remaining seconds, locally decremented between
    /// syncs. The version guard lives inside the cell.
    countdown: AuthoritativeCell<u64>,
    grace_seconds: Option<u64>,
    grace_window: u64,
    /// Single-use auto/manual submission guard.
    submitted: bool,
}

impl SessionMachine {
    /// Creates a machine in `Running`, seeded with the remaining time
    /// from the initial session load.
    pub fn start(timer_type: TimerType, remaining_seconds: u64) -> Self {
        Self::with_grace_window(timer_type, remaining_seconds, DEFAULT_GRACE_SECONDS)
    }

    /// Like [`start`](Self::start) with a custom grace window.
    pub fn with_grace_window(
        timer_type: TimerType,
        remaining_seconds: u64,
        grace_window: u64,
    ) -> Self {
        Self {
            phase: Phase::Running,
            timer_type,
            countdown: AuthoritativeCell::new(remaining_seconds),
            grace_seconds: None,
            grace_window,
            submitted: false,
        }
    }

    /// Advances the machine by one second of local time.
    pub fn on_tick(&mut self) -> TickOutcome {
        if !self.timer_type.has_countdown() {
            return TickOutcome::Idle;
        }
        match self.phase {
            Phase::Running => {
                self.countdown.mutate_local(|v| *v = v.saturating_sub(1));
                let left = *self.countdown.get();
                if left > 0 {
                    TickOutcome::Countdown(left)
                } else {
                    self.phase = Phase::ExpiredGrace;
                    self.grace_seconds = Some(self.grace_window);
                    TickOutcome::GraceStarted(self.grace_window)
                }
            }
            Phase::ExpiredGrace => {
                let left = self
                    .grace_seconds
                    .unwrap_or(0)
                    .saturating_sub(1);
                self.grace_seconds = Some(left);
                if left > 0 {
                    TickOutcome::Grace(left)
                } else if self.submitted {
                    // A duplicate expiry tick after the submit decision
                    // must not fire a second submission.
                    TickOutcome::Idle
                } else {
                    self.submitted = true;
                    self.phase = Phase::Submitting;
                    TickOutcome::AutoSubmit
                }
            }
            Phase::Loading | Phase::Submitting | Phase::Terminated => {
                TickOutcome::Idle
            }
        }
    }

    /// Applies an authoritative remaining-time sync.
    ///
    /// The version guard decides whether the write is current; an
    /// applied sync always overrides local drift and clears any grace
    /// window, per the override law. A sync of zero seconds does not
    /// reset an already-running grace window (the server agrees time is
    /// up; the window keeps absorbing latency until it expires).
    pub fn on_sync(
        &mut self,
        remaining_seconds: u64,
        version: u64,
        source: SyncSource,
    ) -> SyncOutcome {
        if matches!(self.phase, Phase::Submitting | Phase::Terminated) {
            return SyncOutcome::Stale;
        }
        if !self.countdown.sync(remaining_seconds, version, source) {
            return SyncOutcome::Stale;
        }

        if remaining_seconds > 0 {
            let grace_cancelled = self.grace_seconds.take().is_some();
            self.phase = Phase::Running;
            SyncOutcome::Applied {
                countdown: remaining_seconds,
                grace_cancelled,
            }
        } else {
            // Time is up by server truth. Auto-submit still waits out
            // the grace window, so open it if it isn't running yet.
            if self.phase == Phase::Running {
                self.phase = Phase::ExpiredGrace;
                self.grace_seconds = Some(self.grace_window);
            }
            SyncOutcome::Applied { countdown: 0, grace_cancelled: false }
        }
    }

    /// The student chose to finish. Returns `true` exactly once; later
    /// calls (double-click, re-fired UI action) are no-ops.
    pub fn on_manual_finish(&mut self) -> bool {
        if self.submitted
            || !matches!(self.phase, Phase::Running | Phase::ExpiredGrace)
        {
            return false;
        }
        self.submitted = true;
        self.grace_seconds = None;
        self.phase = Phase::Submitting;
        true
    }

    /// An `ExamForceFinished` event arrived. Absorbing and
    /// unconditional: any non-terminal phase goes straight to
    /// `Terminated`. Returns `true` if this call did the transition.
    pub fn on_force_finish(&mut self) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        self.phase = Phase::Terminated;
        self.grace_seconds = None;
        true
    }

    /// The finish gateway call resolved (either way); the attempt is
    /// now terminated client-side.
    pub fn on_submit_resolved(&mut self) {
        self.phase = Phase::Terminated;
    }

    // -- Accessors ----------------------------------------------------------

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn timer_type(&self) -> TimerType {
        self.timer_type
    }

    pub fn countdown_seconds(&self) -> u64 {
        *self.countdown.get()
    }

    pub fn grace_seconds(&self) -> Option<u64> {
        self.grace_seconds
    }

    /// Whether the submit decision has been made (auto or manual).
    pub fn submitted(&self) -> bool {
        self.submitted
    }

    /// How many stale syncs the version guard has dropped.
    pub fn stale_drops(&self) -> u64 {
        self.countdown.stale_drops()
    }

    /// The derived timer view.
    pub fn timer_state(&self) -> TimerState {
        TimerState {
            countdown_seconds: *self.countdown.get(),
            grace_seconds: self.grace_seconds,
            last_synced_at: self.countdown.last_synced_at(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for the timing laws. Naming convention:
    //!   `test_{input}_{scenario}_{expected}`
    //!
    //! No runtime needed — the machine is pure; "a second passes" is a
    //! plain `on_tick()` call.

    use super::*;

    fn strict(remaining: u64) -> SessionMachine {
        SessionMachine::start(TimerType::Strict, remaining)
    }

    // =====================================================================
    // on_tick: countdown
    // =====================================================================

    #[test]
    fn test_tick_decrements_countdown_monotonically() {
        let mut m = strict(3);
        assert_eq!(m.on_tick(), TickOutcome::Countdown(2));
        assert_eq!(m.on_tick(), TickOutcome::Countdown(1));
        assert_eq!(m.countdown_seconds(), 1);
        assert_eq!(m.phase(), Phase::Running);
    }

    #[test]
    fn test_tick_at_zero_opens_grace_window() {
        let mut m = strict(1);
        assert_eq!(
            m.on_tick(),
            TickOutcome::GraceStarted(DEFAULT_GRACE_SECONDS)
        );
        assert_eq!(m.phase(), Phase::ExpiredGrace);
        assert_eq!(m.grace_seconds(), Some(DEFAULT_GRACE_SECONDS));
        // Countdown never goes below zero.
        assert_eq!(m.countdown_seconds(), 0);
    }

    #[test]
    fn test_flexible_timer_never_ticks() {
        let mut m = SessionMachine::start(TimerType::Flexible, 0);
        for _ in 0..100 {
            assert_eq!(m.on_tick(), TickOutcome::Idle);
        }
        assert_eq!(m.phase(), Phase::Running);
    }

    // =====================================================================
    // on_tick: grace and auto-submit
    // =====================================================================

    #[test]
    fn test_grace_counts_down_then_auto_submits_once() {
        let mut m = SessionMachine::with_grace_window(TimerType::Strict, 1, 3);
        m.on_tick(); // grace opens at 3
        assert_eq!(m.on_tick(), TickOutcome::Grace(2));
        assert_eq!(m.on_tick(), TickOutcome::Grace(1));
        assert_eq!(m.on_tick(), TickOutcome::AutoSubmit);
        assert_eq!(m.phase(), Phase::Submitting);
        assert!(m.submitted());
    }

    #[test]
    fn test_auto_submit_fires_at_most_once() {
        // Idempotence law: even if the expiry tick re-fires, only the
        // first one produces AutoSubmit.
        let mut m = SessionMachine::with_grace_window(TimerType::Strict, 1, 1);
        m.on_tick(); // grace opens
        assert_eq!(m.on_tick(), TickOutcome::AutoSubmit);
        for _ in 0..5 {
            assert_eq!(m.on_tick(), TickOutcome::Idle);
        }
    }

    // =====================================================================
    // on_sync
    // =====================================================================

    #[test]
    fn test_sync_overrides_countdown_and_clears_grace() {
        // Override law: countdown == R, grace == None, whatever came
        // before.
        let mut m = SessionMachine::with_grace_window(TimerType::Strict, 1, 60);
        m.on_tick(); // in grace now
        let outcome = m.on_sync(120, 1, SyncSource::Push);
        assert_eq!(
            outcome,
            SyncOutcome::Applied { countdown: 120, grace_cancelled: true }
        );
        assert_eq!(m.phase(), Phase::Running);
        assert_eq!(m.countdown_seconds(), 120);
        assert_eq!(m.grace_seconds(), None);
    }

    #[test]
    fn test_sync_while_running_discards_local_drift() {
        let mut m = strict(300);
        m.on_tick();
        m.on_tick(); // local says 298
        let outcome = m.on_sync(295, 1, SyncSource::Push);
        assert_eq!(
            outcome,
            SyncOutcome::Applied { countdown: 295, grace_cancelled: false }
        );
        assert_eq!(m.countdown_seconds(), 295);
    }

    #[test]
    fn test_stale_poll_after_push_is_dropped() {
        let mut m = strict(300);
        m.on_sync(100, 7, SyncSource::Push);
        // A poll snapshot computed earlier arrives late.
        assert_eq!(m.on_sync(250, 4, SyncSource::Poll), SyncOutcome::Stale);
        assert_eq!(m.countdown_seconds(), 100);
        assert_eq!(m.stale_drops(), 1);
    }

    #[test]
    fn test_sync_zero_while_running_opens_grace() {
        let mut m = strict(300);
        m.on_sync(0, 1, SyncSource::Push);
        assert_eq!(m.phase(), Phase::ExpiredGrace);
        assert_eq!(m.grace_seconds(), Some(DEFAULT_GRACE_SECONDS));
    }

    #[test]
    fn test_sync_zero_during_grace_does_not_reset_window() {
        let mut m = SessionMachine::with_grace_window(TimerType::Strict, 1, 10);
        m.on_tick(); // grace at 10
        m.on_tick(); // grace at 9
        m.on_sync(0, 1, SyncSource::Push);
        assert_eq!(m.grace_seconds(), Some(9));
        assert_eq!(m.phase(), Phase::ExpiredGrace);
    }

    #[test]
    fn test_sync_after_submit_decision_is_ignored() {
        let mut m = SessionMachine::with_grace_window(TimerType::Strict, 1, 1);
        m.on_tick();
        assert_eq!(m.on_tick(), TickOutcome::AutoSubmit);
        assert_eq!(m.on_sync(500, 9, SyncSource::Push), SyncOutcome::Stale);
        assert_eq!(m.phase(), Phase::Submitting);
    }

    // =====================================================================
    // on_manual_finish
    // =====================================================================

    #[test]
    fn test_manual_finish_from_running() {
        let mut m = strict(300);
        assert!(m.on_manual_finish());
        assert_eq!(m.phase(), Phase::Submitting);
        assert!(m.submitted());
    }

    #[test]
    fn test_manual_finish_from_grace() {
        let mut m = strict(1);
        m.on_tick(); // grace opens
        assert!(m.on_manual_finish());
        assert_eq!(m.phase(), Phase::Submitting);
        assert_eq!(m.grace_seconds(), None);
    }

    #[test]
    fn test_manual_finish_twice_is_rejected() {
        let mut m = strict(300);
        assert!(m.on_manual_finish());
        assert!(!m.on_manual_finish());
    }

    #[test]
    fn test_manual_finish_works_for_flexible_timer() {
        let mut m = SessionMachine::start(TimerType::Flexible, 0);
        assert!(m.on_manual_finish());
        assert_eq!(m.phase(), Phase::Submitting);
    }

    // =====================================================================
    // on_force_finish
    // =====================================================================

    #[test]
    fn test_force_finish_is_absorbing_from_any_phase() {
        // Absorbing-state law.
        let mut running = strict(100);
        assert!(running.on_force_finish());
        assert_eq!(running.phase(), Phase::Terminated);

        let mut in_grace = strict(1);
        in_grace.on_tick();
        assert!(in_grace.on_force_finish());
        assert_eq!(in_grace.phase(), Phase::Terminated);

        let mut submitting = strict(100);
        submitting.on_manual_finish();
        assert!(submitting.on_force_finish());
        assert_eq!(submitting.phase(), Phase::Terminated);
    }

    #[test]
    fn test_force_finish_stops_further_ticks() {
        let mut m = strict(100);
        m.on_force_finish();
        assert_eq!(m.on_tick(), TickOutcome::Idle);
        assert_eq!(m.countdown_seconds(), 100, "no decrement after terminal");
    }

    #[test]
    fn test_force_finish_when_already_terminated_is_noop() {
        let mut m = strict(100);
        assert!(m.on_force_finish());
        assert!(!m.on_force_finish());
    }

    // =====================================================================
    // Full scenarios
    // =====================================================================

    #[test]
    fn test_scenario_timeout_with_no_rescue_sync() {
        // Countdown reaches 0, nothing arrives within the grace window:
        // exactly one auto-submit, then terminal after the gateway call
        // resolves.
        let mut m = SessionMachine::with_grace_window(TimerType::Strict, 2, 2);
        assert_eq!(m.on_tick(), TickOutcome::Countdown(1));
        assert_eq!(m.on_tick(), TickOutcome::GraceStarted(2));
        assert_eq!(m.on_tick(), TickOutcome::Grace(1));
        assert_eq!(m.on_tick(), TickOutcome::AutoSubmit);
        m.on_submit_resolved();
        assert_eq!(m.phase(), Phase::Terminated);
        assert_eq!(m.on_tick(), TickOutcome::Idle);
    }

    #[test]
    fn test_scenario_rescue_sync_at_five_seconds() {
        // Countdown at 5, TimerSynchronized{120} arrives: countdown
        // becomes 120 and any grace is cleared.
        let mut m = strict(5);
        let outcome = m.on_sync(120, 1, SyncSource::Push);
        assert_eq!(
            outcome,
            SyncOutcome::Applied { countdown: 120, grace_cancelled: false }
        );
        assert_eq!(m.countdown_seconds(), 120);
        assert_eq!(m.grace_seconds(), None);
    }

    #[test]
    fn test_timer_state_reflects_machine() {
        let mut m = strict(10);
        m.on_tick();
        let ts = m.timer_state();
        assert_eq!(ts.countdown_seconds, 9);
        assert_eq!(ts.grace_seconds, None);
        assert!(ts.last_synced_at.is_none());

        m.on_sync(30, 1, SyncSource::Poll);
        assert!(m.timer_state().last_synced_at.is_some());
    }
}
