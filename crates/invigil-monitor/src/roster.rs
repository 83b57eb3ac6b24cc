//! The roster: one consistent view of every session in an exam.
//!
//! Pure and synchronous, like the session machine — the controller
//! feeds it snapshots, patches, and ticks; it answers with ranked
//! frames. Single-writer: only the monitor actor mutates it.

use std::cmp::Ordering;
use std::collections::HashMap;

use invigil_protocol::{SessionStatus, SessionSummary, StudentId, SummaryPatch};
use tracing::trace;

// ---------------------------------------------------------------------------
// Rank types
// ---------------------------------------------------------------------------

/// Direction and size of a rank change between two consecutive frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankShift {
    Up(usize),
    Down(usize),
}

/// One leaderboard row.
#[derive(Debug, Clone)]
pub struct RankedEntry {
    /// Zero-based leaderboard position.
    pub rank: usize,
    /// Movement since the previous frame. `None` for unchanged rows
    /// and for new entrants — a student absent from the previous frame
    /// never shows an arrow.
    pub shift: Option<RankShift>,
    pub summary: SessionSummary,
}

/// One rendered leaderboard frame. Ephemeral: recomputed from scratch
/// on every cycle and replaced wholesale — no history beyond the one
/// previous frame needed for the shift indicators.
#[derive(Debug, Clone, Default)]
pub struct RankSnapshot {
    pub entries: Vec<RankedEntry>,
}

impl RankSnapshot {
    /// Convenience lookup by student.
    pub fn position(&self, student: StudentId) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.summary.student.id == student)
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// The leaderboard total order: score descending, then progress ratio
/// descending, then student name ascending.
///
/// `total_cmp` keeps the order total even for pathological float input,
/// so re-running the sort on the same roster always yields the same
/// order.
fn compare(a: &SessionSummary, b: &SessionSummary) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.progress.ratio().total_cmp(&a.progress.ratio()))
        .then_with(|| a.student.name.cmp(&b.student.name))
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// All sessions for one exam, keyed by `student.id`.
///
/// Baseline comes from a REST snapshot; push patches upsert into it;
/// the local 1 Hz tick decrements running timers for smooth display.
/// No patch is ever dropped for being stale — roster deltas carry no
/// sequence numbers, and last-write-wins per field-set is the contract.
#[derive(Debug, Default)]
pub struct Roster {
    entries: Vec<SessionSummary>,
    /// `student.id → index` of the previously *rendered* frame, used
    /// only to derive shift indicators.
    previous_rank: HashMap<StudentId, usize>,
}

impl Roster {
    /// Creates an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the baseline wholesale with a fresh snapshot.
    ///
    /// The previous-frame rank map survives, so the next
    /// [`ranked`](Self::ranked) call still shows movement across the
    /// refetch.
    pub fn load(&mut self, sessions: Vec<SessionSummary>) {
        self.entries = sessions;
    }

    /// Upserts a push delta by student id: shallow-merge into an
    /// existing entry, append a new entrant otherwise.
    pub fn upsert(&mut self, patch: SummaryPatch) {
        let student = patch.student.id;
        match self
            .entries
            .iter_mut()
            .find(|e| e.student.id == student)
        {
            Some(existing) => patch.apply_to(existing),
            None => self.entries.push(patch.into_summary()),
        }
        trace!(%student, "roster upsert");
    }

    /// Local 1 Hz decrement for every running session with time left.
    ///
    /// Display-only smoothing between server reports; the next patch or
    /// snapshot for an entry overwrites it wholesale. Returns `true` if
    /// anything changed.
    pub fn tick_second(&mut self) -> bool {
        let mut changed = false;
        for entry in &mut self.entries {
            if entry.status == SessionStatus::InProgress && entry.remaining_time > 0
            {
                entry.remaining_time -= 1;
                changed = true;
            }
        }
        changed
    }

    /// Computes the next leaderboard frame.
    ///
    /// Full deterministic re-sort on every call — no incremental
    /// maintenance. Shifts compare against the order this method
    /// returned last time.
    pub fn ranked(&mut self) -> RankSnapshot {
        let mut sorted = self.entries.clone();
        sorted.sort_by(compare);

        let entries: Vec<RankedEntry> = sorted
            .into_iter()
            .enumerate()
            .map(|(rank, summary)| {
                let shift = match self.previous_rank.get(&summary.student.id) {
                    Some(&prev) if prev > rank => Some(RankShift::Up(prev - rank)),
                    Some(&prev) if prev < rank => {
                        Some(RankShift::Down(rank - prev))
                    }
                    _ => None,
                };
                RankedEntry { rank, shift, summary }
            })
            .collect();

        self.previous_rank = entries
            .iter()
            .map(|e| (e.summary.student.id, e.rank))
            .collect();

        RankSnapshot { entries }
    }

    /// Looks up an entry by student.
    pub fn get(&self, student: StudentId) -> Option<&SessionSummary> {
        self.entries.iter().find(|e| e.student.id == student)
    }

    /// Number of sessions on the roster.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
