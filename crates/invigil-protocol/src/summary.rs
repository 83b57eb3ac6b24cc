//! Roster entry types for the admin-side aggregator.

use serde::{Deserialize, Serialize};

use crate::types::{SessionId, SessionStatus, StudentId};

// ---------------------------------------------------------------------------
// StudentProfile
// ---------------------------------------------------------------------------

/// Who a roster entry belongs to. `id` is the roster identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub id: StudentId,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub classroom: String,
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Answered-question progress for one session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default,
)]
pub struct Progress {
    pub answered: usize,
    pub total: usize,
}

impl Progress {
    /// Completion ratio in `[0.0, 1.0]`. An exam with zero questions
    /// ranks as zero progress rather than dividing by zero.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.answered as f64 / self.total as f64
        }
    }
}

// ---------------------------------------------------------------------------
// SessionSummary
// ---------------------------------------------------------------------------

/// One session as the admin roster sees it.
///
/// Owned exclusively by the aggregator; push deltas and the local 1 Hz
/// decrement both write into the aggregator's copy, never the other way
/// around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub student: StudentProfile,
    pub status: SessionStatus,
    /// Remaining seconds as last reported (then locally decremented for
    /// display between reports).
    pub remaining_time: u64,
    /// Cumulative admin-granted bonus seconds.
    #[serde(default)]
    pub extra_time: u64,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub progress: Progress,
    /// Scores of past attempts, oldest first.
    #[serde(default)]
    pub history: Vec<f64>,
}

// ---------------------------------------------------------------------------
// SummaryPatch
// ---------------------------------------------------------------------------

/// The partial summary carried by a `LiveScoreUpdated` push event.
///
/// Push events only carry the fields that changed; merging applies the
/// present fields over the existing entry and leaves the rest untouched
/// (last-write-wins per field-set — there is no sequence numbering on
/// roster deltas).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryPatch {
    pub session_id: SessionId,
    pub student: StudentProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<f64>>,
}

impl SummaryPatch {
    /// Applies the present fields over `summary` in place.
    pub fn apply_to(&self, summary: &mut SessionSummary) {
        summary.session_id = self.session_id;
        summary.student = self.student.clone();
        if let Some(status) = self.status {
            summary.status = status;
        }
        if let Some(remaining) = self.remaining_time {
            summary.remaining_time = remaining;
        }
        if let Some(extra) = self.extra_time {
            summary.extra_time = extra;
        }
        if let Some(score) = self.score {
            summary.score = score;
        }
        if let Some(progress) = self.progress {
            summary.progress = progress;
        }
        if let Some(history) = &self.history {
            summary.history = history.clone();
        }
    }

    /// Builds a fresh entry for a student not yet on the roster.
    ///
    /// Fields the patch omits start from neutral defaults; the next full
    /// snapshot fills them in.
    pub fn into_summary(self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id,
            student: self.student,
            status: self.status.unwrap_or(SessionStatus::InProgress),
            remaining_time: self.remaining_time.unwrap_or(0),
            extra_time: self.extra_time.unwrap_or(0),
            score: self.score.unwrap_or(0.0),
            progress: self.progress.unwrap_or_default(),
            history: self.history.unwrap_or_default(),
        }
    }
}

impl From<SessionSummary> for SummaryPatch {
    /// A full summary is also a valid (total) patch.
    fn from(summary: SessionSummary) -> Self {
        Self {
            session_id: summary.session_id,
            student: summary.student,
            status: Some(summary.status),
            remaining_time: Some(summary.remaining_time),
            extra_time: Some(summary.extra_time),
            score: Some(summary.score),
            progress: Some(summary.progress),
            history: Some(summary.history),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
