//! Identity types and the core exam-session model.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::answer::AnswerSlot;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for an exam.
///
/// Newtype wrapper over `u64` so an `ExamId` can never be confused with
/// a `StudentId` in a signature, even though both are numbers on the
/// wire. `#[serde(transparent)]` keeps the JSON representation a plain
/// number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExamId(pub u64);

impl fmt::Display for ExamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E-{}", self.0)
    }
}

/// A unique identifier for a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub u64);

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// A unique identifier for one exam attempt (one student × one exam).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A-{}", self.0)
    }
}

/// A unique identifier for a question within an exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub u64);

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// The server-side lifecycle status of an exam session.
///
/// ```text
/// not_started → in_progress ⇄ idle
///                    │
///                    ├──(student submits)──→ finished
///                    ├──(time exhausted)───→ timed_out
///                    └──(all answered)─────→ completed
/// ```
///
/// `finished`, `timed_out`, and `completed` are terminal from the
/// student's point of view; only an administrative `reopen` can bring a
/// `finished` session back to `in_progress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Idle,
    Completed,
    TimedOut,
    Finished,
}

impl SessionStatus {
    /// Returns `true` if the session can still receive student input.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress | Self::Idle)
    }

    /// Returns `true` if the session has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::TimedOut | Self::Finished)
    }

    /// Whether an administrative force-finish is allowed in this status.
    pub fn can_force_finish(&self) -> bool {
        matches!(self, Self::InProgress | Self::Completed | Self::TimedOut)
    }

    /// Whether an administrative time extension is allowed in this status.
    pub fn can_add_time(&self) -> bool {
        !matches!(self, Self::Finished)
    }

    /// Whether an administrative reopen is allowed in this status.
    pub fn can_reopen(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Idle => "idle",
            Self::Completed => "completed",
            Self::TimedOut => "timed_out",
            Self::Finished => "finished",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// TimerType
// ---------------------------------------------------------------------------

/// How a session's time limit is enforced. Immutable for the session.
///
/// - **Strict**: the client runs a local countdown and auto-submits when
///   it (plus the grace period) expires.
/// - **Flexible**: no client countdown — the server tracks active time
///   only, and the client never initiates a timer-driven submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimerType {
    #[default]
    Strict,
    Flexible,
}

impl TimerType {
    /// Returns `true` if the client is responsible for a countdown.
    pub fn has_countdown(&self) -> bool {
        matches!(self, Self::Strict)
    }
}

// ---------------------------------------------------------------------------
// ExamMeta
// ---------------------------------------------------------------------------

/// Descriptive exam fields shipped alongside session and roster loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamMeta {
    pub id: ExamId,
    pub title: String,
    /// Total allotted seconds for a fresh attempt (before extensions).
    pub duration_seconds: u64,
    pub timer_type: TimerType,
}

// ---------------------------------------------------------------------------
// ExamSession
// ---------------------------------------------------------------------------

/// One student's attempt at one exam, as known to the server.
///
/// Loaded once when the controller mounts; after that the controller
/// owns the copy and mutates it in response to user input and sync
/// events. `remaining_seconds` is the server-authoritative time budget —
/// the controller's local countdown is derived from it, never the other
/// way around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamSession {
    pub id: SessionId,
    pub exam_id: ExamId,
    pub student_id: StudentId,
    pub status: SessionStatus,
    pub timer_type: TimerType,
    /// Last server-authoritative remaining time, in whole seconds.
    pub remaining_seconds: u64,
    /// Cumulative admin-granted bonus seconds. Additive to server truth;
    /// never re-derived client-side.
    #[serde(default)]
    pub extra_time_seconds: u64,
    /// Locally cached answers, keyed by question.
    #[serde(default)]
    pub answers: HashMap<QuestionId, AnswerSlot>,
}

impl ExamSession {
    /// Returns the cached slot for a question, if any answer or flag has
    /// been recorded.
    pub fn slot(&self, question: QuestionId) -> Option<&AnswerSlot> {
        self.answers.get(&question)
    }

    /// Number of questions with a recorded (possibly partial) answer.
    pub fn answered_count(&self) -> usize {
        self.answers
            .values()
            .filter(|slot| slot.value.is_some())
            .count()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The status predicates gate administrative commands, and the wire
    //! format is shared with a non-Rust backend — both are locked here.

    use super::*;

    #[test]
    fn test_ids_serialize_as_plain_numbers() {
        assert_eq!(serde_json::to_string(&ExamId(7)).unwrap(), "7");
        assert_eq!(serde_json::to_string(&StudentId(42)).unwrap(), "42");
        assert_eq!(serde_json::to_string(&SessionId(3)).unwrap(), "3");
        assert_eq!(serde_json::to_string(&QuestionId(9)).unwrap(), "9");
    }

    #[test]
    fn test_id_display_prefixes() {
        assert_eq!(ExamId(1).to_string(), "E-1");
        assert_eq!(StudentId(2).to_string(), "S-2");
        assert_eq!(SessionId(3).to_string(), "A-3");
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&SessionStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let json = serde_json::to_string(&SessionStatus::TimedOut).unwrap();
        assert_eq!(json, "\"timed_out\"");
    }

    #[test]
    fn test_status_force_finish_eligibility() {
        assert!(SessionStatus::InProgress.can_force_finish());
        assert!(SessionStatus::Completed.can_force_finish());
        assert!(SessionStatus::TimedOut.can_force_finish());
        assert!(!SessionStatus::Finished.can_force_finish());
        assert!(!SessionStatus::NotStarted.can_force_finish());
        assert!(!SessionStatus::Idle.can_force_finish());
    }

    #[test]
    fn test_status_add_time_eligibility() {
        // Any non-finished status accepts a time extension.
        assert!(SessionStatus::NotStarted.can_add_time());
        assert!(SessionStatus::InProgress.can_add_time());
        assert!(SessionStatus::Idle.can_add_time());
        assert!(SessionStatus::Completed.can_add_time());
        assert!(SessionStatus::TimedOut.can_add_time());
        assert!(!SessionStatus::Finished.can_add_time());
    }

    #[test]
    fn test_status_reopen_eligibility() {
        assert!(SessionStatus::Finished.can_reopen());
        assert!(!SessionStatus::InProgress.can_reopen());
        assert!(!SessionStatus::TimedOut.can_reopen());
    }

    #[test]
    fn test_timer_type_countdown() {
        assert!(TimerType::Strict.has_countdown());
        assert!(!TimerType::Flexible.has_countdown());
    }

    #[test]
    fn test_exam_session_round_trip() {
        let mut answers = HashMap::new();
        answers.insert(
            QuestionId(1),
            AnswerSlot {
                value: Some(crate::AnswerValue::Scalar("b".into())),
                flagged: true,
            },
        );
        let session = ExamSession {
            id: SessionId(1),
            exam_id: ExamId(2),
            student_id: StudentId(3),
            status: SessionStatus::InProgress,
            timer_type: TimerType::Strict,
            remaining_seconds: 900,
            extra_time_seconds: 60,
            answers,
        };
        let bytes = serde_json::to_vec(&session).unwrap();
        let decoded: ExamSession = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(session, decoded);
    }

    #[test]
    fn test_exam_session_defaults_optional_fields() {
        // Older backends omit extra_time_seconds and answers entirely.
        let json = r#"{
            "id": 1, "exam_id": 2, "student_id": 3,
            "status": "in_progress", "timer_type": "strict",
            "remaining_seconds": 600
        }"#;
        let session: ExamSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.extra_time_seconds, 0);
        assert!(session.answers.is_empty());
    }

    #[test]
    fn test_answered_count_ignores_flag_only_slots() {
        let mut session: ExamSession = serde_json::from_str(
            r#"{"id":1,"exam_id":2,"student_id":3,"status":"in_progress",
               "timer_type":"strict","remaining_seconds":600}"#,
        )
        .unwrap();
        session.answers.insert(
            QuestionId(1),
            AnswerSlot { value: None, flagged: true },
        );
        session.answers.insert(
            QuestionId(2),
            AnswerSlot {
                value: Some(crate::AnswerValue::Scalar("x".into())),
                flagged: false,
            },
        );
        assert_eq!(session.answered_count(), 1);
    }
}
