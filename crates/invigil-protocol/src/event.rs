//! Sync events: the push/poll reconciliation protocol.
//!
//! Three event kinds flow from the server to the clients. The student
//! controller subscribes to its session channel for the first two; the
//! admin aggregator subscribes to the exam channel for the third.

use serde::{Deserialize, Serialize};

use crate::summary::SummaryPatch;
use crate::types::{ExamId, StudentId};

// ---------------------------------------------------------------------------
// SyncEvent
// ---------------------------------------------------------------------------

/// A server-originated event on a sync channel.
///
/// Internally tagged JSON: `{"type": "TimerSynchronized",
/// "remaining_seconds": 120}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncEvent {
    /// Authoritative remaining time for the subscribed session.
    /// Overrides any local countdown drift, including an in-flight
    /// grace period.
    TimerSynchronized { remaining_seconds: u64 },

    /// An administrator terminated the subscribed session. Absorbing:
    /// the client transitions to its terminal state immediately and
    /// unconditionally.
    ExamForceFinished,

    /// A session on the subscribed exam changed (score, progress,
    /// status, time). Carries only the changed fields.
    LiveScoreUpdated { summary: SummaryPatch },
}

// ---------------------------------------------------------------------------
// EventFrame
// ---------------------------------------------------------------------------

/// The wire wrapper around a [`SyncEvent`].
///
/// `version` is a server-side monotonic stamp per channel. Consumers
/// drop any sync whose version is older than the last one they applied,
/// so a poll response computed before — but delivered after — a push
/// event can never regress the authoritative value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    /// Name of the channel the event was published on.
    pub channel: String,
    /// Monotonic per-channel version stamp.
    pub version: u64,
    pub event: SyncEvent,
}

/// Channel name for one student's session events on one exam.
pub fn session_channel(exam: ExamId, student: StudentId) -> String {
    format!("exam.{}.session.{}", exam.0, student.0)
}

/// Channel name for an exam's roster events (admin side).
pub fn exam_channel(exam: ExamId) -> String {
    format!("exam.{}", exam.0)
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The event JSON shape is shared with the platform backend; these
    //! lock the tag format and channel naming.

    use super::*;
    use crate::summary::StudentProfile;
    use crate::types::SessionId;

    #[test]
    fn test_timer_synchronized_json_format() {
        let event = SyncEvent::TimerSynchronized { remaining_seconds: 120 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "TimerSynchronized");
        assert_eq!(json["remaining_seconds"], 120);
    }

    #[test]
    fn test_force_finished_json_format() {
        let json = serde_json::to_value(&SyncEvent::ExamForceFinished).unwrap();
        assert_eq!(json["type"], "ExamForceFinished");
    }

    #[test]
    fn test_live_score_updated_round_trip() {
        let event = SyncEvent::LiveScoreUpdated {
            summary: SummaryPatch {
                session_id: SessionId(1),
                student: StudentProfile {
                    id: StudentId(9),
                    name: "Lin".into(),
                    email: String::new(),
                    classroom: String::new(),
                },
                status: None,
                remaining_time: Some(30),
                extra_time: None,
                score: Some(88.5),
                progress: None,
                history: None,
            },
        };
        let bytes = serde_json::to_vec(&event).unwrap();
        let decoded: SyncEvent = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn test_frame_round_trip() {
        let frame = EventFrame {
            channel: session_channel(ExamId(4), StudentId(7)),
            version: 12,
            event: SyncEvent::TimerSynchronized { remaining_seconds: 55 },
        };
        let bytes = serde_json::to_vec(&frame).unwrap();
        let decoded: EventFrame = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(frame, decoded);
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(
            session_channel(ExamId(4), StudentId(7)),
            "exam.4.session.7"
        );
        assert_eq!(exam_channel(ExamId(4)), "exam.4");
    }

    #[test]
    fn test_unknown_event_type_fails_decode() {
        let unknown = r#"{"type": "ClockMelted", "at": 9000}"#;
        let result: Result<SyncEvent, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }
}
