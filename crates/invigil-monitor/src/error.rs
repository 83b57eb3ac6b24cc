//! Error types for the monitoring aggregator.

use invigil_protocol::{GatewayError, SessionStatus, StudentId};

/// Errors surfaced to the caller of a
/// [`MonitorHandle`](crate::MonitorHandle).
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The command is not valid for the session's current status.
    /// Rejected before any network call is made.
    #[error("{command} not allowed for student {student} in status {status}")]
    Ineligible {
        student: StudentId,
        status: SessionStatus,
        command: &'static str,
    },

    /// The student has no session on this exam's roster.
    #[error("student {0} not on the roster")]
    UnknownStudent(StudentId),

    /// Time extensions must be at least one minute.
    #[error("invalid minutes value: {0}")]
    InvalidMinutes(u32),

    /// The gateway call itself failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The initial roster fetch failed. Fatal: no monitor is spawned.
    #[error("initial roster load failed: {0}")]
    FatalLoad(GatewayError),

    /// The push-channel subscription could not be established at mount.
    #[error("monitor sync subscription failed: {0}")]
    Subscribe(String),

    /// The aggregator task is gone.
    #[error("monitor unavailable")]
    Unavailable,
}
