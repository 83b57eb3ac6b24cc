//! Error types for the session controller.

use invigil_protocol::{GatewayError, QuestionId};

/// Errors surfaced to the caller of a
/// [`SessionHandle`](crate::SessionHandle).
///
/// Deliberately narrow: per the availability-over-durability contract,
/// answer-save and finish failures are logged inside the controller and
/// never appear here.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The initial session fetch failed. Fatal: no controller is
    /// spawned; there is no partial exam UI.
    #[error("initial session load failed: {0}")]
    FatalLoad(#[from] GatewayError),

    /// The push-channel subscription could not be established at mount.
    #[error("session sync subscription failed: {0}")]
    Subscribe(String),

    /// The question is not part of this exam.
    #[error("unknown question {0}")]
    UnknownQuestion(QuestionId),

    /// The attempt has already terminated, or the controller task is
    /// gone.
    #[error("session controller unavailable")]
    Unavailable,
}
