//! The gateway seam for the student-side controller.
//!
//! The controller never talks to the platform API directly — it goes
//! through [`SessionGateway`]. Production wires in an HTTP client;
//! tests and demos wire in an in-memory implementation.

use invigil_protocol::{
    AnswerValue, ExamId, ExamMeta, ExamSession, GatewayError, Question,
    QuestionId,
};
use serde::{Deserialize, Serialize};

/// One answer save request, exactly what the student has on screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveAnswer {
    pub question_id: QuestionId,
    pub answer: Option<AnswerValue>,
    pub flagged: bool,
}

/// Everything the controller needs to mount one attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLoad {
    pub exam: ExamMeta,
    pub questions: Vec<Question>,
    pub session: ExamSession,
    /// The session channel's current version at snapshot time. Poll
    /// responses are applied through the version guard with this stamp,
    /// so a slow poll can never overwrite a newer push.
    #[serde(default)]
    pub sync_version: u64,
}

/// The remote operations the controller consumes.
///
/// All calls are async and fallible; the controller decides per call
/// site what a failure means (fatal for the initial load, silent for
/// answer saves, ignorable for the finish call).
pub trait SessionGateway: Send + Sync + 'static {
    /// Fetches the exam, its questions, and the student's session.
    fn fetch_session(
        &self,
        exam_id: ExamId,
    ) -> impl std::future::Future<Output = Result<SessionLoad, GatewayError>> + Send;

    /// Persists one answer. Fire-and-forget from the controller's point
    /// of view: failures are logged, never retried, never surfaced.
    fn save_answer(
        &self,
        exam_id: ExamId,
        save: SaveAnswer,
    ) -> impl std::future::Future<Output = Result<(), GatewayError>> + Send;

    /// Submits the attempt. The controller exits the exam flow whether
    /// or not this succeeds — the time-bound reason for finishing is
    /// unaffected by the persistence outcome.
    fn finish_session(
        &self,
        exam_id: ExamId,
    ) -> impl std::future::Future<Output = Result<(), GatewayError>> + Send;
}
