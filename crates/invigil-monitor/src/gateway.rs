//! The gateway seam for the admin-side aggregator.

use invigil_protocol::{ExamId, ExamMeta, GatewayError, SessionSummary, StudentId};
use serde::{Deserialize, Serialize};

/// A full roster snapshot for one exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterLoad {
    pub exam: ExamMeta,
    pub sessions: Vec<SessionSummary>,
}

/// The remote operations the aggregator consumes.
///
/// Administrative commands always trigger a fresh
/// [`fetch_roster`](Self::fetch_roster) after they succeed — the
/// aggregator never patches its roster optimistically, so its
/// consistency model is "eventually correct after round-trip".
pub trait MonitorGateway: Send + Sync + 'static {
    /// Fetches the exam and every session on it.
    fn fetch_roster(
        &self,
        exam_id: ExamId,
    ) -> impl std::future::Future<Output = Result<RosterLoad, GatewayError>> + Send;

    /// Terminates a student's session. The server is expected to also
    /// push `ExamForceFinished` on that student's session channel.
    fn force_finish(
        &self,
        exam_id: ExamId,
        student: StudentId,
    ) -> impl std::future::Future<Output = Result<(), GatewayError>> + Send;

    /// Grants extra minutes. The server is expected to also push
    /// `TimerSynchronized` with the new remaining time.
    fn add_time(
        &self,
        exam_id: ExamId,
        student: StudentId,
        minutes: u32,
    ) -> impl std::future::Future<Output = Result<(), GatewayError>> + Send;

    /// Reopens a finished session, optionally granting extra minutes.
    fn reopen(
        &self,
        exam_id: ExamId,
        student: StudentId,
        extra_minutes: u32,
    ) -> impl std::future::Future<Output = Result<(), GatewayError>> + Send;
}
