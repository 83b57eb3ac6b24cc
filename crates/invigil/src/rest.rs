//! HTTP implementation of both gateway traits.
//!
//! Targets the platform's conventional JSON surface:
//!
//! ```text
//! GET  /exams/{exam}/session                          → SessionLoad
//! POST /exams/{exam}/answers                          ← SaveAnswer
//! POST /exams/{exam}/finish
//! GET  /exams/{exam}/roster                           → RosterLoad
//! POST /exams/{exam}/sessions/{student}/force-finish
//! POST /exams/{exam}/sessions/{student}/add-time      ← { minutes }
//! POST /exams/{exam}/sessions/{student}/reopen        ← { extra_minutes }
//! ```
//!
//! Error mapping is uniform: transport failures become
//! [`GatewayError::Transport`], non-success statuses become
//! [`GatewayError::Http`], and body mismatches become
//! [`GatewayError::Decode`]. The controllers decide what each failure
//! means at their call sites.

use invigil_monitor::{MonitorGateway, RosterLoad};
use invigil_protocol::{ExamId, GatewayError, StudentId};
use invigil_session::{SaveAnswer, SessionGateway, SessionLoad};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A `reqwest`-backed gateway client. Cheap to clone (the inner client
/// is an `Arc` of a connection pool).
#[derive(Clone)]
pub struct RestGateway {
    client: reqwest::Client,
    base_url: String,
}

impl RestGateway {
    /// Creates a gateway against `base_url` (no trailing slash needed).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Creates a gateway with a caller-configured client (timeouts,
    /// auth headers, proxies).
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
    ) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, GatewayError> {
        tracing::debug!(path, "gateway GET");
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Http { status: status.as_u16() });
        }
        response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn post<B: Serialize>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), GatewayError> {
        tracing::debug!(path, "gateway POST");
        let mut request = self.client.post(self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Http { status: status.as_u16() });
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct AddTimeBody {
    minutes: u32,
}

#[derive(Serialize)]
struct ReopenBody {
    extra_minutes: u32,
}

impl SessionGateway for RestGateway {
    async fn fetch_session(
        &self,
        exam_id: ExamId,
    ) -> Result<SessionLoad, GatewayError> {
        self.get_json(&format!("/exams/{}/session", exam_id.0)).await
    }

    async fn save_answer(
        &self,
        exam_id: ExamId,
        save: SaveAnswer,
    ) -> Result<(), GatewayError> {
        self.post(&format!("/exams/{}/answers", exam_id.0), Some(&save))
            .await
    }

    async fn finish_session(&self, exam_id: ExamId) -> Result<(), GatewayError> {
        self.post::<()>(&format!("/exams/{}/finish", exam_id.0), None)
            .await
    }
}

impl MonitorGateway for RestGateway {
    async fn fetch_roster(
        &self,
        exam_id: ExamId,
    ) -> Result<RosterLoad, GatewayError> {
        self.get_json(&format!("/exams/{}/roster", exam_id.0)).await
    }

    async fn force_finish(
        &self,
        exam_id: ExamId,
        student: StudentId,
    ) -> Result<(), GatewayError> {
        self.post::<()>(
            &format!("/exams/{}/sessions/{}/force-finish", exam_id.0, student.0),
            None,
        )
        .await
    }

    async fn add_time(
        &self,
        exam_id: ExamId,
        student: StudentId,
        minutes: u32,
    ) -> Result<(), GatewayError> {
        self.post(
            &format!("/exams/{}/sessions/{}/add-time", exam_id.0, student.0),
            Some(&AddTimeBody { minutes }),
        )
        .await
    }

    async fn reopen(
        &self,
        exam_id: ExamId,
        student: StudentId,
        extra_minutes: u32,
    ) -> Result<(), GatewayError> {
        self.post(
            &format!("/exams/{}/sessions/{}/reopen", exam_id.0, student.0),
            Some(&ReopenBody { extra_minutes }),
        )
        .await
    }
}
