//! A self-contained exam round trip: one student taking a short
//! strict-timer exam, one administrator watching the live leaderboard,
//! and a simulated classmate — all over the in-memory hub and an
//! in-memory "server".
//!
//! Run with:
//!
//! ```text
//! RUST_LOG=info cargo run -p mock-exam
//! ```
//!
//! The student answers two questions while a classmate's score updates
//! reshuffle the leaderboard; the countdown then runs out and the
//! attempt auto-submits after the grace window.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use invigil::prelude::*;
use invigil::protocol::{exam_channel, session_channel};
use invigil::session::SaveAnswer;
use tokio::sync::mpsc;

const EXAM: ExamId = ExamId(1);
const STUDENT: StudentId = StudentId(42);
const CLASSMATE: StudentId = StudentId(7);

// ---------------------------------------------------------------------------
// In-memory server: both gateways plus the push side effects a real
// backend would produce.
// ---------------------------------------------------------------------------

struct ServerState {
    remaining_seconds: u64,
    summaries: Vec<SessionSummary>,
}

struct DemoServer {
    hub: InMemoryHub,
    state: Mutex<ServerState>,
}

impl DemoServer {
    fn new(hub: InMemoryHub) -> Self {
        Self {
            hub,
            state: Mutex::new(ServerState {
                remaining_seconds: 8,
                summaries: vec![
                    summary(STUDENT, "You", 0.0, 0),
                    summary(CLASSMATE, "Noor", 10.0, 1),
                ],
            }),
        }
    }

    fn publish_summary(&self, student: StudentId) {
        let patch = {
            let state = self.state.lock().unwrap();
            state
                .summaries
                .iter()
                .find(|s| s.student.id == student)
                .cloned()
                .map(SummaryPatch::from)
        };
        if let Some(patch) = patch {
            self.hub.publish(
                &exam_channel(EXAM),
                SyncEvent::LiveScoreUpdated { summary: patch },
            );
        }
    }

    fn bump_classmate(&self, score: f64, answered: usize) {
        {
            let mut state = self.state.lock().unwrap();
            if let Some(s) = state
                .summaries
                .iter_mut()
                .find(|s| s.student.id == CLASSMATE)
            {
                s.score = score;
                s.progress.answered = answered;
            }
        }
        self.publish_summary(CLASSMATE);
    }
}

fn summary(id: StudentId, name: &str, score: f64, answered: usize) -> SessionSummary {
    SessionSummary {
        session_id: SessionId(id.0),
        student: StudentProfile {
            id,
            name: name.into(),
            email: format!("{}@example.edu", name.to_lowercase()),
            classroom: "7B".into(),
        },
        status: SessionStatus::InProgress,
        remaining_time: 8,
        extra_time: 0,
        score,
        progress: Progress { answered, total: 2 },
        history: vec![],
    }
}

fn questions() -> Vec<Question> {
    vec![
        Question {
            id: QuestionId(1),
            prompt: "2 + 2 = ?".into(),
            kind: QuestionKind::SingleChoice {
                options: vec!["3".into(), "4".into(), "5".into()],
            },
        },
        Question {
            id: QuestionId(2),
            prompt: "Which of these are prime?".into(),
            kind: QuestionKind::MultiChoice {
                options: vec!["2".into(), "4".into(), "5".into()],
            },
        },
    ]
}

impl SessionGateway for DemoServer {
    async fn fetch_session(
        &self,
        _exam: ExamId,
    ) -> Result<SessionLoad, invigil::protocol::GatewayError> {
        let state = self.state.lock().unwrap();
        Ok(SessionLoad {
            exam: ExamMeta {
                id: EXAM,
                title: "Pop quiz".into(),
                duration_seconds: 8,
                timer_type: TimerType::Strict,
            },
            questions: questions(),
            session: ExamSession {
                id: SessionId(STUDENT.0),
                exam_id: EXAM,
                student_id: STUDENT,
                status: SessionStatus::InProgress,
                timer_type: TimerType::Strict,
                remaining_seconds: state.remaining_seconds,
                extra_time_seconds: 0,
                answers: Default::default(),
            },
            sync_version: 0,
        })
    }

    async fn save_answer(
        &self,
        _exam: ExamId,
        save: SaveAnswer,
    ) -> Result<(), invigil::protocol::GatewayError> {
        tracing::info!(question = %save.question_id, "server stored answer");
        {
            let mut state = self.state.lock().unwrap();
            if let Some(s) = state
                .summaries
                .iter_mut()
                .find(|s| s.student.id == STUDENT)
            {
                s.progress.answered += 1;
                s.score += 50.0;
            }
        }
        self.publish_summary(STUDENT);
        Ok(())
    }

    async fn finish_session(
        &self,
        _exam: ExamId,
    ) -> Result<(), invigil::protocol::GatewayError> {
        tracing::info!("server finished the attempt");
        {
            let mut state = self.state.lock().unwrap();
            if let Some(s) = state
                .summaries
                .iter_mut()
                .find(|s| s.student.id == STUDENT)
            {
                s.status = SessionStatus::Finished;
            }
        }
        self.publish_summary(STUDENT);
        Ok(())
    }
}

impl MonitorGateway for DemoServer {
    async fn fetch_roster(
        &self,
        _exam: ExamId,
    ) -> Result<RosterLoad, invigil::protocol::GatewayError> {
        let state = self.state.lock().unwrap();
        Ok(RosterLoad {
            exam: ExamMeta {
                id: EXAM,
                title: "Pop quiz".into(),
                duration_seconds: 8,
                timer_type: TimerType::Strict,
            },
            sessions: state.summaries.clone(),
        })
    }

    async fn force_finish(
        &self,
        _exam: ExamId,
        student: StudentId,
    ) -> Result<(), invigil::protocol::GatewayError> {
        self.hub
            .publish(&session_channel(EXAM, student), SyncEvent::ExamForceFinished);
        Ok(())
    }

    async fn add_time(
        &self,
        _exam: ExamId,
        student: StudentId,
        minutes: u32,
    ) -> Result<(), invigil::protocol::GatewayError> {
        let remaining = {
            let mut state = self.state.lock().unwrap();
            state.remaining_seconds += u64::from(minutes) * 60;
            let remaining_seconds = state.remaining_seconds;
            if let Some(s) = state
                .summaries
                .iter_mut()
                .find(|s| s.student.id == student)
            {
                s.remaining_time = remaining_seconds;
                s.extra_time += u64::from(minutes) * 60;
            }
            state.remaining_seconds
        };
        // The server pushes the new authoritative time to the student.
        self.hub.publish(
            &session_channel(EXAM, student),
            SyncEvent::TimerSynchronized { remaining_seconds: remaining },
        );
        self.publish_summary(student);
        Ok(())
    }

    async fn reopen(
        &self,
        _exam: ExamId,
        _student: StudentId,
        _extra_minutes: u32,
    ) -> Result<(), invigil::protocol::GatewayError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Demo script
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let hub = InMemoryHub::new();
    let server = Arc::new(DemoServer::new(hub.clone()));

    // Admin side: live leaderboard.
    let (monitor_events_tx, mut monitor_events) = mpsc::unbounded_channel();
    let _monitor = spawn_monitor(
        EXAM,
        Arc::clone(&server),
        hub.clone(),
        MonitorConfig::default(),
        monitor_events_tx,
    )
    .await
    .expect("monitor mounts");
    tokio::spawn(async move {
        while let Some(event) = monitor_events.recv().await {
            if let MonitorEvent::RosterUpdated(frame) = event {
                let board: Vec<String> = frame
                    .entries
                    .iter()
                    .map(|e| {
                        let arrow = match e.shift {
                            Some(RankShift::Up(_)) => "↑",
                            Some(RankShift::Down(_)) => "↓",
                            None => " ",
                        };
                        format!(
                            "{}{} {:.0}pts {}s",
                            arrow,
                            e.summary.student.name,
                            e.summary.score,
                            e.summary.remaining_time,
                        )
                    })
                    .collect();
                tracing::info!(board = %board.join(" | "), "leaderboard");
            }
        }
    });

    // Student side: one strict attempt with a short grace window so the
    // demo ends quickly.
    let (session_events_tx, mut session_events) = mpsc::unbounded_channel();
    let student = spawn_session(
        EXAM,
        STUDENT,
        Arc::clone(&server),
        hub.clone(),
        SessionConfig {
            grace_window_seconds: 3,
            poll_interval: Duration::from_secs(30),
            tick_jitter_ms: 0,
        },
        session_events_tx,
    )
    .await
    .expect("session mounts");

    let narrator = tokio::spawn(async move {
        while let Some(event) = session_events.recv().await {
            match event {
                SessionEvent::CountdownTick { seconds } => {
                    tracing::info!(seconds, "countdown");
                }
                SessionEvent::GraceTick { seconds } => {
                    tracing::info!(seconds, "grace");
                }
                SessionEvent::Terminated { reason, submitted } => {
                    tracing::info!(?reason, submitted, "attempt over");
                    break;
                }
                other => tracing::info!(?other, "session event"),
            }
        }
    });

    // Scripted classmate activity.
    let classmate_server = Arc::clone(&server);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        classmate_server.bump_classmate(120.0, 2);
    });

    // The student answers both questions...
    tokio::time::sleep(Duration::from_secs(2)).await;
    student
        .answer(QuestionId(1), AnswerValue::Scalar("4".into()))
        .await
        .expect("answer q1");
    student
        .answer(
            QuestionId(2),
            AnswerValue::Ordered(vec!["2".into(), "5".into()]),
        )
        .await
        .expect("answer q2");

    // ...and the countdown is left to run out: grace opens, no rescue
    // sync arrives, and the attempt auto-submits.
    narrator.await.expect("narrator task");
}
