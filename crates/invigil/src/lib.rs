//! # Invigil
//!
//! The real-time core of a school exam platform: a student-side timed
//! session controller and an admin-side live monitoring aggregator,
//! reconciled over a push channel with a polling fallback.
//!
//! This meta-crate re-exports the layer crates, adds the unified
//! [`InvigilError`], and ships [`RestGateway`] — an HTTP implementation
//! of both gateway traits.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use invigil::prelude::*;
//!
//! # async fn run() -> Result<(), invigil::InvigilError> {
//! let gateway = Arc::new(RestGateway::new("https://api.example.edu"));
//! let sync = WebSocketSync::connect("wss://push.example.edu/live").await?;
//! let (events, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
//!
//! let session = spawn_session(
//!     ExamId(7),
//!     StudentId(42),
//!     gateway,
//!     sync,
//!     SessionConfig::default(),
//!     events,
//! )
//! .await?;
//!
//! while let Some(event) = event_rx.recv().await {
//!     match event {
//!         SessionEvent::Terminated { .. } => break,
//!         _ => { /* render */ }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod rest;

pub use error::InvigilError;
pub use rest::RestGateway;

pub use invigil_monitor as monitor;
pub use invigil_protocol as protocol;
pub use invigil_session as session;
pub use invigil_sync as sync;
pub use invigil_tick as tick;

/// The common imports for building on Invigil.
pub mod prelude {
    pub use crate::error::InvigilError;
    pub use crate::rest::RestGateway;

    pub use invigil_monitor::{
        MonitorConfig, MonitorError, MonitorEvent, MonitorGateway,
        MonitorHandle, RankShift, RankSnapshot, Roster, RosterLoad,
        spawn_monitor,
    };
    pub use invigil_protocol::{
        AnswerSlot, AnswerValue, EventFrame, ExamId, ExamMeta, ExamSession,
        Progress, Question, QuestionId, QuestionKind, SessionId,
        SessionStatus, SessionSummary, StudentId, StudentProfile,
        SummaryPatch, SyncEvent, TimerType,
    };
    pub use invigil_session::{
        FinishReason, Phase, SessionConfig, SessionError, SessionEvent,
        SessionGateway, SessionHandle, SessionLoad, SessionView,
        spawn_session,
    };
    pub use invigil_sync::{InMemoryHub, SyncChannel, SyncSource, WebSocketSync};
}
