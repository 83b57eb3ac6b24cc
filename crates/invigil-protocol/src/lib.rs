//! Shared data model and sync-event protocol for Invigil.
//!
//! This crate defines everything the student-side controller and the
//! admin-side aggregator have to agree on:
//!
//! - **Identity and domain types** ([`ExamId`], [`SessionStatus`],
//!   [`AnswerValue`], [`Question`], [`ExamSession`], etc.) — the shapes
//!   that travel between the platform API and the controllers.
//! - **Roster types** ([`SessionSummary`], [`SummaryPatch`],
//!   [`Progress`]) — what the monitoring side aggregates.
//! - **Sync events** ([`SyncEvent`], [`EventFrame`]) — the push/poll
//!   reconciliation protocol.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how frames are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`], [`GatewayError`]).
//!
//! # Architecture
//!
//! The protocol layer sits below everything else. It knows nothing about
//! timers, actors, or gateways — it only defines the vocabulary:
//!
//! ```text
//! Sync/Gateway (bytes, HTTP) → Protocol (frames, model) → Controllers
//! ```

mod answer;
mod codec;
mod error;
mod event;
mod summary;
mod types;

pub use answer::{AnswerSlot, AnswerValue, Question, QuestionKind};
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::{GatewayError, ProtocolError};
pub use event::{exam_channel, session_channel, EventFrame, SyncEvent};
pub use summary::{Progress, SessionSummary, StudentProfile, SummaryPatch};
pub use types::{
    ExamId, ExamMeta, ExamSession, QuestionId, SessionId, SessionStatus,
    StudentId, TimerType,
};
