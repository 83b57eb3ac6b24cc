//! Student-side exam session controller for Invigil.
//!
//! One controller owns one exam attempt: it presents one question at a
//! time, keeps answers durable (best-effort), reconciles the local
//! countdown with server truth, and guarantees the attempt terminates
//! exactly once — whether the student finishes, the timer runs out, or
//! an administrator pulls the plug.
//!
//! # Layers
//!
//! 1. [`SessionMachine`] — the pure timer/phase state machine. Every
//!    timing law is testable here without a runtime.
//! 2. [`spawn_session`] / [`SessionHandle`] — the actor wrapping the
//!    machine, wired to the gateway, the push channel, and the tick
//!    schedulers.
//!
//! # How it fits in the stack
//!
//! ```text
//! UI layer (above)       ← SessionHandle commands, SessionEvent stream
//!     ↕
//! Session layer (this crate)
//!     ↕
//! Sync + Tick + Protocol (below)
//! ```

#![allow(async_fn_in_trait)]

mod controller;
mod error;
mod gateway;
mod machine;

pub use controller::{
    FinishReason, Nav, SessionConfig, SessionEvent, SessionHandle,
    SessionView, spawn_session,
};
pub use error::SessionError;
pub use gateway::{SaveAnswer, SessionGateway, SessionLoad};
pub use machine::{
    DEFAULT_GRACE_SECONDS, Phase, SessionMachine, SyncOutcome, TickOutcome,
    TimerState,
};
