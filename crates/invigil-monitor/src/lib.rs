//! Admin-side live monitoring aggregator for Invigil.
//!
//! One monitor owns one exam's roster: it merges REST snapshots with
//! push deltas and a local 1 Hz decrement into a continuously-ticking,
//! ranked leaderboard, and routes the administrative overrides
//! (force-finish, add-time, reopen) that the student side must absorb.
//!
//! # Layers
//!
//! 1. [`Roster`] — the pure merge/tick/rank logic, unit-testable
//!    without a runtime.
//! 2. [`spawn_monitor`] / [`MonitorHandle`] — the actor wrapping the
//!    roster, wired to the gateway, the exam channel, and the tick
//!    scheduler.

#![allow(async_fn_in_trait)]

mod controller;
mod error;
mod gateway;
mod roster;

pub use controller::{
    MonitorConfig, MonitorEvent, MonitorHandle, spawn_monitor,
};
pub use error::MonitorError;
pub use gateway::{MonitorGateway, RosterLoad};
pub use roster::{RankShift, RankSnapshot, RankedEntry, Roster};
