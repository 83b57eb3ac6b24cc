//! Sync-channel abstraction and reconciliation primitives for Invigil.
//!
//! Both controllers consume server truth from more than one place: a
//! push subscription (low latency, may drop), a coarse polling fallback,
//! and their own local 1 Hz ticking. This crate provides the pieces that
//! keep those sources from trampling each other:
//!
//! - [`SyncChannel`] / [`Subscription`] — a named-channel subscription
//!   abstraction over whatever carries the push events.
//! - [`InMemoryHub`] — an in-process implementation for tests and demos.
//! - `WebSocketSync` — a client implementation over `tokio-tungstenite`
//!   (behind the default `websocket` feature).
//! - [`SyncSource`] and [`AuthoritativeCell`] — the versioned-write
//!   guard: every authoritative write carries a monotonic version and a
//!   source rank, and stale writes are dropped instead of applied.
//!
//! # How it fits in the stack
//!
//! ```text
//! Controllers (above)   ← subscribe, apply frames through a cell
//!     ↕
//! Sync layer (this crate)
//!     ↕
//! Protocol layer (below) ← EventFrame, SyncEvent, Codec
//! ```

#![allow(async_fn_in_trait)]

mod cell;
mod error;
mod hub;
#[cfg(feature = "websocket")]
mod websocket;

pub use cell::{AuthoritativeCell, SyncSource};
pub use error::SyncError;
pub use hub::InMemoryHub;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketSync;

use invigil_protocol::EventFrame;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A live subscription to one named channel.
///
/// Dropping the subscription unsubscribes: the backing implementation
/// notices the closed receiver and stops routing frames for it.
pub struct Subscription {
    channel: String,
    receiver: mpsc::UnboundedReceiver<EventFrame>,
}

impl Subscription {
    /// Creates a subscription from its parts. Implementations of
    /// [`SyncChannel`] call this; consumers only read from it.
    pub fn new(
        channel: String,
        receiver: mpsc::UnboundedReceiver<EventFrame>,
    ) -> Self {
        Self { channel, receiver }
    }

    /// The channel this subscription is attached to.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Receives the next frame. Returns `None` once the channel source
    /// is gone (hub dropped, connection closed).
    pub async fn next(&mut self) -> Option<EventFrame> {
        self.receiver.recv().await
    }
}

// ---------------------------------------------------------------------------
// SyncChannel
// ---------------------------------------------------------------------------

/// Something that can hand out per-channel push subscriptions.
///
/// The student controller subscribes to its session channel, the admin
/// aggregator to the exam channel. Implementations decide what actually
/// carries the frames (in-process hub, WebSocket, ...).
pub trait SyncChannel: Send + Sync + 'static {
    /// The error type for subscribe operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Subscribes to the named channel.
    async fn subscribe(&self, channel: &str) -> Result<Subscription, Self::Error>;
}
