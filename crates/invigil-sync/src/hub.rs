//! In-process pub/sub hub.
//!
//! The production push channel is a remote service; tests and the demo
//! need the same shape in-process. The hub routes published events to
//! every live subscription on the channel and stamps each frame with a
//! per-channel monotonic version, the way the real service does.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use invigil_protocol::{EventFrame, SyncEvent};
use tokio::sync::mpsc;
use tracing::trace;

use crate::{Subscription, SyncChannel, SyncError};

#[derive(Default)]
struct ChannelState {
    subscribers: Vec<mpsc::UnboundedSender<EventFrame>>,
    next_version: u64,
}

/// An in-memory [`SyncChannel`]. Cheap to clone; all clones share the
/// same channels.
#[derive(Clone, Default)]
pub struct InMemoryHub {
    channels: Arc<Mutex<HashMap<String, ChannelState>>>,
}

impl InMemoryHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes an event on `channel`, stamping it with the channel's
    /// next version. Returns the stamped version.
    ///
    /// Subscribers whose receivers have been dropped are pruned here —
    /// a closed receiver is the unsubscribe signal.
    pub fn publish(&self, channel: &str, event: SyncEvent) -> u64 {
        let mut channels = self.channels.lock().expect("hub lock");
        let state = channels.entry(channel.to_string()).or_default();
        state.next_version += 1;
        let frame = EventFrame {
            channel: channel.to_string(),
            version: state.next_version,
            event,
        };
        state
            .subscribers
            .retain(|sender| sender.send(frame.clone()).is_ok());
        trace!(
            channel,
            version = frame.version,
            subscribers = state.subscribers.len(),
            "published"
        );
        frame.version
    }

    /// The version the next publish on `channel` will carry.
    pub fn next_version(&self, channel: &str) -> u64 {
        let channels = self.channels.lock().expect("hub lock");
        channels.get(channel).map_or(1, |s| s.next_version + 1)
    }

    /// Number of live subscriptions on `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        let mut channels = self.channels.lock().expect("hub lock");
        match channels.get_mut(channel) {
            Some(state) => {
                state.subscribers.retain(|s| !s.is_closed());
                state.subscribers.len()
            }
            None => 0,
        }
    }
}

impl SyncChannel for InMemoryHub {
    type Error = SyncError;

    async fn subscribe(&self, channel: &str) -> Result<Subscription, SyncError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut channels = self.channels.lock().expect("hub lock");
        channels
            .entry(channel.to_string())
            .or_default()
            .subscribers
            .push(tx);
        Ok(Subscription::new(channel.to_string(), rx))
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let hub = InMemoryHub::new();
        let mut sub = hub.subscribe("exam.1").await.unwrap();

        hub.publish("exam.1", SyncEvent::ExamForceFinished);

        let frame = sub.next().await.unwrap();
        assert_eq!(frame.channel, "exam.1");
        assert_eq!(frame.version, 1);
        assert_eq!(frame.event, SyncEvent::ExamForceFinished);
    }

    #[tokio::test]
    async fn test_versions_are_monotonic_per_channel() {
        let hub = InMemoryHub::new();
        let mut sub = hub.subscribe("exam.1").await.unwrap();

        hub.publish("exam.1", SyncEvent::TimerSynchronized { remaining_seconds: 9 });
        hub.publish("exam.1", SyncEvent::TimerSynchronized { remaining_seconds: 8 });
        // A different channel keeps its own counter.
        hub.publish("exam.2", SyncEvent::ExamForceFinished);

        assert_eq!(sub.next().await.unwrap().version, 1);
        assert_eq!(sub.next().await.unwrap().version, 2);
        assert_eq!(hub.next_version("exam.2"), 2);
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let hub = InMemoryHub::new();
        let mut sub_a = hub.subscribe("exam.1.session.1").await.unwrap();
        let mut sub_b = hub.subscribe("exam.1.session.2").await.unwrap();

        hub.publish("exam.1.session.2", SyncEvent::ExamForceFinished);

        let frame = sub_b.next().await.unwrap();
        assert_eq!(frame.channel, "exam.1.session.2");
        // Subscriber A got nothing.
        assert!(
            tokio::time::timeout(
                std::time::Duration::from_millis(20),
                sub_a.next()
            )
            .await
            .is_err()
        );
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_pruned() {
        let hub = InMemoryHub::new();
        let sub = hub.subscribe("exam.1").await.unwrap();
        assert_eq!(hub.subscriber_count("exam.1"), 1);

        drop(sub);
        hub.publish("exam.1", SyncEvent::ExamForceFinished);
        assert_eq!(hub.subscriber_count("exam.1"), 0);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_all_receive() {
        let hub = InMemoryHub::new();
        let mut sub1 = hub.subscribe("exam.9").await.unwrap();
        let mut sub2 = hub.subscribe("exam.9").await.unwrap();

        hub.publish("exam.9", SyncEvent::TimerSynchronized { remaining_seconds: 1 });

        assert!(sub1.next().await.is_some());
        assert!(sub2.next().await.is_some());
    }
}
