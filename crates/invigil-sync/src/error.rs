//! Error types for the sync layer.

/// Errors that can occur while connecting or subscribing to a sync
/// channel.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The underlying connection could not be established.
    #[error("sync connect failed: {0}")]
    ConnectFailed(String),

    /// The subscribe request could not be delivered (connection task
    /// gone, write failed).
    #[error("subscribe to {0} failed")]
    SubscribeFailed(String),

    /// The channel source closed while a subscription was active.
    #[error("sync channel closed")]
    ChannelClosed,
}
