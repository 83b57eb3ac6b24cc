//! Error types for the protocol layer, plus the gateway error both
//! controllers receive from their REST collaborators.

/// Errors that can occur while encoding or decoding protocol data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed input, missing fields, or a
    /// type mismatch.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame decoded but violates protocol rules (empty channel
    /// name, unknown event for the channel, etc.).
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

/// Errors from the remote gateway (REST collaborator).
///
/// Both gateway traits return this; the controllers decide per call
/// site whether the failure is fatal (initial load), transient
/// (answer save), or ignorable (finish call after the decision to
/// exit is already made).
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The server answered with a non-success status.
    #[error("gateway returned HTTP {status}")]
    Http { status: u16 },

    /// The request never completed (connection refused, timeout, DNS).
    #[error("gateway transport error: {0}")]
    Transport(String),

    /// The response body did not match the expected shape.
    #[error("gateway response decode failed: {0}")]
    Decode(String),
}
