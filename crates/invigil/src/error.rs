//! Unified error type for the Invigil workspace.

use invigil_monitor::MonitorError;
use invigil_protocol::{GatewayError, ProtocolError};
use invigil_session::SessionError;
use invigil_sync::SyncError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `invigil` meta-crate, callers deal with this single
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attributes auto-generate `From` impls, so the `?` operator converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum InvigilError {
    /// A protocol-level error (encode, decode, invalid frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A sync-channel error (connect, subscribe, closed).
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// A gateway error (HTTP status, transport, decode).
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A student-side controller error.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// An admin-side aggregator error.
    #[error(transparent)]
    Monitor(#[from] MonitorError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_sync_error() {
        let err = SyncError::ChannelClosed;
        let top: InvigilError = err.into();
        assert!(matches!(top, InvigilError::Sync(_)));
    }

    #[test]
    fn test_from_gateway_error() {
        let err = GatewayError::Http { status: 503 };
        let top: InvigilError = err.into();
        assert_eq!(top.to_string(), "gateway returned HTTP 503");
    }

    #[test]
    fn test_from_monitor_error_preserves_message() {
        let err = MonitorError::InvalidMinutes(0);
        let top: InvigilError = err.into();
        assert_eq!(top.to_string(), "invalid minutes value: 0");
    }
}
