//! Custom error types for the bridge.
//!
//! This module defines the primary error type, `PinError`, for the entire
//! crate. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the failure modes of a pin stream, from caller
//! bugs caught at construction time to hardware failures surfaced mid-stream.
//!
//! ## Error Taxonomy
//!
//! - **`InvalidArgument`**: A caller bug (negative poll interval, malformed
//!   pin configuration). Raised synchronously at construction time, before
//!   any hardware access; never delivered as a stream error.
//! - **`ConnectionLost`**: The link to the I/O controller dropped in the
//!   middle of an open, read, or write. Expected and recoverable at the
//!   application layer via reconnect; delivered as a terminal stream error.
//! - **`HandleCloseFailure`**: Closing an already-problematic pin handle
//!   itself failed. Reported, never silently dropped.
//! - **`CompositeFailure`**: An original error plus a cleanup failure, both
//!   preserved so neither is discarded.
//!
//! The type is `Clone` because terminal events are multicast to every
//! current observer of a stream.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type PinResult<T> = std::result::Result<T, PinError>;

/// Errors produced by pin streams and their construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PinError {
    /// A caller bug caught before any hardware access.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The connection to the I/O controller was lost mid-operation.
    #[error("connection to the I/O controller was lost")]
    ConnectionLost,

    /// Closing a pin handle failed.
    #[error("failed to close pin handle: {0}")]
    HandleCloseFailure(String),

    /// An original failure plus a cleanup failure, both preserved.
    #[error("{original} (cleanup also failed: {cleanup})")]
    CompositeFailure {
        /// The error that triggered the cleanup.
        original: Box<PinError>,
        /// The error raised by the cleanup itself.
        cleanup: Box<PinError>,
    },
}

impl PinError {
    /// Returns `true` when this error (or the original half of a composite)
    /// is a lost-connection condition.
    pub fn is_connection_lost(&self) -> bool {
        match self {
            PinError::ConnectionLost => true,
            PinError::CompositeFailure { original, .. } => original.is_connection_lost(),
            _ => false,
        }
    }

    /// Combines an original error with a cleanup failure, preserving both.
    pub fn compose(original: PinError, cleanup: PinError) -> PinError {
        PinError::CompositeFailure {
            original: Box::new(original),
            cleanup: Box::new(cleanup),
        }
    }
}

/// Collapses a hardware failure from an open/read/write call into the
/// `ConnectionLost` stream error delivered to subscribers.
///
/// The collaborator contract only defines lost-connection failures for these
/// calls; anything else a controller implementation produces is treated the
/// same way, after leaving a trace of the original.
pub(crate) fn as_stream_error(err: PinError) -> PinError {
    match err {
        err @ PinError::ConnectionLost => err,
        other => {
            tracing::trace!(%other, "mapping hardware failure to ConnectionLost");
            PinError::ConnectionLost
        }
    }
}

/// Normalizes a failure raised by `PinHandle::close` into
/// `HandleCloseFailure`.
pub(crate) fn as_close_failure(err: PinError) -> PinError {
    match err {
        err @ PinError::HandleCloseFailure(_) => err,
        other => PinError::HandleCloseFailure(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_preserves_both_parts() {
        let err = PinError::compose(
            PinError::InvalidArgument("boom".into()),
            PinError::HandleCloseFailure("close failed".into()),
        );
        let text = err.to_string();
        assert!(text.contains("boom"));
        assert!(text.contains("close failed"));
    }

    #[test]
    fn connection_lost_detection_sees_through_composites() {
        assert!(PinError::ConnectionLost.is_connection_lost());
        assert!(PinError::compose(
            PinError::ConnectionLost,
            PinError::HandleCloseFailure("late".into()),
        )
        .is_connection_lost());
        assert!(!PinError::InvalidArgument("nope".into()).is_connection_lost());
    }

    #[test]
    fn stream_error_mapping_collapses_to_connection_lost() {
        assert_eq!(
            as_stream_error(PinError::ConnectionLost),
            PinError::ConnectionLost
        );
        assert_eq!(
            as_stream_error(PinError::InvalidArgument("odd".into())),
            PinError::ConnectionLost
        );
    }

    #[test]
    fn close_failure_mapping_is_idempotent() {
        let err = as_close_failure(PinError::HandleCloseFailure("kept".into()));
        assert_eq!(err, PinError::HandleCloseFailure("kept".into()));

        let wrapped = as_close_failure(PinError::ConnectionLost);
        assert!(matches!(wrapped, PinError::HandleCloseFailure(_)));
    }
}
