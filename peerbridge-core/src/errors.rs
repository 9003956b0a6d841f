//! Error types for `peerbridge_core`.
//!
//! Every failure that can cross the thread boundary is a [`BridgeError`].
//! The bridge itself never absorbs a fault: only a consumer (a peer or a
//! provider wrapper) decides, per operation, whether one specific kind is
//! replaced by a default.

use thiserror::Error;

/// Top-level error type for the `peerbridge_core` library.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The owning context no longer accepts work (torn down, or its thread
    /// could not be started).
    #[error("ContextUnavailable: {0}")]
    ContextUnavailable(String),

    /// Fault raised by the delegated operation itself, e.g. an invalid
    /// argument to `set_value`.  Propagated to the caller unchanged.
    #[error("OperationFault: {0}")]
    OperationFault(String),

    /// A live native resource (window handle) no longer exists.
    #[error("ResourceFault: {0}")]
    ResourceFault(String),

    /// A marshalled value was narrowed to the wrong shape at the call site.
    #[error("ResultTypeMismatch: expected {expected}, got {actual}")]
    ResultTypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// The operation panicked on the owning thread.
    #[error("OperationPanicked: {0}")]
    OperationPanicked(String),
}

impl BridgeError {
    /// `true` for the one fault kind that root-peer queries absorb.
    pub fn is_recoverable_resource_fault(&self) -> bool {
        matches!(self, BridgeError::ResourceFault(_))
    }
}

/// Convert a `windows::core::Error` into a [`BridgeError`].
///
/// `ERROR_INVALID_WINDOW_HANDLE` is the stale-handle case and becomes a
/// [`BridgeError::ResourceFault`]; every other HRESULT is an operation fault.
#[cfg(windows)]
impl From<windows::core::Error> for BridgeError {
    fn from(err: windows::core::Error) -> Self {
        use windows::core::HRESULT;
        use windows::Win32::Foundation::ERROR_INVALID_WINDOW_HANDLE;

        if err.code() == HRESULT::from_win32(ERROR_INVALID_WINDOW_HANDLE.0) {
            BridgeError::ResourceFault(format!("window handle is no longer valid: {err}"))
        } else {
            BridgeError::OperationFault(format!("Windows error: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_kind_prefix() {
        let err = BridgeError::ContextUnavailable("ui thread gone".into());
        assert_eq!(err.to_string(), "ContextUnavailable: ui thread gone");

        let err = BridgeError::ResultTypeMismatch {
            expected: "text",
            actual: "flag",
        };
        assert_eq!(err.to_string(), "ResultTypeMismatch: expected text, got flag");
    }

    #[test]
    fn test_only_resource_fault_is_recoverable() {
        assert!(BridgeError::ResourceFault("stale".into()).is_recoverable_resource_fault());
        assert!(!BridgeError::OperationFault("bad".into()).is_recoverable_resource_fault());
        assert!(!BridgeError::ContextUnavailable("gone".into()).is_recoverable_resource_fault());
    }
}
