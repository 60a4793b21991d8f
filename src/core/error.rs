//! Transfer errors.

use super::state::StateType;
use thiserror::Error;

/// A deferred input's resolver was dropped before a value ever arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deferred input was dropped before a value arrived")]
pub struct DeferredDropped;

/// Errors that can occur while transferring between states.
///
/// A failed transfer is caught and logged at the queue step boundary; it
/// never halts the serial queue and the engine attempts no retry.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The view layer rejected a `transfer_to`/`transfer_out`.
    #[error("state '{state}' failed to transfer: {reason}")]
    StateFailed { state: StateType, reason: String },

    /// A pending input can never resolve.
    #[error(transparent)]
    Deferred(#[from] DeferredDropped),
}

impl TransferError {
    /// Shorthand for a view-layer failure.
    pub fn state_failed(state: StateType, reason: impl Into<String>) -> Self {
        Self::StateFailed {
            state,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_failure_formats_with_context() {
        let err = TransferError::state_failed(StateType::KeypadShow, "animation torn down");
        assert_eq!(
            err.to_string(),
            "state 'keypadShow' failed to transfer: animation torn down"
        );
    }

    #[test]
    fn deferred_drop_converts() {
        let err: TransferError = DeferredDropped.into();
        assert!(matches!(err, TransferError::Deferred(_)));
    }
}
