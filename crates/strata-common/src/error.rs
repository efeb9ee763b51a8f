//! Error types for strata-runtime.
//!
//! This module defines a hierarchy of error types using `thiserror`:
//! - [`WorkerError`]: Top-level errors for a worker process
//! - [`StateError`]: Errors from the state cache and synchronization engine
//! - [`ChainError`]: Errors from the chained-invocation model
//! - [`AbiError`]: Errors from the guest ABI boundary

use thiserror::Error;

/// Top-level worker errors.
///
/// These errors represent failures that can occur while a worker drives a
/// function call end-to-end. Errors local to one state entry or one chained
/// call never abort the dispatch loop; the loop reports a failed outcome and
/// moves on to the next call.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// State cache operation failed.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Chained-invocation operation failed.
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    /// Guest ABI boundary violation.
    #[error("ABI error: {0}")]
    Abi(#[from] AbiError),

    /// The work queue was closed on the producer side.
    #[error("Work queue closed")]
    QueueClosed,

    /// No function is registered under the given index.
    #[error("Function not found: index {index}")]
    FunctionNotFound {
        /// The function index that could not be resolved.
        index: u32,
    },

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },
}

/// Errors from the state cache and synchronization engine.
///
/// Operations against the remote backing store surface unavailability as a
/// recoverable error; retry policy belongs to the transport collaborator,
/// not to the cache.
#[derive(Error, Debug)]
pub enum StateError {
    /// A state operation was attempted before the value's total size was
    /// established with an explicit size hint or `init_state`.
    #[error("Key not initialized: {key}")]
    KeyNotInitialized {
        /// The state key that has no cache entry.
        key: String,
    },

    /// A segment operation exceeded the value's total size.
    #[error("Range out of bounds: offset {offset} + length {length} > size {size}")]
    RangeOutOfBounds {
        /// Start of the requested range.
        offset: u64,
        /// Length of the requested range.
        length: u64,
        /// Total size of the cached value.
        size: u64,
    },

    /// A full-value write did not match the entry's fixed total size.
    #[error("Size mismatch: got {got} bytes, entry size is {size}")]
    SizeMismatch {
        /// Length of the supplied buffer.
        got: u64,
        /// Total size of the cached value.
        size: u64,
    },

    /// A source locator could not be parsed as a URL.
    #[error("Invalid source locator: {locator}")]
    InvalidSourceLocator {
        /// The locator string that failed to parse.
        locator: String,
    },

    /// The backing store holds no value for the given key.
    #[error("Remote value missing: {key}")]
    RemoteValueMissing {
        /// The state key with no remote value.
        key: String,
    },

    /// The backing store could not be reached.
    #[error("Backing store unavailable: {reason}")]
    StoreUnavailable {
        /// Description of the transport failure.
        reason: String,
    },
}

/// Errors from the chained-invocation model.
#[derive(Error, Debug)]
pub enum ChainError {
    /// No call record exists for the given identifier.
    #[error("Unknown call: {call_id}")]
    UnknownCall {
        /// The identifier that was never issued.
        call_id: u64,
    },

    /// The call record exists but its task handle was already consumed.
    #[error("Call {call_id} is not joinable")]
    NotJoinable {
        /// The identifier whose task was already awaited.
        call_id: u64,
    },

    /// The chained task could not be joined (e.g., it panicked).
    #[error("Failed to join call {call_id}: {reason}")]
    Join {
        /// The identifier of the failed task.
        call_id: u64,
        /// Description of the join failure.
        reason: String,
    },
}

/// Errors from the guest ABI boundary.
///
/// A full chain table is deliberately *not* represented here: exceeding
/// `MAX_CHAINS` is a logged no-op at the ABI boundary.
#[derive(Error, Debug)]
pub enum AbiError {
    /// Output exceeds the output region capacity.
    #[error("Output too large: {length} bytes exceeds maximum of {max}")]
    OutputTooLarge {
        /// Length of the rejected output.
        length: usize,
        /// The output region capacity.
        max: usize,
    },

    /// Input exceeds the input region capacity.
    #[error("Input too large: {length} bytes exceeds maximum of {max}")]
    InputTooLarge {
        /// Length of the rejected input.
        length: usize,
        /// The input region capacity.
        max: usize,
    },
}

impl WorkerError {
    /// Create a new `FunctionNotFound` error.
    pub fn function_not_found(index: u32) -> Self {
        Self::FunctionNotFound { index }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error indicates the work queue was closed.
    pub fn is_queue_closed(&self) -> bool {
        matches!(self, Self::QueueClosed)
    }
}

impl StateError {
    /// Create a new `KeyNotInitialized` error.
    pub fn key_not_initialized(key: impl Into<String>) -> Self {
        Self::KeyNotInitialized { key: key.into() }
    }

    /// Create a new `StoreUnavailable` error.
    pub fn store_unavailable(reason: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error is recoverable by retrying the transfer
    /// once the backing store is reachable again.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StateError::key_not_initialized("counter");
        assert_eq!(err.to_string(), "Key not initialized: counter");

        let err = StateError::RangeOutOfBounds {
            offset: 4,
            length: 8,
            size: 10,
        };
        assert_eq!(
            err.to_string(),
            "Range out of bounds: offset 4 + length 8 > size 10"
        );

        let err = ChainError::UnknownCall { call_id: 42 };
        assert_eq!(err.to_string(), "Unknown call: 42");
    }

    #[test]
    fn test_error_from_state() {
        let state_err = StateError::SizeMismatch { got: 3, size: 4 };
        let worker_err: WorkerError = state_err.into();

        assert!(matches!(worker_err, WorkerError::State(_)));
    }

    #[test]
    fn test_error_from_chain() {
        let chain_err = ChainError::NotJoinable { call_id: 7 };
        let worker_err: WorkerError = chain_err.into();

        assert!(matches!(worker_err, WorkerError::Chain(_)));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(StateError::store_unavailable("connection refused").is_recoverable());
        assert!(!StateError::key_not_initialized("k").is_recoverable());
    }

    #[test]
    fn test_is_queue_closed() {
        assert!(WorkerError::QueueClosed.is_queue_closed());
        assert!(!WorkerError::function_not_found(3).is_queue_closed());
    }
}
