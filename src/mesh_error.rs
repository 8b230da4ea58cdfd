//! MeshWorkletError: Unified error type for mesh-worklet public APIs
//!
//! Every fallible operation (array transfers, bind-time signature checks,
//! parallel-region failures surfaced after a dispatch) reports through this
//! type, so callers never see a panic for a caller error.

use thiserror::Error;

/// Unified error type for mesh-worklet operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshWorkletError {
    /// Allocating or copying backend (or host) storage failed.
    #[error("Transfer error: could not allocate {len} elements for {what}")]
    Transfer {
        /// What was being allocated (e.g. `"backend storage"`).
        what: &'static str,
        /// Requested element count.
        len: usize,
    },
    /// A worklet's declared signature does not match the bound arguments.
    #[error("Signature mismatch at parameter {slot}: {reason}")]
    SignatureMismatch {
        /// Zero-based parameter position in the worklet signature.
        slot: usize,
        /// Human-readable description of the incompatibility.
        reason: String,
    },
    /// A worklet invocation raised an error during a parallel region.
    #[error("Worklet runtime error: {0}")]
    WorkletRuntime(String),
    /// `shrink` was asked to grow the array.
    #[error("Cannot shrink array of length {len} to {requested}")]
    ShrinkOutOfRange {
        /// Requested new length.
        requested: usize,
        /// Current length.
        len: usize,
    },
    /// Two operands (or a destination buffer) disagree in length.
    #[error("Length mismatch: expected {expected}, found {found}")]
    LengthMismatch {
        /// Expected element count.
        expected: usize,
        /// Element count actually supplied.
        found: usize,
    },
    /// A prefix sum or derived size does not fit its element type.
    #[error("Overflow: {what} exceeds the range of its element type")]
    Overflow {
        /// The computation that overflowed (e.g. `"inclusive scan"`).
        what: &'static str,
    },
    /// The process-wide default configuration can only be set once.
    #[error("Runtime configuration has already been set")]
    ConfigAlreadySet,
    /// The multi-core backend failed to build its thread pool.
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

impl MeshWorkletError {
    pub(crate) fn scan_overflow() -> Self {
        MeshWorkletError::Overflow { what: "inclusive scan" }
    }

    /// Shorthand for a [`MeshWorkletError::SignatureMismatch`].
    pub(crate) fn mismatch(slot: usize, reason: impl Into<String>) -> Self {
        MeshWorkletError::SignatureMismatch {
            slot,
            reason: reason.into(),
        }
    }
}
