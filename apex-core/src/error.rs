//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
///
/// `InsufficientData` and `InvalidSlot` are recoverable: the learner skips the
/// optimization step or drops the priority update. `NonFiniteLoss` is fatal to the
/// learner. `InvalidConfig` is raised when a component is built.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApexError {
    /// A batch was requested before the buffer held enough windows.
    #[error("Insufficient data: {live} live windows, {requested} requested")]
    InsufficientData {
        /// Number of live windows in the buffer.
        live: usize,

        /// Requested batch size.
        requested: usize,
    },

    /// A priority update targeted a slot that is out of range or was overwritten.
    #[error("Invalid slot {slot}: {reason}")]
    InvalidSlot {
        /// Slot index.
        slot: usize,

        /// Why the slot was rejected.
        reason: String,
    },

    /// Priorities must be finite and non-negative.
    #[error("Invalid priority {0}")]
    InvalidPriority(f32),

    /// An actor failed while stepping its environment or exchanging messages.
    #[error("Actor {id} fault: {reason}")]
    ActorFault {
        /// Actor index.
        id: usize,

        /// Description of the fault.
        reason: String,
    },

    /// A gradient step produced a loss that is NaN or infinite.
    #[error("Non-finite loss: {0}")]
    NonFiniteLoss(f32),

    /// A configuration value is outside its domain.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// A weight snapshot does not fit the model it is loaded into.
    #[error("Snapshot mismatch: {0}")]
    SnapshotMismatch(String),

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),
}
