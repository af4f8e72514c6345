//! Errors of the actor pool and the training loop.
use thiserror::Error;

/// Errors of the actor pool and the training loop.
///
/// Faults of single actors are not errors of the pool: the actor is excluded and
/// the fault is kept as an [`ApexError::ActorFault`](apex_core::ApexError::ActorFault).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApexTrainerError {
    /// Every actor of the pool was excluded.
    #[error("No live actors left in round {round}")]
    NoLiveActors {
        /// Round in which the last actor was excluded.
        round: usize,
    },

    /// A worker thread could not be spawned.
    #[error("Failed to spawn thread {name}: {reason}")]
    Spawn {
        /// Name of the thread.
        name: String,

        /// Error reported by the OS.
        reason: String,
    },

    /// A worker thread panicked.
    #[error("Thread {0} panicked")]
    Panicked(String),

    /// A round returned no environment steps.
    #[error("Round {0} made no progress")]
    NoProgress(usize),
}
