use apex_core::{Rollout, WeightSnapshot};
use std::sync::Arc;

/// Requests an [`Actor`](crate::Actor) receives from the [`ActorPool`](crate::ActorPool).
#[derive(Debug, Clone)]
pub enum ActorRequest {
    /// Take the given number of environment steps.
    Run(usize),

    /// Replace the local parameters with the snapshot.
    Sync(Arc<WeightSnapshot>),

    /// Leave the loop.
    Stop,
}

/// Responses an [`Actor`](crate::Actor) sends back to the [`ActorPool`](crate::ActorPool).
#[derive(Debug, Clone)]
pub enum ActorResponse<O, A> {
    /// Transitions of a [`ActorRequest::Run`] and the scores of episodes finished in it.
    Rollout {
        /// Actor index.
        id: usize,

        /// Transitions in the order they were taken.
        rollout: Rollout<O, A>,

        /// Scores of the episodes finished during the run.
        scores: Vec<f32>,
    },

    /// The snapshot of the given version is in use.
    SyncAck {
        /// Actor index.
        id: usize,

        /// Version of the snapshot.
        version: usize,
    },

    /// The actor hit an unrecoverable error and left its loop.
    Fault {
        /// Actor index.
        id: usize,

        /// Description of the error.
        reason: String,
    },
}
