//! Core functionalities.
mod agent;
mod env;
mod policy;
mod snapshot;
mod step;
mod transition;
pub use agent::Agent;
pub use env::{ActionMode, Env};
pub use policy::{Configurable, Policy};
pub use snapshot::{NamedParams, WeightSnapshot};
pub use step::Step;
pub use transition::{Rollout, Transition};
use std::fmt::Debug;

/// An observation of an environment.
///
/// Observations are moved between actor threads and the learner, so they must be
/// `Send` and owned.
pub trait Obs: Clone + Debug + Send + 'static {
    /// Returns the observation as a flat feature vector.
    fn features(&self) -> &[f32];
}

/// An action of an environment.
pub trait Act: Clone + Debug + Send + 'static {}

/// An action drawn from a finite set `{0, .., n_actions - 1}`.
pub trait DiscreteAct: Act {
    /// Builds the action from its index.
    fn from_index(ix: usize) -> Self;

    /// Index of the action.
    fn index(&self) -> usize;
}

impl Obs for Vec<f32> {
    fn features(&self) -> &[f32] {
        self.as_slice()
    }
}

impl Act for usize {}

impl DiscreteAct for usize {
    fn from_index(ix: usize) -> Self {
        ix
    }

    fn index(&self) -> usize {
        *self
    }
}

impl Act for Vec<f32> {}
