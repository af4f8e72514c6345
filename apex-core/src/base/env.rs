//! Environment.
use super::{Act, Obs, Step};
use anyhow::Result;

/// Shape of the action space of an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionMode {
    /// Discrete actions `{0, .., n - 1}`.
    Discrete(usize),

    /// Continuous actions with the given dimension.
    Continuous(usize),
}

/// Represents an environment, typically an MDP.
///
/// Each actor owns its own environment instance. Building an environment may not be
/// thread-safe for some backends, so the runtime serializes calls to [`Env::build`].
pub trait Env {
    /// Configurations.
    type Config: Clone + Send + 'static;

    /// Observation of the environment.
    type Obs: Obs;

    /// Action of the environment.
    type Act: Act;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Resets the environment and returns the initial observation.
    fn reset(&mut self) -> Result<Self::Obs>;

    /// Performes an environment step.
    ///
    /// When the returned step has `is_done == true`, the caller resets the environment
    /// before the next call.
    fn step(&mut self, a: &Self::Act) -> Result<Step<Self>>
    where
        Self: Sized;

    /// Shape of the action space.
    fn mode(&self) -> ActionMode;

    /// Score of the episode in progress, typically the cumulative reward.
    fn score(&self) -> f32;
}
