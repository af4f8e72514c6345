//! Agent.
use super::{Env, Policy, Rollout, WeightSnapshot};
use crate::record::Record;
use anyhow::Result;
use std::path::Path;

/// Represents a trainable policy on an environment.
///
/// The same type plays two roles. On the learner it receives rollouts through
/// [`Agent::process_step`], stores them in its replay buffer and optimizes its
/// Q-function. On an actor it only acts, and refreshes its parameters with
/// [`Agent::sync_in`].
pub trait Agent<E: Env>: Policy<E> {
    /// Set the policy to training mode.
    fn train(&mut self);

    /// Set the policy to evaluation mode.
    fn eval(&mut self);

    /// Return if it is in training mode.
    fn is_train(&self) -> bool;

    /// Tells the agent it is actor `id` of `n_actors`.
    ///
    /// Agents use this to pick a per-actor exploration rate.
    fn set_distributed(&mut self, id: usize, n_actors: usize);

    /// Feeds rollouts produced by actors into the agent.
    ///
    /// `env_step` is the total number of environment steps so far, including the
    /// given rollouts. The agent may perform zero or more optimization steps and
    /// returns a record of what it did.
    fn process_step(
        &mut self,
        rollouts: Vec<Rollout<E::Obs, E::Act>>,
        env_step: usize,
    ) -> Result<Record>;

    /// Performs one optimization step.
    ///
    /// Returns `Ok(None)` when the replay buffer does not hold enough data yet.
    fn learn(&mut self) -> Result<Option<Record>>;

    /// Exports the parameters actors need.
    fn sync_out(&self) -> WeightSnapshot;

    /// Replaces parameters with a snapshot taken by [`Agent::sync_out`].
    fn sync_in(&mut self, snapshot: &WeightSnapshot) -> Result<()>;

    /// Save the parameters of the agent in the given directory.
    fn save(&self, path: &Path) -> Result<()>;

    /// Load the parameters of the agent from the given directory.
    fn load(&mut self, path: &Path) -> Result<()>;
}
