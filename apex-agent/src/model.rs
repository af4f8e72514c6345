//! Interface of action-value functions used by the agents.
use crate::util::CriticLoss;
use anyhow::Result;
use apex_core::NamedParams;
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt::Debug, path::Path};

/// Outcome of one gradient step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptStat {
    /// Weighted loss of the batch before the step.
    pub loss: f32,

    /// Norm of the gradient before clipping.
    pub grad_norm: f32,
}

/// An action-value function `Q(s, .)` over a finite action set, with its optimizer.
pub trait QModel: Sized {
    /// Configuration from which the model is built.
    type Config: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + 'static;

    /// Builds a model. `seed` drives parameter initialization.
    fn build(config: Self::Config, seed: u64) -> Result<Self>;

    /// Number of actions.
    fn n_actions(&self) -> usize;

    /// Action values of one observation.
    fn forward(&self, obs: &[f32]) -> Vec<f32>;

    /// Performs one gradient step on `mean_i weights[i] * loss(Q(obs[i], acts[i]) - targets[i])`.
    ///
    /// With `clip_grad_norm`, the gradient is rescaled so its norm does not exceed the
    /// bound. A loss or gradient that is not finite fails with
    /// [`ApexError::NonFiniteLoss`](apex_core::ApexError::NonFiniteLoss) and leaves the
    /// parameters untouched.
    fn backward_step(
        &mut self,
        obs: &[&[f32]],
        acts: &[usize],
        targets: &[f32],
        weights: &[f32],
        loss: CriticLoss,
        clip_grad_norm: Option<f32>,
    ) -> Result<OptStat>;

    /// Copy of the parameters.
    fn parameters(&self) -> NamedParams;

    /// Replaces the parameters. Fails with
    /// [`ApexError::SnapshotMismatch`](apex_core::ApexError::SnapshotMismatch) if a
    /// parameter is missing or has the wrong size.
    fn load_parameters(&mut self, params: &NamedParams) -> Result<()>;

    /// Saves parameters and optimizer state.
    fn save(&self, path: &Path) -> Result<()>;

    /// Loads parameters and optimizer state.
    fn load(&mut self, path: &Path) -> Result<()>;
}

/// A [`QModel`] that represents the return of each action by `n_quantiles` quantiles.
///
/// Quantile `j` estimates the fraction `(2j + 1) / 2n` of the return distribution, and
/// [`QModel::forward`] returns the mean of the quantiles of each action.
pub trait QuantileModel: QModel {
    /// Number of quantiles per action.
    fn n_quantiles(&self) -> usize;

    /// Quantiles of one observation, one row of `n_quantiles` values per action.
    fn quantiles(&self, obs: &[f32]) -> Vec<Vec<f32>>;

    /// Performs one gradient step on the quantile Huber loss between the quantiles of
    /// `acts[i]` and the samples `targets[i]` of the target distribution.
    ///
    /// The loss of a sample sums over quantiles and averages over target samples, and
    /// the batch loss is the `weights`-weighted mean. Clipping and non-finite losses
    /// are handled as in [`QModel::backward_step`].
    fn quantile_backward_step(
        &mut self,
        obs: &[&[f32]],
        acts: &[usize],
        targets: &[Vec<f32>],
        weights: &[f32],
        clip_grad_norm: Option<f32>,
    ) -> Result<OptStat>;
}
