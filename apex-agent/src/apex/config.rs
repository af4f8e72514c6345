//! Configuration of Ape-X agent.
use crate::dqn::DqnConfig;
use anyhow::Result;
use apex_core::{replay_buffer::PerConfig, ApexError};
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Apex`](super::Apex).
///
/// Prioritized replay is configured by `per_config`, which replaces the one in
/// `dqn.replay_buffer_config`.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ApexConfig<C> {
    /// Model, batch, discount and target update settings.
    pub dqn: DqnConfig<C>,

    /// Base exploration rate.
    pub epsilon: f32,

    /// Spread of exploration rates over actors.
    pub epsilon_alpha: f32,

    /// Bound of the gradient norm.
    pub clip_grad_norm: f32,

    /// Environment steps between optimization steps.
    pub learn_period: usize,

    /// Length of windows.
    pub n_step: usize,

    /// Prioritized replay.
    pub per_config: PerConfig,
}

impl<C: Default> Default for ApexConfig<C> {
    fn default() -> Self {
        Self {
            dqn: DqnConfig::default(),
            epsilon: 0.4,
            epsilon_alpha: 0.7,
            clip_grad_norm: 40.0,
            learn_period: 4,
            n_step: 4,
            per_config: PerConfig::default()
                .alpha(0.6)
                .beta_0(0.4)
                .uniform_sample_prob(1e-3),
        }
    }
}

impl<C: Serialize> ApexConfig<C> {
    /// Sets the configuration of model, batch and target updates.
    pub fn dqn(mut self, dqn: DqnConfig<C>) -> Self {
        self.dqn = dqn;
        self
    }

    /// Sets the base exploration rate.
    pub fn epsilon(mut self, v: f32) -> Self {
        self.epsilon = v;
        self
    }

    /// Sets the spread of exploration rates.
    pub fn epsilon_alpha(mut self, v: f32) -> Self {
        self.epsilon_alpha = v;
        self
    }

    /// Sets the bound of the gradient norm.
    pub fn clip_grad_norm(mut self, v: f32) -> Self {
        self.clip_grad_norm = v;
        self
    }

    /// Sets the environment steps between optimization steps.
    pub fn learn_period(mut self, v: usize) -> Self {
        self.learn_period = v;
        self
    }

    /// Sets the length of windows.
    pub fn n_step(mut self, v: usize) -> Self {
        self.n_step = v;
        self
    }

    /// Sets prioritized replay.
    pub fn per_config(mut self, v: PerConfig) -> Self {
        self.per_config = v;
        self
    }

    pub(super) fn validate(&self) -> Result<(), ApexError> {
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(ApexError::InvalidConfig(format!(
                "epsilon must be in [0, 1], got {}",
                self.epsilon
            )));
        }
        if !(self.epsilon_alpha >= 0.0) {
            return Err(ApexError::InvalidConfig(format!(
                "epsilon_alpha must be non-negative, got {}",
                self.epsilon_alpha
            )));
        }
        if !(self.clip_grad_norm > 0.0) {
            return Err(ApexError::InvalidConfig(format!(
                "clip_grad_norm must be positive, got {}",
                self.clip_grad_norm
            )));
        }
        Ok(())
    }

    /// Loads [`ApexConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self>
    where
        C: for<'de> Deserialize<'de>,
    {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of Ape-X agent from {:?}", path_);
        Ok(b)
    }

    /// Saves [`ApexConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of Ape-X agent into {:?}", path_);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::LinearQConfig;

    #[test]
    fn negative_epsilon_alpha_fails() {
        let config = ApexConfig::<LinearQConfig>::default().epsilon_alpha(-0.5);
        assert!(matches!(
            config.validate(),
            Err(ApexError::InvalidConfig(_))
        ));
        let config = ApexConfig::<LinearQConfig>::default().epsilon_alpha(0.0);
        assert!(config.validate().is_ok());
    }
}
