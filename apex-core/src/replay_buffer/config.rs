//! Configuration of the replay buffer.
use crate::error::ApexError;
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of prioritized sampling.
///
/// ```rust
/// use apex_core::replay_buffer::PerConfig;
///
/// let config = PerConfig::default()
///     .alpha(0.6)
///     .beta_0(0.4)
///     .beta_final(1.0)
///     .explore_step(1_000_000);
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PerConfig {
    /// Exponent applied to absolute TD errors to obtain priorities.
    /// `0` gives uniform sampling.
    pub alpha: f32,

    /// Initial exponent of importance weights.
    pub beta_0: f32,

    /// Final exponent of importance weights.
    pub beta_final: f32,

    /// Environment steps over which beta is annealed from `beta_0` to `beta_final`.
    pub explore_step: usize,

    /// Probability of drawing a slot uniformly instead of by priority.
    pub uniform_sample_prob: f32,

    /// Added to absolute TD errors so no slot gets a zero priority.
    pub priority_eps: f32,
}

impl Default for PerConfig {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            beta_0: 0.4,
            beta_final: 1.0,
            explore_step: 1_000_000,
            uniform_sample_prob: 1e-3,
            priority_eps: 1e-6,
        }
    }
}

impl PerConfig {
    /// Sets the exponent of priorities.
    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Sets the initial exponent of importance weights.
    pub fn beta_0(mut self, beta_0: f32) -> Self {
        self.beta_0 = beta_0;
        self
    }

    /// Sets the final exponent of importance weights.
    pub fn beta_final(mut self, beta_final: f32) -> Self {
        self.beta_final = beta_final;
        self
    }

    /// Sets the annealing horizon of beta in environment steps.
    pub fn explore_step(mut self, explore_step: usize) -> Self {
        self.explore_step = explore_step;
        self
    }

    /// Sets the probability of uniform draws.
    pub fn uniform_sample_prob(mut self, uniform_sample_prob: f32) -> Self {
        self.uniform_sample_prob = uniform_sample_prob;
        self
    }

    /// Sets the offset added to absolute TD errors.
    pub fn priority_eps(mut self, priority_eps: f32) -> Self {
        self.priority_eps = priority_eps;
        self
    }

    fn validate(&self) -> Result<(), ApexError> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.alpha) {
            return Err(ApexError::InvalidConfig(format!(
                "alpha must be in [0, 1], got {}",
                self.alpha
            )));
        }
        if !unit.contains(&self.beta_0) {
            return Err(ApexError::InvalidConfig(format!(
                "beta_0 must be in [0, 1], got {}",
                self.beta_0
            )));
        }
        if !(self.beta_0..=1.0).contains(&self.beta_final) {
            return Err(ApexError::InvalidConfig(format!(
                "beta_final must be in [beta_0, 1], got {}",
                self.beta_final
            )));
        }
        if !unit.contains(&self.uniform_sample_prob) {
            return Err(ApexError::InvalidConfig(format!(
                "uniform_sample_prob must be in [0, 1], got {}",
                self.uniform_sample_prob
            )));
        }
        if !(self.priority_eps >= 0.0) {
            return Err(ApexError::InvalidConfig(format!(
                "priority_eps must be non-negative, got {}",
                self.priority_eps
            )));
        }
        Ok(())
    }
}

/// Configuration of [`ReplayBuffer`](super::ReplayBuffer).
///
/// ```rust
/// use apex_core::replay_buffer::{PerConfig, ReplayBufferConfig};
///
/// let config = ReplayBufferConfig::default()
///     .capacity(100_000)
///     .seed(42)
///     .per_config(Some(PerConfig::default()));
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ReplayBufferConfig {
    /// Maximum number of windows held. The oldest window is overwritten when full.
    pub capacity: usize,

    /// Random seed used for sampling.
    pub seed: u64,

    /// Prioritized sampling. If `None`, windows are sampled uniformly and all
    /// importance weights are 1.
    pub per_config: Option<PerConfig>,
}

impl Default for ReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 10000,
            seed: 42,
            per_config: None,
        }
    }
}

impl ReplayBufferConfig {
    /// Sets the capacity of the replay buffer.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the random seed for sampling.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the configuration of prioritized sampling.
    pub fn per_config(mut self, per_config: Option<PerConfig>) -> Self {
        self.per_config = per_config;
        self
    }

    pub(super) fn validate(&self) -> Result<(), ApexError> {
        if self.capacity == 0 {
            return Err(ApexError::InvalidConfig(
                "capacity must be positive".to_string(),
            ));
        }
        match &self.per_config {
            Some(per_config) => per_config.validate(),
            None => Ok(()),
        }
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of replay buffer from {}", path_.to_str().unwrap_or("?"));
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of replay buffer into {}", path_.to_str().unwrap_or("?"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn yaml_round_trip() -> Result<()> {
        let config = ReplayBufferConfig::default()
            .capacity(1000)
            .seed(7)
            .per_config(Some(PerConfig::default().alpha(0.5)));
        let dir = TempDir::new("replay_buffer_config")?;
        let path = dir.path().join("replay_buffer.yaml");
        config.save(&path)?;
        assert_eq!(ReplayBufferConfig::load(&path)?, config);
        Ok(())
    }

    #[test]
    fn out_of_domain_values_fail() {
        let bad = [
            ReplayBufferConfig::default().capacity(0),
            ReplayBufferConfig::default().per_config(Some(PerConfig::default().alpha(1.5))),
            ReplayBufferConfig::default().per_config(Some(PerConfig::default().beta_0(-0.1))),
            ReplayBufferConfig::default()
                .per_config(Some(PerConfig::default().beta_0(0.8).beta_final(0.5))),
            ReplayBufferConfig::default()
                .per_config(Some(PerConfig::default().uniform_sample_prob(2.0))),
        ];
        for config in bad.iter() {
            assert!(matches!(
                config.validate(),
                Err(ApexError::InvalidConfig(_))
            ));
        }
        assert!(ReplayBufferConfig::default()
            .per_config(Some(PerConfig::default()))
            .validate()
            .is_ok());
    }
}
