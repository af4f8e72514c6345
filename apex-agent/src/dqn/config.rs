//! Configuration of DQN agent.
use super::explorer::{DqnExplorer, EpsilonGreedy};
use crate::util::CriticLoss;
use anyhow::Result;
use apex_core::{replay_buffer::ReplayBufferConfig, ApexError};
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Constructs [`Dqn`](super::Dqn) and the [`DqnCore`](super::DqnCore) of the other agents.
///
/// `C` is the configuration of the Q-model.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DqnConfig<C> {
    /// Configuration of the online and target models.
    pub model_config: C,

    /// Windows per optimization step.
    pub batch_size: usize,

    /// Discount factor.
    pub gamma: f32,

    /// Environment steps before the first optimization step.
    pub start_train_step: usize,

    /// Environment steps between hard copies of the online model into the target model.
    pub target_update_period: usize,

    /// Exploration strategy.
    pub explorer: DqnExplorer,

    /// Loss of the 1-step and multi-step variants.
    pub critic_loss: CriticLoss,

    /// Replay buffer.
    pub replay_buffer_config: ReplayBufferConfig,

    /// Whether the agent starts in training mode.
    pub train: bool,

    /// Seed of model initialization and exploration.
    pub seed: u64,
}

impl<C: Default> Default for DqnConfig<C> {
    fn default() -> Self {
        Self {
            model_config: C::default(),
            batch_size: 32,
            gamma: 0.99,
            start_train_step: 2_000,
            target_update_period: 500,
            explorer: EpsilonGreedy::with_final_step(20_000),
            critic_loss: CriticLoss::Mse,
            replay_buffer_config: ReplayBufferConfig::default(),
            train: true,
            seed: 42,
        }
    }
}

impl<C> DqnConfig<C>
where
    C: Serialize,
{
    /// Sets the configuration of the model.
    pub fn model_config(mut self, model_config: C) -> Self {
        self.model_config = model_config;
        self
    }

    /// Batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Discount factor.
    pub fn gamma(mut self, v: f32) -> Self {
        self.gamma = v;
        self
    }

    /// Environment steps before the first optimization step.
    pub fn start_train_step(mut self, v: usize) -> Self {
        self.start_train_step = v;
        self
    }

    /// Interval of target network updates in environment steps.
    pub fn target_update_period(mut self, v: usize) -> Self {
        self.target_update_period = v;
        self
    }

    /// Explorer.
    pub fn explorer(mut self, v: DqnExplorer) -> Self {
        self.explorer = v;
        self
    }

    /// Critic loss.
    pub fn critic_loss(mut self, v: CriticLoss) -> Self {
        self.critic_loss = v;
        self
    }

    /// Replay buffer.
    pub fn replay_buffer_config(mut self, v: ReplayBufferConfig) -> Self {
        self.replay_buffer_config = v;
        self
    }

    /// Training mode.
    pub fn train(mut self, v: bool) -> Self {
        self.train = v;
        self
    }

    /// Random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ApexError> {
        if self.batch_size == 0 {
            return Err(ApexError::InvalidConfig("batch_size must be positive".into()));
        }
        if self.batch_size > self.replay_buffer_config.capacity {
            return Err(ApexError::InvalidConfig(format!(
                "batch_size {} exceeds buffer capacity {}",
                self.batch_size, self.replay_buffer_config.capacity
            )));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(ApexError::InvalidConfig(format!(
                "gamma must be in [0, 1], got {}",
                self.gamma
            )));
        }
        Ok(())
    }

    /// Loads [`DqnConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self>
    where
        C: for<'de> Deserialize<'de>,
    {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of DQN agent from {:?}", path_);
        Ok(b)
    }

    /// Saves [`DqnConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of DQN agent into {:?}", path_);
        Ok(())
    }
}
