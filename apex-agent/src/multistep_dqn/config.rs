use crate::{dqn::DqnConfig, util::CriticLoss};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`MultistepDqn`](super::MultistepDqn).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct MultistepDqnConfig<C> {
    /// Configuration of the underlying DQN.
    pub dqn: DqnConfig<C>,

    /// Length of windows.
    pub n_step: usize,
}

impl<C: Default> Default for MultistepDqnConfig<C> {
    fn default() -> Self {
        Self {
            dqn: DqnConfig {
                critic_loss: CriticLoss::SmoothL1,
                ..DqnConfig::default()
            },
            n_step: 5,
        }
    }
}

impl<C: Serialize> MultistepDqnConfig<C> {
    /// Sets the configuration of the underlying DQN.
    ///
    /// The critic loss of `dqn` is taken as is. The Huber loss set by
    /// [`Default`] is kept only when `dqn` carries it too.
    pub fn dqn(mut self, dqn: DqnConfig<C>) -> Self {
        self.dqn = dqn;
        self
    }

    /// Sets the length of windows.
    pub fn n_step(mut self, n_step: usize) -> Self {
        self.n_step = n_step;
        self
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self>
    where
        C: for<'de> Deserialize<'de>,
    {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::LinearQConfig;

    #[test]
    fn default_uses_huber_loss() {
        let config = MultistepDqnConfig::<LinearQConfig>::default();
        assert_eq!(config.dqn.critic_loss, CriticLoss::SmoothL1);
        assert_eq!(config.dqn.batch_size, DqnConfig::<LinearQConfig>::default().batch_size);
    }

    #[test]
    fn dqn_setter_keeps_the_given_loss() {
        let config = MultistepDqnConfig::<LinearQConfig>::default()
            .dqn(DqnConfig::<LinearQConfig>::default().batch_size(8));
        assert_eq!(config.dqn.critic_loss, CriticLoss::Mse);
        assert_eq!(config.dqn.batch_size, 8);
    }
}
