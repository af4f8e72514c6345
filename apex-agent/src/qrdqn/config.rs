//! Configuration of QR-DQN agent.
use crate::dqn::DqnConfig;
use anyhow::Result;
use apex_core::ApexError;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`QrDqn`](super::QrDqn).
///
/// The number of quantiles is a property of the model and is set in its configuration.
/// `dqn.critic_loss` is not used, quantiles are always fit with the quantile Huber loss.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct QrDqnConfig<C> {
    /// Model, batch, discount, exploration and target update settings.
    pub dqn: DqnConfig<C>,

    /// Length of windows.
    pub n_step: usize,

    /// Bound of the gradient norm.
    pub clip_grad_norm: Option<f32>,
}

impl<C: Default> Default for QrDqnConfig<C> {
    fn default() -> Self {
        Self {
            dqn: DqnConfig::default(),
            n_step: 1,
            clip_grad_norm: None,
        }
    }
}

impl<C: Serialize> QrDqnConfig<C> {
    /// Sets the configuration of the underlying DQN.
    pub fn dqn(mut self, dqn: DqnConfig<C>) -> Self {
        self.dqn = dqn;
        self
    }

    /// Sets the length of windows.
    pub fn n_step(mut self, n_step: usize) -> Self {
        self.n_step = n_step;
        self
    }

    /// Sets the bound of the gradient norm.
    pub fn clip_grad_norm(mut self, v: Option<f32>) -> Self {
        self.clip_grad_norm = v;
        self
    }

    pub(super) fn validate(&self) -> Result<(), ApexError> {
        match self.clip_grad_norm {
            Some(v) if !(v > 0.0) => Err(ApexError::InvalidConfig(format!(
                "clip_grad_norm must be positive, got {}",
                v
            ))),
            _ => Ok(()),
        }
    }

    /// Loads [`QrDqnConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self>
    where
        C: for<'de> Deserialize<'de>,
    {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of QR-DQN agent from {:?}", path_);
        Ok(b)
    }

    /// Saves [`QrDqnConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of QR-DQN agent into {:?}", path_);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::LinearQuantileConfig;
    use tempdir::TempDir;

    #[test]
    fn yaml_round_trip() -> Result<()> {
        let config = QrDqnConfig::<LinearQuantileConfig>::default()
            .n_step(3)
            .clip_grad_norm(Some(10.0))
            .dqn(DqnConfig::default().model_config(LinearQuantileConfig::new(4, 2).n_quantiles(8)));
        let dir = TempDir::new("qrdqn_config")?;
        let path = dir.path().join("qrdqn.yaml");
        config.save(&path)?;
        assert_eq!(QrDqnConfig::<LinearQuantileConfig>::load(&path)?, config);
        Ok(())
    }
}
