use anyhow::Result;
use apex_core::ApexError;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`ApexTrainer`](crate::ApexTrainer).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ApexTrainerConfig {
    /// Training ends once this many environment steps were taken over all actors.
    pub max_steps: usize,

    /// Environment steps each actor takes in a round.
    pub run_steps: usize,

    /// Rounds between weight broadcasts to actors.
    pub update_period: usize,

    /// Rounds between flushes of the recorder.
    pub record_interval: usize,

    /// Rounds between checkpoints.
    pub save_interval: usize,

    /// Where to save checkpoints.
    pub model_dir: Option<String>,
}

impl Default for ApexTrainerConfig {
    fn default() -> Self {
        Self {
            max_steps: 100_000,
            run_steps: 4,
            update_period: 4,
            record_interval: 100,
            save_interval: 10_000,
            model_dir: None,
        }
    }
}

impl ApexTrainerConfig {
    /// Sets the total number of environment steps.
    pub fn max_steps(mut self, v: usize) -> Self {
        self.max_steps = v;
        self
    }

    /// Sets the number of steps per actor in a round.
    pub fn run_steps(mut self, v: usize) -> Self {
        self.run_steps = v;
        self
    }

    /// Sets the number of rounds between weight broadcasts.
    pub fn update_period(mut self, v: usize) -> Self {
        self.update_period = v;
        self
    }

    /// Sets the number of rounds between flushes of the recorder.
    pub fn record_interval(mut self, v: usize) -> Self {
        self.record_interval = v;
        self
    }

    /// Sets the number of rounds between checkpoints.
    pub fn save_interval(mut self, v: usize) -> Self {
        self.save_interval = v;
        self
    }

    /// Sets the directory the checkpoints are saved in.
    pub fn model_dir<T: Into<String>>(mut self, model_dir: T) -> Self {
        self.model_dir = Some(model_dir.into());
        self
    }

    pub(super) fn validate(&self) -> Result<(), ApexError> {
        for (name, v) in [
            ("run_steps", self.run_steps),
            ("update_period", self.update_period),
            ("record_interval", self.record_interval),
            ("save_interval", self.save_interval),
        ] {
            if v == 0 {
                return Err(ApexError::InvalidConfig(format!("{} must be positive", name)));
            }
        }
        Ok(())
    }

    /// Constructs [`ApexTrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of trainer from {}", path_.to_str().unwrap_or("?"));
        Ok(b)
    }

    /// Saves [`ApexTrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of trainer into {}", path_.to_str().unwrap_or("?"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn yaml_round_trip() -> Result<()> {
        let config = ApexTrainerConfig::default()
            .max_steps(1000)
            .run_steps(8)
            .model_dir("model");
        let dir = TempDir::new("apex_trainer_config")?;
        let path = dir.path().join("trainer.yaml");
        config.save(&path)?;
        assert_eq!(ApexTrainerConfig::load(&path)?, config);
        Ok(())
    }

    #[test]
    fn zero_periods_are_rejected() {
        assert!(ApexTrainerConfig::default().validate().is_ok());
        assert!(ApexTrainerConfig::default().run_steps(0).validate().is_err());
        assert!(ApexTrainerConfig::default()
            .update_period(0)
            .validate()
            .is_err());
    }
}
