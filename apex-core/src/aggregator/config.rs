//! Configuration of [`TransitionAggregator`](super::TransitionAggregator).
use crate::error::ApexError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`TransitionAggregator`](super::TransitionAggregator).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct AggregatorConfig {
    /// Length of full windows. `1` gives one-step transitions.
    pub n_step: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self { n_step: 1 }
    }
}

impl AggregatorConfig {
    /// Sets the window length.
    pub fn n_step(mut self, n_step: usize) -> Self {
        self.n_step = n_step;
        self
    }

    pub(super) fn validate(&self) -> Result<(), ApexError> {
        if self.n_step == 0 {
            return Err(ApexError::InvalidConfig(
                "n_step must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
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
