use anyhow::Result;
use apex_core::ApexError;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
    time::Duration,
};

/// Configuration of [`ActorPool`](super::ActorPool).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActorPoolConfig {
    /// Number of actors.
    pub n_actors: usize,

    /// Time an actor has to answer a request before it is excluded.
    pub actor_timeout_ms: u64,

    /// Environment seed of actor `i` is `seed + i`.
    pub seed: i64,
}

impl Default for ActorPoolConfig {
    fn default() -> Self {
        Self {
            n_actors: 4,
            actor_timeout_ms: 10_000,
            seed: 42,
        }
    }
}

impl ActorPoolConfig {
    /// Sets the number of actors.
    pub fn n_actors(mut self, n_actors: usize) -> Self {
        self.n_actors = n_actors;
        self
    }

    /// Sets the response timeout of actors.
    pub fn actor_timeout_ms(mut self, actor_timeout_ms: u64) -> Self {
        self.actor_timeout_ms = actor_timeout_ms;
        self
    }

    /// Sets the base environment seed.
    pub fn seed(mut self, seed: i64) -> Self {
        self.seed = seed;
        self
    }

    pub(super) fn actor_timeout(&self) -> Duration {
        Duration::from_millis(self.actor_timeout_ms)
    }

    pub(super) fn validate(&self) -> Result<(), ApexError> {
        if self.n_actors == 0 {
            return Err(ApexError::InvalidConfig(
                "n_actors must be positive".to_string(),
            ));
        }
        if self.actor_timeout_ms == 0 {
            return Err(ApexError::InvalidConfig(
                "actor_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Constructs [`ActorPoolConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of actor pool from {}", path_.to_str().unwrap_or("?"));
        Ok(b)
    }

    /// Saves [`ActorPoolConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of actor pool into {}", path_.to_str().unwrap_or("?"));
        Ok(())
    }
}
