//! Small environments used in tests.
use crate::{ActionMode, Env, Step};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::{thread, time::Duration};

/// Configuration of [`ScriptedEnv`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ScriptedEnvConfig {
    /// Dimension of observations.
    pub obs_dim: usize,

    /// Number of discrete actions.
    pub n_actions: usize,

    /// Number of steps in an episode.
    pub episode_len: usize,

    /// Seed of the instance that fails, all instances fail if `None`.
    pub faulty_seed: Option<i64>,

    /// Total step count at which the faulty instance returns an error.
    pub fail_at_step: Option<usize>,

    /// Seed of the instance that sleeps on every step.
    pub slow_seed: Option<i64>,

    /// Sleep of the slow instance on every step.
    pub step_delay_ms: u64,
}

impl Default for ScriptedEnvConfig {
    fn default() -> Self {
        Self {
            obs_dim: 4,
            n_actions: 2,
            episode_len: 10,
            faulty_seed: None,
            fail_at_step: None,
            slow_seed: None,
            step_delay_ms: 0,
        }
    }
}

impl ScriptedEnvConfig {
    /// Sets the number of steps in an episode.
    pub fn episode_len(mut self, episode_len: usize) -> Self {
        self.episode_len = episode_len;
        self
    }

    /// Sets the dimension of observations.
    pub fn obs_dim(mut self, obs_dim: usize) -> Self {
        self.obs_dim = obs_dim;
        self
    }

    /// Sets the number of actions.
    pub fn n_actions(mut self, n_actions: usize) -> Self {
        self.n_actions = n_actions;
        self
    }

    /// Makes the instance built with `seed` fail at the given total step.
    pub fn fail(mut self, seed: Option<i64>, at_step: usize) -> Self {
        self.faulty_seed = seed;
        self.fail_at_step = Some(at_step);
        self
    }

    /// Makes the instance built with `seed` sleep on every step.
    pub fn slow(mut self, seed: i64, step_delay_ms: u64) -> Self {
        self.slow_seed = Some(seed);
        self.step_delay_ms = step_delay_ms;
        self
    }
}

/// Episodes of fixed length with unit rewards.
///
/// The observation encodes the seed and the position in the episode, so transitions
/// from different instances can be told apart.
pub struct ScriptedEnv {
    config: ScriptedEnvConfig,
    seed: i64,
    t: usize,
    total_steps: usize,
    score: f32,
}

impl ScriptedEnv {
    fn obs(&self) -> Vec<f32> {
        let mut obs = vec![0f32; self.config.obs_dim];
        if let Some(x) = obs.get_mut(0) {
            *x = self.seed as f32;
        }
        if let Some(x) = obs.get_mut(1) {
            *x = self.t as f32 / self.config.episode_len as f32;
        }
        obs
    }

    fn is_faulty(&self) -> bool {
        match self.config.faulty_seed {
            Some(seed) => seed == self.seed,
            None => true,
        }
    }
}

impl Env for ScriptedEnv {
    type Config = ScriptedEnvConfig;
    type Obs = Vec<f32>;
    type Act = usize;

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        if config.episode_len == 0 {
            bail!("episode_len must be positive");
        }
        Ok(Self {
            config: config.clone(),
            seed,
            t: 0,
            total_steps: 0,
            score: 0.0,
        })
    }

    fn reset(&mut self) -> Result<Self::Obs> {
        self.t = 0;
        self.score = 0.0;
        Ok(self.obs())
    }

    fn step(&mut self, a: &Self::Act) -> Result<Step<Self>> {
        if self.config.slow_seed == Some(self.seed) {
            thread::sleep(Duration::from_millis(self.config.step_delay_ms));
        }
        if let Some(at) = self.config.fail_at_step {
            if self.is_faulty() && self.total_steps >= at {
                bail!("scripted failure of env {} at step {}", self.seed, at);
            }
        }
        if *a >= self.config.n_actions {
            bail!("action {} out of range", a);
        }

        self.t += 1;
        self.total_steps += 1;
        self.score += 1.0;
        let is_done = self.t >= self.config.episode_len;
        Ok(Step::new(self.obs(), *a, 1.0, is_done))
    }

    fn mode(&self) -> ActionMode {
        ActionMode::Discrete(self.config.n_actions)
    }

    fn score(&self) -> f32 {
        self.score
    }
}

/// Configuration of [`ChainEnv`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ChainEnvConfig {
    /// Number of states.
    pub n_states: usize,

    /// Maximum number of steps in an episode.
    pub max_steps: usize,
}

impl Default for ChainEnvConfig {
    fn default() -> Self {
        Self {
            n_states: 5,
            max_steps: 20,
        }
    }
}

/// A chain of states with one-hot observations.
///
/// Action 1 moves right and action 0 moves left. Reaching the right end pays 1 and
/// ends the episode. Every other step pays 0.
pub struct ChainEnv {
    config: ChainEnvConfig,
    state: usize,
    t: usize,
    score: f32,
}

impl ChainEnv {
    fn obs(&self) -> Vec<f32> {
        let mut obs = vec![0f32; self.config.n_states];
        obs[self.state] = 1.0;
        obs
    }
}

impl Env for ChainEnv {
    type Config = ChainEnvConfig;
    type Obs = Vec<f32>;
    type Act = usize;

    fn build(config: &Self::Config, _seed: i64) -> Result<Self> {
        if config.n_states < 2 {
            bail!("n_states must be at least 2");
        }
        Ok(Self {
            config: config.clone(),
            state: 0,
            t: 0,
            score: 0.0,
        })
    }

    fn reset(&mut self) -> Result<Self::Obs> {
        self.state = 0;
        self.t = 0;
        self.score = 0.0;
        Ok(self.obs())
    }

    fn step(&mut self, a: &Self::Act) -> Result<Step<Self>> {
        match a {
            0 => self.state = self.state.saturating_sub(1),
            1 => self.state = (self.state + 1).min(self.config.n_states - 1),
            _ => bail!("action {} out of range", a),
        }
        self.t += 1;
        let goal = self.state == self.config.n_states - 1;
        let reward = if goal { 1.0 } else { 0.0 };
        self.score += reward;
        let is_done = goal || self.t >= self.config.max_steps;
        Ok(Step::new(self.obs(), *a, reward, is_done))
    }

    fn mode(&self) -> ActionMode {
        ActionMode::Discrete(2)
    }

    fn score(&self) -> f32 {
        self.score
    }
}
