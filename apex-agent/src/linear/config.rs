use crate::opt::OptimizerConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`LinearQ`](super::LinearQ).
pub struct LinearQConfig {
    pub(super) in_dim: usize,
    pub(super) out_dim: usize,
    pub(super) init_scale: f32,
    pub(super) opt_config: OptimizerConfig,
}

impl Default for LinearQConfig {
    fn default() -> Self {
        Self {
            in_dim: 4,
            out_dim: 2,
            init_scale: 0.01,
            opt_config: OptimizerConfig::default(),
        }
    }
}

impl LinearQConfig {
    /// Creates configuration of a linear model from `in_dim` features to `out_dim` actions.
    pub fn new(in_dim: usize, out_dim: usize) -> Self {
        Self {
            in_dim,
            out_dim,
            ..Self::default()
        }
    }

    /// Sets the half-width of the uniform distribution weights are drawn from.
    pub fn init_scale(mut self, init_scale: f32) -> Self {
        self.init_scale = init_scale;
        self
    }

    /// Sets the optimizer.
    pub fn opt_config(mut self, opt_config: OptimizerConfig) -> Self {
        self.opt_config = opt_config;
        self
    }

    /// Overrides the learning rate of the optimizer.
    pub fn learning_rate(mut self, lr: f32) -> Self {
        self.opt_config = self.opt_config.learning_rate(lr);
        self
    }
}
