//! Optimizers.
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Zip};
use serde::{Deserialize, Serialize};

/// Configuration of optimizer for training models in an RL agent.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// Plain stochastic gradient descent.
    Sgd {
        /// Learning rate.
        lr: f32,
    },

    /// Stochastic gradient descent with momentum.
    Momentum {
        /// Learning rate.
        lr: f32,

        /// Decay of the velocity.
        #[serde(default = "default_momentum")]
        momentum: f32,
    },
}

fn default_momentum() -> f32 {
    0.9
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Momentum {
            lr: 1e-2,
            momentum: default_momentum(),
        }
    }
}

impl OptimizerConfig {
    /// Constructs the optimizer.
    pub fn build(&self) -> Optimizer {
        Optimizer {
            config: self.clone(),
            velocity: vec![],
        }
    }

    /// Override learning rate.
    pub fn learning_rate(self, lr: f32) -> Self {
        match self {
            Self::Sgd { .. } => Self::Sgd { lr },
            Self::Momentum { momentum, .. } => Self::Momentum { lr, momentum },
        }
    }

    fn lr(&self) -> f32 {
        match self {
            Self::Sgd { lr } => *lr,
            Self::Momentum { lr, .. } => *lr,
        }
    }
}

/// Optimizer state, one velocity per parameter group.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Optimizer {
    config: OptimizerConfig,
    velocity: Vec<ArrayD<f32>>,
}

impl Optimizer {
    /// Applies a gradient to the `ix`-th parameter group.
    pub fn step(&mut self, ix: usize, mut param: ArrayViewMutD<f32>, grad: ArrayViewD<f32>) {
        let lr = self.config.lr();
        match self.config {
            OptimizerConfig::Sgd { .. } => {
                Zip::from(&mut param).and(&grad).for_each(|p, g| *p -= lr * g);
            }
            OptimizerConfig::Momentum { momentum, .. } => {
                while self.velocity.len() <= ix {
                    self.velocity.push(ArrayD::zeros(grad.shape()));
                }
                let v = &mut self.velocity[ix];
                if v.shape() != grad.shape() {
                    *v = ArrayD::zeros(grad.shape());
                }
                Zip::from(&mut param)
                    .and(&mut *v)
                    .and(&grad)
                    .for_each(|p, v, g| {
                        *v = momentum * *v + g;
                        *p -= lr * *v;
                    });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn momentum_accumulates_velocity() {
        let mut opt = OptimizerConfig::Momentum {
            lr: 0.1,
            momentum: 0.5,
        }
        .build();
        let mut p = array![1.0f32, 2.0].into_dyn();
        let g = array![1.0f32, -1.0].into_dyn();

        opt.step(0, p.view_mut(), g.view());
        let v: Vec<f32> = p.iter().cloned().collect();
        assert!((v[0] - 0.9).abs() < 1e-6);
        opt.step(0, p.view_mut(), g.view());
        // v = 0.5 * 1 + 1 = 1.5
        let v: Vec<f32> = p.iter().cloned().collect();
        assert!((v[0] - 0.75).abs() < 1e-6);
        assert!((v[1] - 2.25).abs() < 1e-6);
    }
}
