//! Scheduling the exponent of importance weight for PER.
use super::PerConfig;
use serde::{Deserialize, Serialize};

/// Scheduler of the exponent of importance weight for PER.
///
/// Beta grows linearly with the number of environment steps, reaching its final
/// value after `explore_step` steps regardless of how often the learner runs.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct IwScheduler {
    /// Initial value of $\beta$.
    pub beta_0: f32,

    /// Final value of $\beta$.
    pub beta_final: f32,

    /// Environment steps when beta reaches its final value.
    pub explore_step: usize,
}

impl IwScheduler {
    /// Creates a scheduler.
    pub fn new(beta_0: f32, beta_final: f32, explore_step: usize) -> Self {
        Self {
            beta_0,
            beta_final,
            explore_step,
        }
    }

    /// Gets the exponent of importance sampling weight at the given environment step.
    pub fn beta(&self, env_step: usize) -> f32 {
        if env_step >= self.explore_step {
            self.beta_final
        } else {
            let d = self.beta_final - self.beta_0;
            self.beta_0 + d * (env_step as f32 / self.explore_step as f32)
        }
    }
}

impl From<&PerConfig> for IwScheduler {
    fn from(config: &PerConfig) -> Self {
        Self::new(config.beta_0, config.beta_final, config.explore_step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beta_ramps_then_stays() {
        let s = IwScheduler::new(0.4, 1.0, 100);
        assert_eq!(s.beta(0), 0.4);
        assert!((s.beta(50) - 0.7).abs() < 1e-6);
        assert_eq!(s.beta(100), 1.0);
        assert_eq!(s.beta(1_000), 1.0);
    }

    #[test]
    fn zero_horizon_is_final() {
        let s = IwScheduler::new(0.4, 1.0, 0);
        assert_eq!(s.beta(0), 1.0);
    }
}
