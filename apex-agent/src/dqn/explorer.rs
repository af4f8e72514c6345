//! Exploration strategies of DQN.
use crate::util::argmax;
use serde::{Deserialize, Serialize};

/// Explorers for DQN.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum DqnExplorer {
    /// Softmax action selection.
    Softmax(Softmax),

    /// Epsilon-greedy action selection.
    EpsilonGreedy(EpsilonGreedy),
}

impl DqnExplorer {
    /// Takes an action based on action values.
    pub fn action(&self, q: &[f32], rng: &fastrand::Rng) -> usize {
        match self {
            Self::Softmax(softmax) => softmax.action(q, rng),
            Self::EpsilonGreedy(egreedy) => egreedy.action(q, rng),
        }
    }

    /// Advances the decay schedule by `n_steps` environment steps.
    pub fn advance(&mut self, n_steps: usize) {
        if let Self::EpsilonGreedy(egreedy) = self {
            egreedy.n_steps += n_steps;
        }
    }

    /// Current exploration rate, `None` for softmax.
    pub fn epsilon(&self) -> Option<f32> {
        match self {
            Self::Softmax(_) => None,
            Self::EpsilonGreedy(egreedy) => Some(egreedy.eps()),
        }
    }
}

/// Softmax explorer for DQN.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct Softmax {}

#[allow(clippy::new_without_default)]
impl Softmax {
    /// Constructs softmax explorer.
    pub fn new() -> Self {
        Self {}
    }

    /// Samples an action with probabilities proportional to `exp(q)`.
    pub fn action(&self, q: &[f32], rng: &fastrand::Rng) -> usize {
        let q_max = q.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let ps: Vec<f32> = q.iter().map(|v| (v - q_max).exp()).collect();
        let mut u = rng.f32() * ps.iter().sum::<f32>();
        for (i, p) in ps.iter().enumerate() {
            if u < *p {
                return i;
            }
            u -= p;
        }
        q.len().saturating_sub(1)
    }
}

/// Epsilon-greedy explorer for DQN.
///
/// Epsilon decays linearly from `eps_start` to `eps_final` over `final_step`
/// environment steps counted by `n_steps`.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonGreedy {
    /// Environment steps elapsed in the schedule.
    pub n_steps: usize,

    /// Initial epsilon.
    pub eps_start: f32,

    /// Final epsilon.
    pub eps_final: f32,

    /// Steps when epsilon reaches `eps_final`.
    pub final_step: usize,
}

#[allow(clippy::new_without_default)]
impl EpsilonGreedy {
    /// Constructs epsilon-greedy explorer.
    pub fn new() -> Self {
        Self {
            n_steps: 0,
            eps_start: 1.0,
            eps_final: 0.1,
            final_step: 20_000,
        }
    }

    /// Constructs epsilon-greedy explorer decaying over `final_step` steps.
    pub fn with_final_step(final_step: usize) -> DqnExplorer {
        DqnExplorer::EpsilonGreedy(Self {
            final_step,
            ..Self::new()
        })
    }

    /// Constructs epsilon-greedy explorer with a fixed epsilon.
    pub fn constant(eps: f32) -> DqnExplorer {
        DqnExplorer::EpsilonGreedy(Self {
            n_steps: 0,
            eps_start: eps,
            eps_final: eps,
            final_step: 0,
        })
    }

    /// Current epsilon.
    pub fn eps(&self) -> f32 {
        if self.n_steps >= self.final_step {
            self.eps_final
        } else {
            let d = (self.eps_start - self.eps_final) / self.final_step as f32;
            (self.eps_start - d * self.n_steps as f32).max(self.eps_final)
        }
    }

    /// Takes a random action with probability epsilon, the greedy one otherwise.
    pub fn action(&self, q: &[f32], rng: &fastrand::Rng) -> usize {
        if rng.f32() < self.eps() {
            rng.usize(..q.len().max(1))
        } else {
            argmax(q)
        }
    }

    /// Set the epsilon value at the final step.
    pub fn eps_final(self, v: f32) -> Self {
        let mut s = self;
        s.eps_final = v;
        s
    }

    /// Set the epsilon value at the start.
    pub fn eps_start(self, v: f32) -> Self {
        let mut s = self;
        s.eps_start = v;
        s
    }
}

/// Exploration rate of actor `i` of `n_actors`, `base^(1 + i / (n_actors - 1) * alpha)`.
///
/// Actor 0 gets `base` and the last actor gets `base^(1 + alpha)`. A single actor keeps
/// `base`.
pub fn apex_epsilon(base: f32, alpha: f32, i: usize, n_actors: usize) -> f32 {
    if n_actors <= 1 {
        base
    } else {
        base.powf(1.0 + (i as f32 / (n_actors - 1) as f32) * alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epsilon_spread_over_sixteen_actors() {
        let eps: Vec<f32> = (0..16).map(|i| apex_epsilon(0.4, 0.7, i, 16)).collect();
        assert_eq!(eps[0], 0.4);
        assert!(eps[15] < eps[0]);
        assert!((eps[15] - 0.4f32.powf(1.7)).abs() < 1e-6);
        assert!(eps.windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn single_actor_keeps_base() {
        assert_eq!(apex_epsilon(0.4, 0.7, 0, 1), 0.4);
    }

    #[test]
    fn epsilon_decays_linearly() {
        let mut explorer = EpsilonGreedy::with_final_step(100);
        assert_eq!(explorer.epsilon(), Some(1.0));
        explorer.advance(50);
        assert!((explorer.epsilon().unwrap() - 0.55).abs() < 1e-6);
        explorer.advance(500);
        assert_eq!(explorer.epsilon(), Some(0.1));
    }

    #[test]
    fn greedy_with_zero_epsilon() {
        let explorer = EpsilonGreedy::constant(0.0);
        let rng = fastrand::Rng::with_seed(0);
        for _ in 0..20 {
            assert_eq!(explorer.action(&[0.0, 2.0, 1.0], &rng), 1);
        }
    }
}
