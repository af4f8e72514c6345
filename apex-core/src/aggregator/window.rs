//! n-step windows.

/// A contiguous run of at most `n_step` transitions from one episode.
///
/// Only the first state and action are kept, together with every reward and done
/// flag in the run and the observation following the last transition, which is the
/// bootstrap state.
#[derive(Debug, Clone, PartialEq)]
pub struct Window<O, A> {
    /// State of the first transition.
    pub state: O,

    /// Action of the first transition.
    pub action: A,

    /// Rewards in emission order.
    pub rewards: Vec<f32>,

    /// Done flags in emission order.
    pub dones: Vec<bool>,

    /// Observation after the last transition.
    pub next_state: O,

    /// Length of a full window for the aggregator that produced this one.
    pub n_step: usize,
}

impl<O, A> Window<O, A> {
    /// Number of valid steps.
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    /// Returns `true` if the window holds no steps, which the aggregator never emits.
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    /// Returns `true` if the window was cut short by the end of an episode.
    pub fn is_truncated(&self) -> bool {
        self.len() < self.n_step
    }

    /// Returns `true` if the episode ended inside the window.
    pub fn is_terminated(&self) -> bool {
        self.dones.iter().any(|d| *d)
    }

    /// `sum_k gamma^k * r_k`, accumulated from the last reward backwards.
    ///
    /// A done flag at position `k` discards everything accumulated after it.
    pub fn discounted_reward(&self, gamma: f32) -> f32 {
        self.rewards
            .iter()
            .zip(self.dones.iter())
            .rev()
            .fold(0.0, |acc, (r, done)| {
                let future = if *done { 0.0 } else { acc };
                r + gamma * future
            })
    }

    /// Discount applied to the bootstrap value: `0` if the episode terminated inside
    /// the window, `gamma^len` otherwise.
    pub fn bootstrap_discount(&self, gamma: f32) -> f32 {
        if self.is_terminated() {
            0.0
        } else {
            gamma.powi(self.len() as i32)
        }
    }
}
