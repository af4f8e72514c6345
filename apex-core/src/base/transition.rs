//! Transitions produced by actors.
use super::{Act, Obs};

/// A single environment interaction `(s, a, r, s', done)`.
///
/// `step_delta` is the number of environment steps the transition accounts for,
/// normally 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<O, A> {
    /// Observation before the action.
    pub state: O,

    /// Action.
    pub action: A,

    /// Reward.
    pub reward: f32,

    /// Observation after the action.
    pub next_state: O,

    /// Whether the episode ended with this transition.
    pub done: bool,

    /// Number of environment steps this transition accounts for.
    pub step_delta: usize,
}

impl<O: Obs, A: Act> Transition<O, A> {
    /// Constructs a transition accounting for one environment step.
    pub fn new(state: O, action: A, reward: f32, next_state: O, done: bool) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            done,
            step_delta: 1,
        }
    }
}

/// Transitions collected by one actor in one run round, in emission order.
///
/// `stream` identifies the source of the transitions; windows never span two streams.
#[derive(Debug, Clone)]
pub struct Rollout<O, A> {
    /// Identifier of the producing actor.
    pub stream: usize,

    /// Transitions in emission order.
    pub transitions: Vec<Transition<O, A>>,
}

impl<O, A> Rollout<O, A> {
    /// Constructs a rollout.
    pub fn new(stream: usize, transitions: Vec<Transition<O, A>>) -> Self {
        Self {
            stream,
            transitions,
        }
    }

    /// Number of environment steps in the rollout.
    pub fn env_steps(&self) -> usize {
        self.transitions.iter().map(|t| t.step_delta).sum()
    }
}
