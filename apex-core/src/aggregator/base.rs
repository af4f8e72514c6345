//! Per-stream sliding windows.
use super::{AggregatorConfig, Window};
use crate::{Rollout, Transition};
use anyhow::Result;
use std::collections::{HashMap, VecDeque};

/// Folds transitions of several rollout streams into n-step [`Window`]s.
pub struct TransitionAggregator<O, A> {
    n_step: usize,
    fifos: HashMap<usize, VecDeque<Transition<O, A>>>,
}

impl<O: Clone, A: Clone> TransitionAggregator<O, A> {
    /// Builds an aggregator.
    pub fn build(config: &AggregatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            n_step: config.n_step,
            fifos: HashMap::new(),
        })
    }

    /// Length of full windows.
    pub fn n_step(&self) -> usize {
        self.n_step
    }

    /// Number of transitions waiting in the FIFO of the given stream.
    pub fn pending(&self, stream: usize) -> usize {
        self.fifos.get(&stream).map_or(0, |q| q.len())
    }

    /// Appends a transition to a stream and returns the windows it completes.
    pub fn push(&mut self, stream: usize, transition: Transition<O, A>) -> Vec<Window<O, A>> {
        let n_step = self.n_step;
        let fifo = self
            .fifos
            .entry(stream)
            .or_insert_with(|| VecDeque::with_capacity(n_step));
        let done = transition.done;
        fifo.push_back(transition);

        let mut windows = vec![];
        if done {
            while !fifo.is_empty() {
                windows.push(make_window(fifo, n_step));
                fifo.pop_front();
            }
        } else if fifo.len() == n_step {
            windows.push(make_window(fifo, n_step));
            fifo.pop_front();
        }
        windows
    }

    /// Feeds rollouts in the given order and returns the completed windows.
    pub fn process(&mut self, rollouts: Vec<Rollout<O, A>>) -> Vec<Window<O, A>> {
        let mut windows = vec![];
        for rollout in rollouts {
            let stream = rollout.stream;
            for tr in rollout.transitions {
                windows.extend(self.push(stream, tr));
            }
        }
        windows
    }

    /// Drops the pending transitions of every stream.
    pub fn clear(&mut self) {
        self.fifos.clear();
    }
}

fn make_window<O: Clone, A: Clone>(
    fifo: &VecDeque<Transition<O, A>>,
    n_step: usize,
) -> Window<O, A> {
    let first = &fifo[0];
    let last = &fifo[fifo.len() - 1];
    Window {
        state: first.state.clone(),
        action: first.action.clone(),
        rewards: fifo.iter().map(|t| t.reward).collect(),
        dones: fifo.iter().map(|t| t.done).collect(),
        next_state: last.next_state.clone(),
        n_step,
    }
}
