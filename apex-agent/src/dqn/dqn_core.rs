//! State shared by the DQN family of agents.
use super::{DqnConfig, DqnExplorer};
use crate::{
    model::{OptStat, QModel},
    util::{argmax, CriticLoss},
};
use anyhow::Result;
use apex_core::{
    aggregator::{AggregatorConfig, TransitionAggregator, Window},
    replay_buffer::{ReplayBuffer, ReplayBufferConfig},
    DiscreteAct, Env, Obs, Rollout, WeightSnapshot,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, Write},
    marker::PhantomData,
    path::Path,
};

/// Counters persisted with a checkpoint in `agent.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub(crate) struct AgentState {
    pub n_learn: usize,
    pub time_t: usize,
    pub target_update_stamp: usize,
    pub n_stale_priority_updates: usize,
    pub explorer: DqnExplorer,
}

/// Result of one optimization step on a batch of windows.
pub(crate) struct LearnStat {
    pub opt: OptStat,
    pub max_q: f32,
    pub td_errors: Vec<f32>,
}

/// Online and target models, replay and the step counters of the learner.
///
/// The learner state machine runs over environment steps: [`DqnCore::ingest`] moves
/// the clock to the global step reported by the coordinator and stores the windows
/// completed by the new transitions. The agents decide when to learn, and
/// [`DqnCore::maybe_update_target`] hard-copies the online model into the target model
/// once `target_update_period` steps have elapsed since the last copy and at least one
/// optimization step happened.
pub struct DqnCore<E, Q>
where
    E: Env,
    Q: QModel,
{
    pub(crate) qnet: Q,
    pub(crate) qnet_tgt: Q,
    pub(crate) gamma: f32,
    pub(crate) batch_size: usize,
    pub(crate) start_train_step: usize,
    pub(crate) target_update_period: usize,
    pub(crate) target_update_stamp: usize,
    pub(crate) time_t: usize,
    pub(crate) n_learn: usize,
    pub(crate) n_stale_priority_updates: usize,
    pub(crate) critic_loss: CriticLoss,
    pub(crate) explorer: DqnExplorer,
    pub(crate) train: bool,

    /// Set when this instance acts for the coordinator.
    pub(crate) actor: Option<(usize, usize)>,

    /// Version of the last snapshot loaded with [`DqnCore::sync_in`].
    pub(crate) synced_version: usize,

    pub(crate) rng: fastrand::Rng,
    pub(crate) aggregator: TransitionAggregator<E::Obs, E::Act>,
    pub(crate) buffer: ReplayBuffer<E::Obs, E::Act>,
    phantom: PhantomData<E>,
}

impl<E, Q> DqnCore<E, Q>
where
    E: Env,
    E::Obs: Obs,
    E::Act: DiscreteAct,
    Q: QModel,
{
    /// Builds the core with windows of `n_step` transitions.
    pub fn build(
        config: &DqnConfig<Q::Config>,
        n_step: usize,
        replay_buffer_config: &ReplayBufferConfig,
    ) -> Result<Self> {
        config.validate()?;
        let qnet = Q::build(config.model_config.clone(), config.seed)?;
        let mut qnet_tgt = Q::build(config.model_config.clone(), config.seed)?;
        qnet_tgt.load_parameters(&qnet.parameters())?;

        Ok(Self {
            qnet,
            qnet_tgt,
            gamma: config.gamma,
            batch_size: config.batch_size,
            start_train_step: config.start_train_step,
            target_update_period: config.target_update_period,
            target_update_stamp: 0,
            time_t: 0,
            n_learn: 0,
            n_stale_priority_updates: 0,
            critic_loss: config.critic_loss,
            explorer: config.explorer.clone(),
            train: config.train,
            actor: None,
            synced_version: 0,
            rng: fastrand::Rng::with_seed(config.seed),
            aggregator: TransitionAggregator::build(&AggregatorConfig::default().n_step(n_step))?,
            buffer: ReplayBuffer::build(replay_buffer_config)?,
            phantom: PhantomData,
        })
    }

    /// Number of optimization steps so far.
    pub fn n_learn(&self) -> usize {
        self.n_learn
    }

    /// Number of priority updates dropped because the slot was overwritten.
    pub fn n_stale_priority_updates(&self) -> usize {
        self.n_stale_priority_updates
    }

    /// Global environment step seen by the learner.
    pub fn time_t(&self) -> usize {
        self.time_t
    }

    /// The replay buffer.
    pub fn buffer(&self) -> &ReplayBuffer<E::Obs, E::Act> {
        &self.buffer
    }

    /// The replay buffer, for restoring its contents.
    pub fn buffer_mut(&mut self) -> &mut ReplayBuffer<E::Obs, E::Act> {
        &mut self.buffer
    }

    /// The online model.
    pub fn qnet(&self) -> &Q {
        &self.qnet
    }

    /// The target model.
    pub fn qnet_tgt(&self) -> &Q {
        &self.qnet_tgt
    }

    /// Current exploration rate.
    pub fn epsilon(&self) -> Option<f32> {
        self.explorer.epsilon()
    }

    /// Selects an action for an observation.
    ///
    /// In training mode the explorer picks the action. Actors for which the learner
    /// has already performed an optimization step advance the exploration schedule by
    /// one step per action. In evaluation mode the greedy action is taken.
    pub fn act(&mut self, obs: &E::Obs) -> E::Act {
        let q = self.qnet.forward(obs.features());
        let a = if self.train {
            if self.actor.is_some() && self.synced_version > 0 {
                self.explorer.advance(1);
            }
            self.explorer.action(&q, &self.rng)
        } else {
            argmax(&q)
        };
        E::Act::from_index(a)
    }

    /// Moves the clock to `env_step` and stores the windows completed by `rollouts`.
    ///
    /// Returns the number of environment steps elapsed since the previous call.
    pub fn ingest(&mut self, rollouts: Vec<Rollout<E::Obs, E::Act>>, env_step: usize) -> usize {
        let delta_t = env_step.saturating_sub(self.time_t);
        for window in self.aggregator.process(rollouts) {
            self.buffer.store(window);
        }
        self.time_t = self.time_t.max(env_step);
        self.target_update_stamp += delta_t;
        delta_t
    }

    /// Whether the buffer is warm and the warmup period has elapsed.
    pub fn can_learn(&self) -> bool {
        self.buffer.len() > self.batch_size && self.time_t >= self.start_train_step
    }

    /// Hard-copies the online parameters into the target model if it is due.
    pub fn maybe_update_target(&mut self) -> Result<bool> {
        if self.n_learn > 0 && self.target_update_stamp >= self.target_update_period {
            self.update_target()?;
            self.target_update_stamp = 0;
            debug!("Updated target network at step {}", self.time_t);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Hard-copies the online parameters into the target model.
    pub fn update_target(&mut self) -> Result<()> {
        self.qnet_tgt.load_parameters(&self.qnet.parameters())
    }

    /// Bootstrapped n-step targets of windows.
    ///
    /// With `double_q`, the bootstrap action is the greedy action of the online model
    /// and its value is taken from the target model. Otherwise the target model's
    /// maximum is used. Windows that end their episode use the reward sum alone.
    pub(crate) fn targets(&self, windows: &[Window<E::Obs, E::Act>], double_q: bool) -> Vec<f32> {
        windows
            .iter()
            .map(|w| {
                let discount = w.bootstrap_discount(self.gamma);
                let bootstrap = if discount == 0.0 {
                    0.0
                } else {
                    let next = w.next_state.features();
                    let q_tgt = self.qnet_tgt.forward(next);
                    if double_q {
                        q_tgt[argmax(&self.qnet.forward(next))]
                    } else {
                        q_tgt.iter().cloned().fold(f32::NEG_INFINITY, f32::max)
                    }
                };
                w.discounted_reward(self.gamma) + discount * bootstrap
            })
            .collect()
    }

    /// Performs one gradient step on the windows and returns the pre-update TD errors.
    pub(crate) fn learn_windows(
        &mut self,
        windows: &[Window<E::Obs, E::Act>],
        weights: &[f32],
        double_q: bool,
        loss: CriticLoss,
        clip_grad_norm: Option<f32>,
    ) -> Result<LearnStat> {
        let targets = self.targets(windows, double_q);
        let obs: Vec<&[f32]> = windows.iter().map(|w| w.state.features()).collect();
        let acts: Vec<usize> = windows.iter().map(|w| w.action.index()).collect();
        let preds: Vec<f32> = obs
            .iter()
            .zip(acts.iter())
            .map(|(x, a)| self.qnet.forward(x)[*a])
            .collect();
        let max_q = preds.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let td_errors = targets
            .iter()
            .zip(preds.iter())
            .map(|(t, p)| (t - p).abs())
            .collect();

        let opt = self
            .qnet
            .backward_step(&obs, &acts, &targets, weights, loss, clip_grad_norm)?;
        self.n_learn += 1;

        Ok(LearnStat {
            opt,
            max_q,
            td_errors,
        })
    }

    /// Snapshot of the online parameters, versioned by the optimization step count.
    pub fn sync_out(&self) -> WeightSnapshot {
        WeightSnapshot::new(self.n_learn, self.qnet.parameters())
    }

    /// Replaces the online parameters with a snapshot.
    pub fn sync_in(&mut self, snapshot: &WeightSnapshot) -> Result<()> {
        self.qnet.load_parameters(&snapshot.params)?;
        self.synced_version = snapshot.version;
        Ok(())
    }

    pub(crate) fn state(&self) -> AgentState {
        AgentState {
            n_learn: self.n_learn,
            time_t: self.time_t,
            target_update_stamp: self.target_update_stamp,
            n_stale_priority_updates: self.n_stale_priority_updates,
            explorer: self.explorer.clone(),
        }
    }

    /// Saves models and counters in the given directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.qnet.save(&path.join("qnet.bin"))?;
        self.qnet_tgt.save(&path.join("qnet_tgt.bin"))?;
        let mut file = File::create(path.join("agent.yaml"))?;
        file.write_all(serde_yaml::to_string(&self.state())?.as_bytes())?;
        info!("Saved agent in {:?}", path);
        Ok(())
    }

    /// Loads models and counters from the given directory.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        self.qnet.load(&path.join("qnet.bin"))?;
        self.qnet_tgt.load(&path.join("qnet_tgt.bin"))?;
        let rdr = BufReader::new(File::open(path.join("agent.yaml"))?);
        let state: AgentState = serde_yaml::from_reader(rdr)?;
        self.n_learn = state.n_learn;
        self.time_t = state.time_t;
        self.target_update_stamp = state.target_update_stamp;
        self.n_stale_priority_updates = state.n_stale_priority_updates;
        self.explorer = state.explorer;
        info!("Loaded agent from {:?}", path);
        Ok(())
    }
}
