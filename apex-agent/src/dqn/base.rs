//! One-step DQN with uniform replay.
use super::{DqnConfig, DqnCore};
use crate::model::QModel;
use anyhow::Result;
use apex_core::{
    record::{Record, RecordValue},
    Agent, ApexError, Configurable, DiscreteAct, Env, Policy, Rollout, WeightSnapshot,
};
use std::path::Path;

/// DQN agent.
///
/// Learns from 1-step windows sampled uniformly, bootstrapping with the maximum of the
/// target model. Epsilon decays with environment steps once the first optimization
/// step has happened.
pub struct Dqn<E, Q>
where
    E: Env,
    Q: QModel,
{
    pub(crate) core: DqnCore<E, Q>,
}

impl<E, Q> Dqn<E, Q>
where
    E: Env,
    E::Act: DiscreteAct,
    Q: QModel,
{
    /// Builds the agent with windows of `n_step` transitions.
    pub(crate) fn build_with_n_step(config: DqnConfig<Q::Config>, n_step: usize) -> Result<Self> {
        let replay_buffer_config = config.replay_buffer_config.clone().per_config(None);
        Ok(Self {
            core: DqnCore::build(&config, n_step, &replay_buffer_config)?,
        })
    }

    /// Shared learner state.
    pub fn core(&self) -> &DqnCore<E, Q> {
        &self.core
    }

    fn learn_(&mut self) -> Result<Option<Record>> {
        let batch = match self.core.buffer.batch(self.core.batch_size, 0.0) {
            Ok(batch) => batch,
            Err(ApexError::InsufficientData { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let loss = self.core.critic_loss;
        let stat = self
            .core
            .learn_windows(&batch.windows, &batch.weights, false, loss, None)?;

        let mut record = Record::from_slice(&[
            ("loss", RecordValue::Scalar(stat.opt.loss)),
            ("max_q", RecordValue::Scalar(stat.max_q)),
        ]);
        if let Some(eps) = self.core.epsilon() {
            record.insert("epsilon", RecordValue::Scalar(eps));
        }
        Ok(Some(record))
    }
}

impl<E, Q> Configurable for Dqn<E, Q>
where
    E: Env,
    E::Act: DiscreteAct,
    Q: QModel,
{
    type Config = DqnConfig<Q::Config>;

    /// Constructs DQN agent.
    fn build(config: Self::Config) -> Result<Self> {
        Self::build_with_n_step(config, 1)
    }
}

impl<E, Q> Policy<E> for Dqn<E, Q>
where
    E: Env,
    E::Act: DiscreteAct,
    Q: QModel,
{
    fn act(&mut self, obs: &E::Obs) -> E::Act {
        self.core.act(obs)
    }
}

impl<E, Q> Agent<E> for Dqn<E, Q>
where
    E: Env,
    E::Act: DiscreteAct,
    Q: QModel,
{
    fn train(&mut self) {
        self.core.train = true;
    }

    fn eval(&mut self) {
        self.core.train = false;
    }

    fn is_train(&self) -> bool {
        self.core.train
    }

    fn set_distributed(&mut self, id: usize, n_actors: usize) {
        self.core.actor = Some((id, n_actors));
    }

    fn process_step(
        &mut self,
        rollouts: Vec<Rollout<E::Obs, E::Act>>,
        env_step: usize,
    ) -> Result<Record> {
        let delta_t = self.core.ingest(rollouts, env_step);
        let mut record = Record::empty();

        if self.core.can_learn() {
            if let Some(r) = self.learn_()? {
                record.merge_inplace(r);
            }
        }

        if self.core.n_learn > 0 {
            self.core.explorer.advance(delta_t);
            self.core.maybe_update_target()?;
        }

        Ok(record)
    }

    fn learn(&mut self) -> Result<Option<Record>> {
        self.learn_()
    }

    fn sync_out(&self) -> WeightSnapshot {
        self.core.sync_out()
    }

    fn sync_in(&mut self, snapshot: &WeightSnapshot) -> Result<()> {
        self.core.sync_in(snapshot)
    }

    fn save(&self, path: &Path) -> Result<()> {
        self.core.save(path)
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        self.core.load(path)
    }
}
