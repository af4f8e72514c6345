use super::MultistepDqnConfig;
use crate::{dqn::Dqn, model::QModel};
use anyhow::Result;
use apex_core::{
    record::Record, Agent, Configurable, DiscreteAct, Env, Policy, Rollout, WeightSnapshot,
};
use std::path::Path;

/// DQN learning from n-step windows.
///
/// Delegates to a [`Dqn`] whose aggregator emits windows of `n_step` transitions, so
/// targets sum up to `n_step` discounted rewards before bootstrapping with the maximum
/// of the target model.
pub struct MultistepDqn<E, Q>
where
    E: Env,
    Q: QModel,
{
    dqn: Dqn<E, Q>,
    n_step: usize,
}

impl<E, Q> MultistepDqn<E, Q>
where
    E: Env,
    E::Act: DiscreteAct,
    Q: QModel,
{
    /// Length of windows.
    pub fn n_step(&self) -> usize {
        self.n_step
    }

    /// The underlying DQN.
    pub fn dqn(&self) -> &Dqn<E, Q> {
        &self.dqn
    }
}

impl<E, Q> Configurable for MultistepDqn<E, Q>
where
    E: Env,
    E::Act: DiscreteAct,
    Q: QModel,
{
    type Config = MultistepDqnConfig<Q::Config>;

    fn build(config: Self::Config) -> Result<Self> {
        Ok(Self {
            dqn: Dqn::build_with_n_step(config.dqn, config.n_step)?,
            n_step: config.n_step,
        })
    }
}

impl<E, Q> Policy<E> for MultistepDqn<E, Q>
where
    E: Env,
    E::Act: DiscreteAct,
    Q: QModel,
{
    fn act(&mut self, obs: &E::Obs) -> E::Act {
        self.dqn.act(obs)
    }
}

impl<E, Q> Agent<E> for MultistepDqn<E, Q>
where
    E: Env,
    E::Act: DiscreteAct,
    Q: QModel,
{
    fn train(&mut self) {
        self.dqn.train()
    }

    fn eval(&mut self) {
        self.dqn.eval()
    }

    fn is_train(&self) -> bool {
        self.dqn.is_train()
    }

    fn set_distributed(&mut self, id: usize, n_actors: usize) {
        self.dqn.set_distributed(id, n_actors)
    }

    fn process_step(
        &mut self,
        rollouts: Vec<Rollout<E::Obs, E::Act>>,
        env_step: usize,
    ) -> Result<Record> {
        self.dqn.process_step(rollouts, env_step)
    }

    fn learn(&mut self) -> Result<Option<Record>> {
        self.dqn.learn()
    }

    fn sync_out(&self) -> WeightSnapshot {
        self.dqn.sync_out()
    }

    fn sync_in(&mut self, snapshot: &WeightSnapshot) -> Result<()> {
        self.dqn.sync_in(snapshot)
    }

    fn save(&self, path: &Path) -> Result<()> {
        self.dqn.save(path)
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        self.dqn.load(path)
    }
}
