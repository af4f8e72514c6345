//! Ape-X agent.
use super::ApexConfig;
use crate::{
    dqn::{apex_epsilon, DqnCore, EpsilonGreedy},
    model::QModel,
    util::CriticLoss,
};
use anyhow::Result;
use apex_core::{
    record::{Record, RecordValue},
    replay_buffer::SlotIndex,
    Agent, ApexError, Configurable, DiscreteAct, Env, Policy, Rollout, WeightSnapshot,
};
use log::{debug, info};
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

/// Ape-X agent.
///
/// On the learner, windows of `n_step` transitions go into a prioritized replay
/// buffer. Every `learn_period` environment steps, once the buffer holds more than
/// `batch_size` windows and the warmup has elapsed, a batch is sampled and the online
/// model takes a gradient step on the importance-weighted squared TD error with the
/// gradient norm clipped. Targets are double-Q: the online model picks the bootstrap
/// action and the target model evaluates it. The TD errors of the batch become the
/// new priorities of the sampled slots.
///
/// On an actor, [`Agent::set_distributed`] fixes epsilon to the actor's share of the
/// Ape-X spread.
#[cfg_attr(doc, aquamarine::aquamarine)]
/// ```mermaid
/// stateDiagram-v2
///     [*] --> Accumulate
///     Accumulate --> Learn: stamp >= learn_period and buffer warm
///     Learn --> Accumulate: stamp = 0
///     Accumulate --> SyncTarget: n_learn > 0 and target stamp >= target_update_period
///     SyncTarget --> Accumulate
/// ```
pub struct Apex<E, Q>
where
    E: Env,
    Q: QModel,
{
    core: DqnCore<E, Q>,
    epsilon: f32,
    epsilon_alpha: f32,
    clip_grad_norm: f32,
    learn_period: usize,
    learn_period_stamp: usize,
    saved_priorities: Option<Vec<f32>>,
}

impl<E, Q> Apex<E, Q>
where
    E: Env,
    E::Act: DiscreteAct,
    Q: QModel,
{
    /// Shared learner state.
    pub fn core(&self) -> &DqnCore<E, Q> {
        &self.core
    }

    /// Shared learner state, for restoring buffer contents.
    pub fn core_mut(&mut self) -> &mut DqnCore<E, Q> {
        &mut self.core
    }

    /// Pushes absolute TD errors of sampled slots back into the buffer as priorities.
    ///
    /// Updates of slots overwritten since they were sampled are dropped and counted.
    pub fn update_priorities(&mut self, ixs: &[SlotIndex], td_errors: &[f32]) -> Result<()> {
        for (ix, td) in ixs.iter().zip(td_errors.iter()) {
            let p = self.core.buffer.priority_from_td_error(*td);
            match self.core.buffer.update_priority(ix, p) {
                Ok(()) => {}
                Err(ApexError::InvalidSlot { slot, reason }) => {
                    self.core.n_stale_priority_updates += 1;
                    debug!("Dropped priority update of slot {}: {}", slot, reason);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Priorities read by the last [`Agent::load`], if the checkpoint had them.
    pub fn saved_priorities(&self) -> Option<&[f32]> {
        self.saved_priorities.as_deref()
    }

    /// Writes the priorities read by the last [`Agent::load`] into the live slots.
    ///
    /// Meant to be called once the buffer contents of the checkpoint were stored again.
    /// Returns the number of slots written.
    pub fn restore_priorities(&mut self) -> Result<usize> {
        match self.saved_priorities.take() {
            Some(priorities) => Ok(self.core.buffer.restore_priorities(&priorities)?),
            None => Ok(0),
        }
    }

    fn learn_(&mut self) -> Result<Option<Record>> {
        let beta = self.core.buffer.beta(self.core.time_t);
        let batch = match self.core.buffer.batch(self.core.batch_size, beta) {
            Ok(batch) => batch,
            Err(ApexError::InsufficientData { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stat = self.core.learn_windows(
            &batch.windows,
            &batch.weights,
            true,
            CriticLoss::Mse,
            Some(self.clip_grad_norm),
        )?;
        self.update_priorities(&batch.ixs, &stat.td_errors)?;

        let mut record = Record::from_slice(&[
            ("loss", RecordValue::Scalar(stat.opt.loss)),
            ("max_q", RecordValue::Scalar(stat.max_q)),
            ("sampled_p", RecordValue::Scalar(batch.sampled_p)),
            ("mean_p", RecordValue::Scalar(batch.mean_p)),
            ("beta", RecordValue::Scalar(beta)),
            ("grad_norm", RecordValue::Scalar(stat.opt.grad_norm)),
        ]);
        if let Some(eps) = self.core.epsilon() {
            record.insert("epsilon", RecordValue::Scalar(eps));
        }
        Ok(Some(record))
    }
}

impl<E, Q> Configurable for Apex<E, Q>
where
    E: Env,
    E::Act: DiscreteAct,
    Q: QModel,
{
    type Config = ApexConfig<Q::Config>;

    fn build(config: Self::Config) -> Result<Self> {
        config.validate()?;
        let replay_buffer_config = config
            .dqn
            .replay_buffer_config
            .clone()
            .per_config(Some(config.per_config.clone()));
        let mut core = DqnCore::build(&config.dqn, config.n_step, &replay_buffer_config)?;
        core.explorer = EpsilonGreedy::constant(config.epsilon);

        Ok(Self {
            core,
            epsilon: config.epsilon,
            epsilon_alpha: config.epsilon_alpha,
            clip_grad_norm: config.clip_grad_norm,
            learn_period: config.learn_period,
            learn_period_stamp: 0,
            saved_priorities: None,
        })
    }
}

impl<E, Q> Policy<E> for Apex<E, Q>
where
    E: Env,
    E::Act: DiscreteAct,
    Q: QModel,
{
    fn act(&mut self, obs: &E::Obs) -> E::Act {
        self.core.act(obs)
    }
}

impl<E, Q> Agent<E> for Apex<E, Q>
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
        let eps = apex_epsilon(self.epsilon, self.epsilon_alpha, id, n_actors);
        self.core.explorer = EpsilonGreedy::constant(eps);
        self.core.actor = Some((id, n_actors));
        debug!("Actor {} of {} explores with epsilon {}", id, n_actors, eps);
    }

    fn process_step(
        &mut self,
        rollouts: Vec<Rollout<E::Obs, E::Act>>,
        env_step: usize,
    ) -> Result<Record> {
        let delta_t = self.core.ingest(rollouts, env_step);
        self.learn_period_stamp += delta_t;
        let mut record = Record::empty();

        if self.learn_period_stamp >= self.learn_period && self.core.can_learn() {
            if let Some(r) = self.learn_()? {
                record.merge_inplace(r);
            }
            self.learn_period_stamp = 0;
        }

        self.core.maybe_update_target()?;

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
        self.core.save(path)?;
        let file = BufWriter::new(File::create(path.join("priorities.bin"))?);
        bincode::serialize_into(file, &self.core.buffer.priorities())?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        self.core.load(path)?;
        let path = path.join("priorities.bin");
        self.saved_priorities = if path.exists() {
            let file = BufReader::new(File::open(&path)?);
            let priorities: Vec<f32> = bincode::deserialize_from(file)?;
            info!("Read {} priorities from {:?}", priorities.len(), path);
            Some(priorities)
        } else {
            None
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dqn::DqnConfig,
        linear::{LinearQ, LinearQConfig},
    };
    use apex_core::{
        aggregator::Window, dummy::ScriptedEnv, replay_buffer::ReplayBufferConfig, Transition,
    };
    use tempdir::TempDir;
    use test_log::test;

    type TestApex = Apex<ScriptedEnv, LinearQ>;

    fn config() -> ApexConfig<LinearQConfig> {
        ApexConfig::default().n_step(2).learn_period(4).dqn(
            DqnConfig::default()
                .model_config(LinearQConfig::new(4, 2))
                .batch_size(4)
                .start_train_step(0)
                .target_update_period(8)
                .replay_buffer_config(ReplayBufferConfig::default().capacity(16)),
        )
    }

    fn rollout(n: usize, reward: f32) -> Rollout<Vec<f32>, usize> {
        let trs = (0..n)
            .map(|t| {
                Transition::new(
                    vec![1.0, t as f32 / n as f32, 0.0, 0.0],
                    t % 2,
                    reward,
                    vec![1.0, (t + 1) as f32 / n as f32, 0.0, 0.0],
                    t + 1 == n,
                )
            })
            .collect();
        Rollout::new(0, trs)
    }

    #[test]
    fn learns_every_learn_period() -> Result<()> {
        let mut agent = TestApex::build(config())?;

        // 6 windows, 6 steps: buffer warm and the period elapsed.
        let record = agent.process_step(vec![rollout(6, 1.0)], 6)?;
        assert_eq!(agent.core().n_learn(), 1);
        for key in ["loss", "max_q", "sampled_p", "mean_p", "beta", "epsilon"] {
            assert!(record.get_scalar(key).is_ok(), "missing {}", key);
        }

        // 2 more steps do not complete another period.
        let record = agent.process_step(vec![rollout(2, 1.0)], 8)?;
        assert!(record.get_scalar("loss").is_err());
        assert_eq!(agent.core().n_learn(), 1);

        agent.process_step(vec![rollout(2, 1.0)], 10)?;
        assert_eq!(agent.core().n_learn(), 2);
        Ok(())
    }

    #[test]
    fn learning_rewrites_priorities() -> Result<()> {
        let mut agent = TestApex::build(config())?;
        agent.process_step(vec![rollout(8, 1.0)], 8)?;
        let priorities = agent.core().buffer().priorities();
        assert_eq!(priorities.len(), 8);
        assert!(priorities.iter().any(|p| *p != 1.0));
        assert!(priorities.iter().all(|p| p.is_finite() && *p > 0.0));
        Ok(())
    }

    #[test]
    fn targets_are_double_q() -> Result<()> {
        let agent = TestApex::build(config())?;
        let core = agent.core();
        let next = vec![0.5, -1.0, 2.0, 0.0];
        let window = Window {
            state: vec![0.0; 4],
            action: 1usize,
            rewards: vec![1.0, 2.0],
            dones: vec![false, false],
            next_state: next.clone(),
            n_step: 2,
        };
        let a = crate::util::argmax(&core.qnet().forward(&next));
        let expected = 1.0 + 0.99 * 2.0 + 0.99f32.powi(2) * core.qnet_tgt().forward(&next)[a];
        let targets = core.targets(&[window], true);
        assert!((targets[0] - expected).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn stale_priority_updates_are_counted() -> Result<()> {
        let mut agent = TestApex::build(config())?;
        agent.core_mut().ingest(vec![rollout(16, 1.0)], 16);
        let batch = agent.core_mut().buffer_mut().batch(4, 0.4)?;

        // Overwrite every slot.
        agent.core_mut().ingest(vec![rollout(16, 1.0)], 32);
        agent.update_priorities(&batch.ixs, &[1.0; 4])?;
        assert_eq!(agent.core().n_stale_priority_updates(), 4);
        Ok(())
    }

    #[test]
    fn actors_get_their_share_of_epsilon() -> Result<()> {
        let mut first = TestApex::build(config())?;
        let mut last = TestApex::build(config())?;
        first.set_distributed(0, 16);
        last.set_distributed(15, 16);
        assert_eq!(first.core().epsilon(), Some(0.4));
        assert!((last.core().epsilon().unwrap() - 0.4f32.powf(1.7)).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn non_finite_loss_is_fatal() -> Result<()> {
        let mut agent = TestApex::build(config())?;
        let before = agent.sync_out();
        let err = agent
            .process_step(vec![rollout(8, f32::NAN)], 8)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApexError>(),
            Some(ApexError::NonFiniteLoss(_))
        ));
        assert_eq!(agent.sync_out(), before);
        assert_eq!(agent.core().n_learn(), 0);
        Ok(())
    }

    #[test]
    fn sync_moves_parameters_between_agents() -> Result<()> {
        let mut learner = TestApex::build(config())?;
        let mut actor = TestApex::build(config().dqn(
            DqnConfig::default()
                .model_config(LinearQConfig::new(4, 2))
                .batch_size(4)
                .seed(7)
                .replay_buffer_config(ReplayBufferConfig::default().capacity(16)),
        ))?;
        learner.process_step(vec![rollout(8, 1.0)], 8)?;

        let snapshot = learner.sync_out();
        assert_eq!(snapshot.version, 1);
        actor.sync_in(&snapshot)?;
        let obs = vec![1.0, 0.3, 0.0, 0.0];
        assert_eq!(
            actor.core().qnet().forward(&obs),
            learner.core().qnet().forward(&obs)
        );
        Ok(())
    }

    #[test]
    fn checkpoint_keeps_priorities() -> Result<()> {
        let dir = TempDir::new("apex")?;
        let mut agent = TestApex::build(config())?;
        agent.process_step(vec![rollout(8, 1.0)], 8)?;
        agent.save(dir.path())?;
        for file in ["qnet.bin", "qnet_tgt.bin", "agent.yaml", "priorities.bin"] {
            assert!(dir.path().join(file).exists());
        }

        let mut restored = TestApex::build(config())?;
        restored.load(dir.path())?;
        assert_eq!(restored.core().n_learn(), 1);
        assert_eq!(restored.core().time_t(), 8);
        assert_eq!(restored.sync_out(), agent.sync_out());
        assert_eq!(
            restored.saved_priorities(),
            Some(agent.core().buffer().priorities().as_slice())
        );

        // Priorities go back once the windows are stored again.
        restored.core_mut().ingest(vec![rollout(8, 1.0)], 8);
        assert_eq!(restored.restore_priorities()?, 8);
        assert_eq!(
            restored.core().buffer().priorities(),
            agent.core().buffer().priorities()
        );
        Ok(())
    }
}
