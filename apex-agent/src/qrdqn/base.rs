//! Distributional DQN agent.
use super::QrDqnConfig;
use crate::{dqn::DqnCore, model::QuantileModel, util::argmax};
use anyhow::Result;
use apex_core::{
    aggregator::Window,
    record::{Record, RecordValue},
    Agent, ApexError, Configurable, DiscreteAct, Env, Obs, Policy, Rollout, WeightSnapshot,
};
use std::path::Path;

/// QR-DQN agent.
///
/// Learns the distribution of the return of each action as a set of quantiles. The
/// target of a window is the distribution `R + discount * θ_tgt(s', a*)`, where `a*`
/// is the action with the highest mean under the online model. Actions are chosen by
/// the mean of the quantiles, so exploration, target copies, snapshots and
/// checkpoints are those of [`DqnCore`]. Replay is uniform.
pub struct QrDqn<E, Q>
where
    E: Env,
    Q: QuantileModel,
{
    core: DqnCore<E, Q>,
    clip_grad_norm: Option<f32>,
}

impl<E, Q> QrDqn<E, Q>
where
    E: Env,
    E::Act: DiscreteAct,
    Q: QuantileModel,
{
    /// Shared learner state.
    pub fn core(&self) -> &DqnCore<E, Q> {
        &self.core
    }

    /// Samples of the target distribution of each window.
    pub(crate) fn quantile_targets(&self, windows: &[Window<E::Obs, E::Act>]) -> Vec<Vec<f32>> {
        let gamma = self.core.gamma;
        let n_quantiles = self.core.qnet_tgt.n_quantiles();
        windows
            .iter()
            .map(|w| {
                let reward = w.discounted_reward(gamma);
                let discount = w.bootstrap_discount(gamma);
                if discount == 0.0 {
                    return vec![reward; n_quantiles];
                }
                let next = w.next_state.features();
                let a = argmax(&self.core.qnet.forward(next));
                let mut z = self.core.qnet_tgt.quantiles(next).swap_remove(a);
                z.iter_mut().for_each(|z| *z = reward + discount * *z);
                z
            })
            .collect()
    }

    fn learn_(&mut self) -> Result<Option<Record>> {
        let batch = match self.core.buffer.batch(self.core.batch_size, 0.0) {
            Ok(batch) => batch,
            Err(ApexError::InsufficientData { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let targets = self.quantile_targets(&batch.windows);
        let obs: Vec<&[f32]> = batch.windows.iter().map(|w| w.state.features()).collect();
        let acts: Vec<usize> = batch.windows.iter().map(|w| w.action.index()).collect();

        let mut max_q = f32::NEG_INFINITY;
        let mut min_quantile = f32::INFINITY;
        let mut max_quantile = f32::NEG_INFINITY;
        for (x, a) in obs.iter().zip(acts.iter()) {
            let z = self.core.qnet.quantiles(x).swap_remove(*a);
            max_q = max_q.max(z.iter().sum::<f32>() / z.len() as f32);
            min_quantile = z.iter().cloned().fold(min_quantile, f32::min);
            max_quantile = z.iter().cloned().fold(max_quantile, f32::max);
        }

        let opt = self.core.qnet.quantile_backward_step(
            &obs,
            &acts,
            &targets,
            &batch.weights,
            self.clip_grad_norm,
        )?;
        self.core.n_learn += 1;

        let mut record = Record::from_slice(&[
            ("loss", RecordValue::Scalar(opt.loss)),
            ("max_q", RecordValue::Scalar(max_q)),
            ("min_quantile", RecordValue::Scalar(min_quantile)),
            ("max_quantile", RecordValue::Scalar(max_quantile)),
            ("grad_norm", RecordValue::Scalar(opt.grad_norm)),
        ]);
        if let Some(eps) = self.core.epsilon() {
            record.insert("epsilon", RecordValue::Scalar(eps));
        }
        Ok(Some(record))
    }
}

impl<E, Q> Configurable for QrDqn<E, Q>
where
    E: Env,
    E::Act: DiscreteAct,
    Q: QuantileModel,
{
    type Config = QrDqnConfig<Q::Config>;

    /// Constructs QR-DQN agent.
    fn build(config: Self::Config) -> Result<Self> {
        config.validate()?;
        let replay_buffer_config = config.dqn.replay_buffer_config.clone().per_config(None);
        Ok(Self {
            core: DqnCore::build(&config.dqn, config.n_step, &replay_buffer_config)?,
            clip_grad_norm: config.clip_grad_norm,
        })
    }
}

impl<E, Q> Policy<E> for QrDqn<E, Q>
where
    E: Env,
    E::Act: DiscreteAct,
    Q: QuantileModel,
{
    fn act(&mut self, obs: &E::Obs) -> E::Act {
        self.core.act(obs)
    }
}

impl<E, Q> Agent<E> for QrDqn<E, Q>
where
    E: Env,
    E::Act: DiscreteAct,
    Q: QuantileModel,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dqn::DqnConfig,
        linear::{LinearQuantile, LinearQuantileConfig},
        model::QModel,
    };
    use apex_core::{dummy::ScriptedEnv, replay_buffer::ReplayBufferConfig, Transition};
    use tempdir::TempDir;
    use test_log::test;

    type TestAgent = QrDqn<ScriptedEnv, LinearQuantile>;

    fn model_config() -> LinearQuantileConfig {
        LinearQuantileConfig::new(4, 2).n_quantiles(5).init_scale(0.5)
    }

    fn config() -> QrDqnConfig<LinearQuantileConfig> {
        QrDqnConfig::default().n_step(2).dqn(
            DqnConfig::default()
                .model_config(model_config())
                .batch_size(4)
                .gamma(0.5)
                .start_train_step(8)
                .target_update_period(100)
                .replay_buffer_config(ReplayBufferConfig::default().capacity(64)),
        )
    }

    fn rollout(n: usize) -> Rollout<Vec<f32>, usize> {
        let trs = (0..n)
            .map(|t| {
                Transition::new(
                    vec![1.0, t as f32 * 0.1, 0.0, 0.5],
                    t % 2,
                    1.0,
                    vec![1.0, (t + 1) as f32 * 0.1, 0.0, 0.5],
                    t + 1 == n,
                )
            })
            .collect();
        Rollout::new(0, trs)
    }

    #[test]
    fn quantile_targets_use_online_action_and_target_quantiles() -> Result<()> {
        let mut agent = TestAgent::build(config())?;
        // Make the online model differ from the target model.
        let other = LinearQuantile::build(model_config(), 7)?;
        agent.core.qnet.load_parameters(&other.parameters())?;

        let next = vec![1.0, -0.5, 2.0, 0.3];
        let open = Window {
            state: vec![0.0; 4],
            action: 0usize,
            rewards: vec![1.0, 2.0],
            dones: vec![false; 2],
            next_state: next.clone(),
            n_step: 2,
        };
        let terminal = Window {
            dones: vec![false, true],
            ..open.clone()
        };
        let targets = agent.quantile_targets(&[open, terminal]);

        let a = argmax(&agent.core().qnet().forward(&next));
        let z = &agent.core().qnet_tgt().quantiles(&next)[a];
        assert_eq!(targets[0].len(), 5);
        for (t, z) in targets[0].iter().zip(z.iter()) {
            // 1 + 0.5 * 2 + 0.25 * z
            assert!((t - (2.0 + 0.25 * z)).abs() < 1e-5);
        }
        assert_eq!(targets[1], vec![2.0; 5]);
        Ok(())
    }

    #[test]
    fn learns_after_warmup() -> Result<()> {
        let mut agent = TestAgent::build(config())?;
        let record = agent.process_step(vec![rollout(4)], 4)?;
        assert!(record.is_empty());

        let record = agent.process_step(vec![rollout(6)], 10)?;
        assert_eq!(agent.core().n_learn(), 1);
        assert!(record.get_scalar("loss")?.is_finite());
        assert!(record.get_scalar("min_quantile")? <= record.get_scalar("max_quantile")?);
        Ok(())
    }

    #[test]
    fn snapshot_and_checkpoint_carry_quantiles() -> Result<()> {
        let mut learner = TestAgent::build(config())?;
        learner.process_step(vec![rollout(12)], 12)?;
        assert!(learner.core().n_learn() > 0);

        let mut actor = TestAgent::build(config().dqn(
            DqnConfig::default()
                .model_config(model_config())
                .seed(5),
        ))?;
        actor.set_distributed(0, 2);
        actor.sync_in(&learner.sync_out())?;
        let x = [1.0, 0.2, 0.0, 0.5];
        assert_eq!(
            actor.core().qnet().quantiles(&x),
            learner.core().qnet().quantiles(&x)
        );

        let dir = TempDir::new("qrdqn")?;
        learner.save(dir.path())?;
        let mut restored = TestAgent::build(config())?;
        restored.load(dir.path())?;
        assert_eq!(restored.core().n_learn(), learner.core().n_learn());
        assert_eq!(
            restored.core().qnet_tgt().parameters(),
            learner.core().qnet_tgt().parameters()
        );
        Ok(())
    }
}
