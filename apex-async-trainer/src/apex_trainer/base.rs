use super::{ApexTrainStat, ApexTrainerConfig};
use crate::{ActorPool, ApexTrainerError};
use anyhow::Result;
use apex_core::{
    record::{AggregateRecorder, RecordValue::Scalar},
    Agent, Configurable, Env,
};
use log::{info, warn};
use std::{path::Path, time::Instant};

/// Coordinates the learner and the [`ActorPool`].
///
/// Training runs in rounds. In every round each live actor takes `run_steps`
/// environment steps with the last parameters it received, and the learner ingests
/// the transitions of all actors through [`Agent::process_step`], which stores them
/// and optimizes as often as the agent's schedule allows. Every `update_period`
/// rounds the learner's parameters are broadcast to the actors. Rounds are barriers,
/// so every actor is at most `update_period` rounds behind the learner.
#[cfg_attr(doc, aquamarine::aquamarine)]
/// ```mermaid
/// flowchart TD
///     S[sync initial weights] --> R[pool.run run_steps]
///     R --> P[agent.process_step]
///     P --> U{round % update_period == 0}
///     U -- yes --> W[pool.sync agent.sync_out] --> F
///     U -- no --> F{env_step >= max_steps}
///     F -- no --> R
///     F -- yes --> E[flush records]
/// ```
pub struct ApexTrainer {
    config: ApexTrainerConfig,
    env_step: usize,
    rounds: usize,
}

impl ApexTrainer {
    /// Creates [`ApexTrainer`].
    pub fn build(config: ApexTrainerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            env_step: 0,
            rounds: 0,
        })
    }

    /// Environment steps taken so far over all actors.
    pub fn env_step(&self) -> usize {
        self.env_step
    }

    fn save<E: Env, A: Agent<E>>(&self, agent: &A) {
        if let Some(model_dir) = self.config.model_dir.as_ref() {
            let path = Path::new(model_dir).join(self.env_step.to_string());
            match agent.save(&path) {
                Ok(()) => info!("Saved the model in {:?}", &path),
                Err(e) => warn!("Failed to save model in {:?}: {}", &path, e),
            }
        }
    }

    /// Runs the training loop until `max_steps` environment steps were taken.
    ///
    /// Records returned by the agent are stored in `recorder` together with the mean
    /// score of the episodes finished in the round, and flushed every
    /// `record_interval` rounds. Faults of single actors do not stop training; errors
    /// of the learner and the loss of every actor do.
    pub fn train<A, E, R>(
        &mut self,
        agent: &mut A,
        pool: &mut ActorPool<A, E>,
        recorder: &mut R,
    ) -> Result<ApexTrainStat>
    where
        A: Agent<E> + Configurable + 'static,
        E: Env + 'static,
        A::Config: Send + 'static,
        R: AggregateRecorder,
    {
        let start = Instant::now();
        let mut syncs = 0;
        agent.train();

        pool.sync(agent.sync_out())?;
        syncs += 1;
        info!("Sent initial weights to {} actors", pool.n_live());

        while self.env_step < self.config.max_steps {
            let round = pool.run(self.config.run_steps)?;
            self.rounds += 1;
            let n_steps = round.env_steps();
            if n_steps == 0 {
                warn!("Round {} returned no transitions", self.rounds);
                return Err(ApexTrainerError::NoProgress(self.rounds).into());
            }
            self.env_step += n_steps;

            let mut record = agent.process_step(round.rollouts, self.env_step)?;
            if !round.scores.is_empty() {
                let score = round.scores.iter().sum::<f32>() / round.scores.len() as f32;
                record.insert("score", Scalar(score));
            }
            record.insert("n_live_actors", Scalar(pool.n_live() as f32));
            recorder.store(record);

            if self.rounds % self.config.update_period == 0 {
                pool.sync(agent.sync_out())?;
                syncs += 1;
            }
            if self.rounds % self.config.record_interval == 0 {
                recorder.flush(self.env_step as i64);
            }
            if self.rounds % self.config.save_interval == 0 {
                self.save::<E, A>(agent);
            }
        }

        if self.rounds % self.config.record_interval != 0 {
            recorder.flush(self.env_step as i64);
        }
        info!("Finished training at step {}", self.env_step);

        Ok(ApexTrainStat {
            env_steps: self.env_step,
            rounds: self.rounds,
            syncs,
            excluded_actors: pool.faults().len(),
            duration: start.elapsed(),
        })
    }
}
