//! Utility function.
use crate::{
    actor_stats_fmt, ActorPool, ActorPoolConfig, ActorStat, ApexTrainStat, ApexTrainer,
    ApexTrainerConfig, Runtime,
};
use anyhow::Result;
use apex_core::{record::AggregateRecorder, Agent, Configurable, Env};
use log::{info, warn};

/// Runs distributed training.
///
/// Creates a [`Runtime`], spawns an [`ActorPool`] on it and runs [`ApexTrainer`] with
/// a learner built from `agent_config`. Actors build their agents from the same
/// configuration and pick their exploration rate through
/// [`Agent::set_distributed`]. The runtime is shut down before returning, also when
/// training failed. An error of training takes precedence over one of the shutdown.
///
/// Returns the trained learner with the stats of the trainer and the actors.
pub fn train_apex<A, E, R>(
    agent_config: &A::Config,
    env_config: &E::Config,
    pool_config: &ActorPoolConfig,
    trainer_config: &ApexTrainerConfig,
    recorder: &mut R,
) -> Result<(A, ApexTrainStat, Vec<ActorStat>)>
where
    A: Agent<E> + Configurable + 'static,
    E: Env + 'static,
    A::Config: Send + 'static,
    R: AggregateRecorder,
{
    let runtime = Runtime::init();
    let mut agent = A::build(agent_config.clone())?;
    let mut trainer = ApexTrainer::build(trainer_config.clone())?;
    let mut pool = ActorPool::<A, E>::build(pool_config, agent_config, env_config, &runtime)?;

    let result = trainer.train(&mut agent, &mut pool, recorder);
    pool.stop();
    let shutdown = runtime.shutdown();
    let stat = result.map_err(|e| {
        if let Err(shutdown_err) = &shutdown {
            warn!("Failed to shut down the runtime: {}", shutdown_err);
        }
        e
    })?;
    shutdown?;

    let actor_stats = pool.actor_stats();
    info!("Stats of trainer\n{}", stat.fmt());
    info!("Stats of actors\n{}", actor_stats_fmt(&actor_stats));

    Ok((agent, stat, actor_stats))
}
