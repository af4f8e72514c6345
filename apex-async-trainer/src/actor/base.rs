use crate::{ActorRequest, ActorResponse, ActorStat};
use anyhow::Result;
use apex_core::{Agent, Configurable, Env, Rollout, Step, Transition};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use std::{
    marker::PhantomData,
    mem,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs interaction between an [`Agent`] and an [`Env`], taking transitions.
///
/// The actor owns its environment and a private copy of the agent. It serves the
/// requests of the [`ActorPool`](crate::ActorPool) one at a time, so a snapshot
/// received with [`ActorRequest::Sync`] replaces the parameters between two runs and
/// never in the middle of one. An error of the agent or the environment is reported
/// with [`ActorResponse::Fault`] and ends the loop.
pub struct Actor<A, E>
where
    A: Agent<E> + Configurable,
    E: Env,
{
    id: usize,
    n_actors: usize,
    agent_config: A::Config,
    env_config: E::Config,
    env_seed: i64,

    /// Stops the loop when raised.
    stop: Arc<AtomicBool>,

    /// Written when the loop ends.
    stats: Arc<Mutex<Option<ActorStat>>>,

    phantom: PhantomData<fn() -> (A, E)>,
}

impl<A, E> Actor<A, E>
where
    A: Agent<E> + Configurable,
    E: Env,
{
    /// Builds actor `id` of `n_actors`.
    pub fn build(
        id: usize,
        n_actors: usize,
        agent_config: A::Config,
        env_config: E::Config,
        env_seed: i64,
        stop: Arc<AtomicBool>,
        stats: Arc<Mutex<Option<ActorStat>>>,
    ) -> Self {
        Self {
            id,
            n_actors,
            agent_config,
            env_config,
            env_seed,
            stop,
            stats,
            phantom: PhantomData,
        }
    }

    /// Serves requests until [`ActorRequest::Stop`], the stop flag or a fault.
    pub fn run(
        self,
        requests: Receiver<ActorRequest>,
        responses: Sender<ActorResponse<E::Obs, E::Act>>,
        guard_init_env: Arc<Mutex<()>>,
    ) {
        info!("Started actor {}", self.id);
        let start = Instant::now();
        let mut stat = ActorStat {
            id: self.id,
            ..Default::default()
        };
        let mut score_sum = 0f32;

        if let Err(e) = self.serve(
            &requests,
            &responses,
            &guard_init_env,
            &mut stat,
            &mut score_sum,
        ) {
            warn!("Actor {} stopped on error: {}", self.id, e);
            let _ = responses.send(ActorResponse::Fault {
                id: self.id,
                reason: e.to_string(),
            });
        }

        stat.duration = start.elapsed();
        if stat.episodes > 0 {
            stat.mean_score = score_sum / stat.episodes as f32;
        }
        match self.stats.lock() {
            Ok(mut stats) => *stats = Some(stat),
            Err(mut poisoned) => **poisoned.get_mut() = Some(stat),
        }
        info!("Stopped actor {}", self.id);
    }

    fn serve(
        &self,
        requests: &Receiver<ActorRequest>,
        responses: &Sender<ActorResponse<E::Obs, E::Act>>,
        guard_init_env: &Mutex<()>,
        stat: &mut ActorStat,
        score_sum: &mut f32,
    ) -> Result<()> {
        let mut agent = A::build(self.agent_config.clone())?;
        agent.set_distributed(self.id, self.n_actors);
        agent.train();

        let mut env = {
            let _guard = guard_init_env
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            E::build(&self.env_config, self.env_seed)?
        };
        let mut obs = env.reset()?;

        loop {
            let request = match requests.recv_timeout(POLL_INTERVAL) {
                Ok(request) => request,
                Err(RecvTimeoutError::Timeout) => {
                    if self.stop.load(Ordering::SeqCst) {
                        return Ok(());
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            };

            let response = match request {
                ActorRequest::Run(n_steps) => {
                    let mut transitions = Vec::with_capacity(n_steps);
                    let mut scores = vec![];
                    for _ in 0..n_steps {
                        if self.stop.load(Ordering::SeqCst) {
                            break;
                        }
                        let act = agent.act(&obs);
                        let Step {
                            act,
                            obs: next_obs,
                            reward,
                            is_done,
                        } = env.step(&act)?;
                        let state = mem::replace(&mut obs, next_obs.clone());
                        transitions.push(Transition::new(state, act, reward, next_obs, is_done));
                        if is_done {
                            let score = env.score();
                            scores.push(score);
                            *score_sum += score;
                            stat.episodes += 1;
                            obs = env.reset()?;
                        }
                    }
                    stat.env_steps += transitions.len();
                    ActorResponse::Rollout {
                        id: self.id,
                        rollout: Rollout::new(self.id, transitions),
                        scores,
                    }
                }
                ActorRequest::Sync(snapshot) => {
                    agent.sync_in(&snapshot)?;
                    debug!("Actor {} synced to version {}", self.id, snapshot.version);
                    ActorResponse::SyncAck {
                        id: self.id,
                        version: snapshot.version,
                    }
                }
                ActorRequest::Stop => return Ok(()),
            };

            if responses.send(response).is_err() {
                return Ok(());
            }
        }
    }
}
