use super::ActorPoolConfig;
use crate::{Actor, ActorRequest, ActorResponse, ActorStat, ApexTrainerError, Runtime};
use anyhow::Result;
use apex_core::{Agent, ApexError, Configurable, Env, Rollout, WeightSnapshot};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use std::{
    marker::PhantomData,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

/// Transitions gathered in one round of [`ActorPool::run`].
#[derive(Debug, Clone)]
pub struct PoolRound<O, A> {
    /// Rollouts of the live actors in actor-index order.
    pub rollouts: Vec<Rollout<O, A>>,

    /// Scores of the episodes finished in the round.
    pub scores: Vec<f32>,
}

impl<O, A> PoolRound<O, A> {
    fn new() -> Self {
        Self {
            rollouts: vec![],
            scores: vec![],
        }
    }

    /// Number of environment steps in the round.
    pub fn env_steps(&self) -> usize {
        self.rollouts.iter().map(|r| r.env_steps()).sum()
    }
}

/// Manages [`Actor`]s.
///
/// Every actor runs on its own thread and talks to the pool over a pair of
/// channels. [`ActorPool::run`] and [`ActorPool::sync`] are barriers: they send one
/// request to every live actor and return once each of them answered. An actor that
/// reports a fault or does not answer within `actor_timeout_ms` is excluded from this
/// and all later rounds. A round fails only when no live actor is left.
#[cfg_attr(doc, aquamarine::aquamarine)]
/// ```mermaid
/// sequenceDiagram
///     participant C as Coordinator
///     participant P as ActorPool
///     participant A as Actor i
///     C->>P: run(n)
///     P->>A: Run(n)
///     A-->>P: Rollout / Fault / timeout
///     P-->>C: PoolRound
///     C->>P: sync(snapshot)
///     P->>A: Sync(snapshot)
///     A-->>P: SyncAck(version)
/// ```
pub struct ActorPool<A, E>
where
    A: Agent<E> + Configurable + 'static,
    E: Env + 'static,
{
    timeout: Duration,
    requests: Vec<Sender<ActorRequest>>,
    responses: Vec<Receiver<ActorResponse<E::Obs, E::Act>>>,
    live: Vec<bool>,
    faults: Vec<ApexError>,

    /// Stats of [`Actor`]s, shared with actor threads.
    actor_stats: Vec<Arc<Mutex<Option<ActorStat>>>>,

    n_rounds: usize,
    phantom: PhantomData<fn() -> A>,
}

impl<A, E> ActorPool<A, E>
where
    A: Agent<E> + Configurable + 'static,
    E: Env + 'static,
    A::Config: Send + 'static,
{
    /// Spawns the actors on the runtime.
    pub fn build(
        config: &ActorPoolConfig,
        agent_config: &A::Config,
        env_config: &E::Config,
        runtime: &Runtime,
    ) -> Result<Self> {
        config.validate()?;
        let n = config.n_actors;
        let mut pool = Self {
            timeout: config.actor_timeout(),
            requests: Vec::with_capacity(n),
            responses: Vec::with_capacity(n),
            live: vec![true; n],
            faults: vec![],
            actor_stats: Vec::with_capacity(n),
            n_rounds: 0,
            phantom: PhantomData,
        };

        for id in 0..n {
            let (request_s, request_r) = unbounded();
            let (response_s, response_r) = unbounded();
            let stats = Arc::new(Mutex::new(None));
            let actor = Actor::<A, E>::build(
                id,
                n,
                agent_config.clone(),
                env_config.clone(),
                config.seed + id as i64,
                runtime.stop_flag(),
                stats.clone(),
            );
            let guard = runtime.guard_init_env();
            runtime.spawn(format!("actor-{}", id), move || {
                actor.run(request_r, response_s, guard)
            })?;
            pool.requests.push(request_s);
            pool.responses.push(response_r);
            pool.actor_stats.push(stats);
        }
        info!("Spawned {} actors", n);

        Ok(pool)
    }

    /// Number of actors, live or not.
    pub fn n_actors(&self) -> usize {
        self.live.len()
    }

    /// Number of actors still taking part in rounds.
    pub fn n_live(&self) -> usize {
        self.live.iter().filter(|l| **l).count()
    }

    /// Whether actor `id` still takes part in rounds.
    pub fn is_live(&self, id: usize) -> bool {
        self.live.get(id).copied().unwrap_or(false)
    }

    /// Faults of the excluded actors.
    pub fn faults(&self) -> &[ApexError] {
        &self.faults
    }

    /// Number of rounds of [`ActorPool::run`] so far.
    pub fn n_rounds(&self) -> usize {
        self.n_rounds
    }

    /// Makes every live actor take `n_steps` environment steps.
    ///
    /// Blocks until each actor returned its transitions, faulted or timed out.
    pub fn run(&mut self, n_steps: usize) -> Result<PoolRound<E::Obs, E::Act>> {
        self.n_rounds += 1;
        let ids = self.broadcast(ActorRequest::Run(n_steps));
        let deadline = Instant::now() + self.timeout;
        let mut round = PoolRound::new();

        for id in ids {
            match self.recv(id, deadline) {
                Ok(ActorResponse::Rollout {
                    rollout, scores, ..
                }) => {
                    round.rollouts.push(rollout);
                    round.scores.extend(scores);
                }
                Ok(ActorResponse::Fault { reason, .. }) => self.exclude(id, reason),
                Ok(ActorResponse::SyncAck { .. }) => {
                    self.exclude(id, "unexpected sync acknowledgement".to_string())
                }
                Err(reason) => self.exclude(id, reason),
            }
        }

        self.ensure_live()?;
        Ok(round)
    }

    /// Replaces the parameters of every live actor with `snapshot`.
    ///
    /// Blocks until each actor acknowledged the version, faulted or timed out.
    /// Returns the number of acknowledgements.
    pub fn sync(&mut self, snapshot: WeightSnapshot) -> Result<usize> {
        let version = snapshot.version;
        let ids = self.broadcast(ActorRequest::Sync(Arc::new(snapshot)));
        let deadline = Instant::now() + self.timeout;
        let mut n_acks = 0;

        for id in ids {
            match self.recv(id, deadline) {
                Ok(ActorResponse::SyncAck { version: v, .. }) if v == version => n_acks += 1,
                Ok(ActorResponse::SyncAck { version: v, .. }) => {
                    self.exclude(id, format!("acknowledged version {} for {}", v, version))
                }
                Ok(ActorResponse::Fault { reason, .. }) => self.exclude(id, reason),
                Ok(ActorResponse::Rollout { .. }) => {
                    self.exclude(id, "unexpected rollout".to_string())
                }
                Err(reason) => self.exclude(id, reason),
            }
        }

        self.ensure_live()?;
        debug!("Synced {} actors to version {}", n_acks, version);
        Ok(n_acks)
    }

    /// Asks every actor, excluded ones included, to leave its loop.
    pub fn stop(&self) {
        for s in self.requests.iter() {
            let _ = s.send(ActorRequest::Stop);
        }
        info!("Sent stop to {} actors", self.requests.len());
    }

    /// Stats of the actors whose loop has ended.
    pub fn actor_stats(&self) -> Vec<ActorStat> {
        self.actor_stats
            .iter()
            .filter_map(|s| match s.lock() {
                Ok(s) => s.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            })
            .collect()
    }

    fn broadcast(&mut self, request: ActorRequest) -> Vec<usize> {
        let ids: Vec<usize> = (0..self.live.len()).filter(|id| self.live[*id]).collect();
        ids.into_iter()
            .filter(|id| {
                if self.requests[*id].send(request.clone()).is_ok() {
                    true
                } else {
                    self.exclude(*id, "request channel closed".to_string());
                    false
                }
            })
            .collect()
    }

    fn recv(
        &self,
        id: usize,
        deadline: Instant,
    ) -> Result<ActorResponse<E::Obs, E::Act>, String> {
        let timeout = deadline.saturating_duration_since(Instant::now());
        self.responses[id]
            .recv_timeout(timeout)
            .map_err(|e| match e {
                RecvTimeoutError::Timeout => {
                    format!("no response within {} ms", self.timeout.as_millis())
                }
                RecvTimeoutError::Disconnected => "response channel closed".to_string(),
            })
    }

    fn exclude(&mut self, id: usize, reason: String) {
        self.live[id] = false;
        let _ = self.requests[id].send(ActorRequest::Stop);
        let fault = ApexError::ActorFault { id, reason };
        warn!("Excluded actor: {}", fault);
        self.faults.push(fault);
    }

    fn ensure_live(&self) -> Result<()> {
        if self.n_live() == 0 {
            Err(ApexTrainerError::NoLiveActors {
                round: self.n_rounds,
            }
            .into())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apex_core::{
        dummy::{ScriptedEnv, ScriptedEnvConfig},
        record::Record,
        NamedParams, Policy,
    };
    use serde::{Deserialize, Serialize};
    use std::path::Path;
    use test_log::test;

    #[derive(Clone, Debug, Deserialize, Serialize)]
    struct FirstActionConfig;

    /// Always takes action 0 and remembers the last synced version.
    struct FirstAction {
        version: usize,
    }

    impl Configurable for FirstAction {
        type Config = FirstActionConfig;

        fn build(_config: Self::Config) -> Result<Self> {
            Ok(Self { version: 0 })
        }
    }

    impl Policy<ScriptedEnv> for FirstAction {
        fn act(&mut self, _obs: &Vec<f32>) -> usize {
            0
        }
    }

    impl Agent<ScriptedEnv> for FirstAction {
        fn train(&mut self) {}

        fn eval(&mut self) {}

        fn is_train(&self) -> bool {
            true
        }

        fn set_distributed(&mut self, _id: usize, _n_actors: usize) {}

        fn process_step(
            &mut self,
            _rollouts: Vec<Rollout<Vec<f32>, usize>>,
            _env_step: usize,
        ) -> Result<Record> {
            Ok(Record::empty())
        }

        fn learn(&mut self) -> Result<Option<Record>> {
            Ok(None)
        }

        fn sync_out(&self) -> WeightSnapshot {
            WeightSnapshot::new(self.version, NamedParams::new())
        }

        fn sync_in(&mut self, snapshot: &WeightSnapshot) -> Result<()> {
            self.version = snapshot.version;
            Ok(())
        }

        fn save(&self, _path: &Path) -> Result<()> {
            Ok(())
        }

        fn load(&mut self, _path: &Path) -> Result<()> {
            Ok(())
        }
    }

    type Pool = ActorPool<FirstAction, ScriptedEnv>;

    fn pool(config: &ActorPoolConfig, env_config: &ScriptedEnvConfig) -> (Pool, Runtime) {
        let runtime = Runtime::init();
        let pool = Pool::build(config, &FirstActionConfig, env_config, &runtime).unwrap();
        (pool, runtime)
    }

    fn teardown(pool: Pool, runtime: Runtime) -> Vec<ActorStat> {
        pool.stop();
        runtime.shutdown().unwrap();
        pool.actor_stats()
    }

    #[test]
    fn rollouts_come_back_in_actor_order() {
        let config = ActorPoolConfig::default().n_actors(3).seed(10);
        let (mut pool, runtime) = pool(&config, &ScriptedEnvConfig::default().episode_len(4));

        let round = pool.run(5).unwrap();
        assert_eq!(round.env_steps(), 15);
        let streams: Vec<usize> = round.rollouts.iter().map(|r| r.stream).collect();
        assert_eq!(streams, vec![0, 1, 2]);
        for (i, rollout) in round.rollouts.iter().enumerate() {
            assert_eq!(rollout.transitions.len(), 5);
            assert!(rollout
                .transitions
                .iter()
                .all(|t| t.state[0] == (10 + i) as f32));
        }
        // One finished episode of length 4 per actor.
        assert_eq!(round.scores, vec![4.0; 3]);

        let stats = teardown(pool, runtime);
        assert_eq!(stats.len(), 3);
        assert!(stats.iter().all(|s| s.env_steps == 5 && s.episodes == 1));
    }

    #[test]
    fn sync_waits_for_every_actor() {
        let config = ActorPoolConfig::default().n_actors(4);
        let (mut pool, runtime) = pool(&config, &ScriptedEnvConfig::default());

        let n_acks = pool
            .sync(WeightSnapshot::new(3, NamedParams::new()))
            .unwrap();
        assert_eq!(n_acks, 4);
        assert!(pool.faults().is_empty());
        teardown(pool, runtime);
    }

    #[test]
    fn faulty_actor_is_excluded() {
        let config = ActorPoolConfig::default().n_actors(3).seed(0);
        let env_config = ScriptedEnvConfig::default().fail(Some(1), 3);
        let (mut pool, runtime) = pool(&config, &env_config);

        let round = pool.run(5).unwrap();
        let streams: Vec<usize> = round.rollouts.iter().map(|r| r.stream).collect();
        assert_eq!(streams, vec![0, 2]);
        assert!(!pool.is_live(1));
        assert_eq!(pool.n_live(), 2);
        assert!(matches!(
            pool.faults(),
            [ApexError::ActorFault { id: 1, .. }]
        ));

        // Later rounds go on without it.
        let round = pool.run(5).unwrap();
        assert_eq!(round.rollouts.len(), 2);
        assert_eq!(pool.sync(WeightSnapshot::new(1, NamedParams::new())).unwrap(), 2);
        teardown(pool, runtime);
    }

    #[test]
    fn slow_actor_is_excluded_by_the_watchdog() {
        let config = ActorPoolConfig::default()
            .n_actors(3)
            .seed(0)
            .actor_timeout_ms(100);
        let env_config = ScriptedEnvConfig::default().slow(2, 150);
        let (mut pool, runtime) = pool(&config, &env_config);

        let round = pool.run(2).unwrap();
        assert_eq!(round.rollouts.len(), 2);
        assert!(!pool.is_live(2));
        match &pool.faults()[0] {
            ApexError::ActorFault { id, reason } => {
                assert_eq!(*id, 2);
                assert!(reason.contains("no response"));
            }
            e => panic!("unexpected fault {:?}", e),
        }
        teardown(pool, runtime);
    }

    #[test]
    fn round_fails_without_live_actors() {
        let config = ActorPoolConfig::default().n_actors(2);
        let env_config = ScriptedEnvConfig::default().fail(None, 0);
        let (mut pool, runtime) = pool(&config, &env_config);

        let err = pool.run(3).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ApexTrainerError>(),
            Some(&ApexTrainerError::NoLiveActors { round: 1 })
        );
        assert_eq!(pool.faults().len(), 2);
        teardown(pool, runtime);
    }

    #[test]
    fn stats_are_read_from_a_poisoned_lock() {
        let config = ActorPoolConfig::default().n_actors(1);
        let (mut pool, runtime) = pool(&config, &ScriptedEnvConfig::default());
        pool.run(3).unwrap();
        pool.stop();
        runtime.shutdown().unwrap();

        let stats = pool.actor_stats[0].clone();
        let _ = std::thread::spawn(move || {
            let _lock = stats.lock().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(pool.actor_stats[0].is_poisoned());

        let stats = pool.actor_stats();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].env_steps, 3);
    }

    #[test]
    fn zero_actors_are_rejected() {
        let runtime = Runtime::init();
        let config = ActorPoolConfig::default().n_actors(0);
        assert!(Pool::build(&config, &FirstActionConfig, &ScriptedEnvConfig::default(), &runtime).is_err());
    }
}
