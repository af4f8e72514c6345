//! Distributed training with a pool of actor threads and a single learner.
//!
//! * [`Runtime`] owns the worker threads of a run and tears them down.
//! * [`Actor`] steps its own environment with a private copy of the agent.
//! * [`ActorPool`] sends [`ActorRequest`]s to the actors and collects their
//!   [`ActorResponse`]s in barrier rounds, excluding actors that fault or time out.
//! * [`ApexTrainer`] alternates pool rounds with learner updates and broadcasts
//!   fresh weights to the actors.
//!
//! [`train_apex`] wires these together:
//!
//! ```no_run
//! use apex_async_trainer::{train_apex, ActorPoolConfig, ApexTrainerConfig};
//! use apex_agent::{apex::{Apex, ApexConfig}, linear::{LinearQ, LinearQConfig}};
//! use apex_core::{dummy::{ChainEnv, ChainEnvConfig}, record::BufferedRecorder};
//!
//! # fn main() -> anyhow::Result<()> {
//! let agent_config = ApexConfig::default()
//!     .dqn(apex_agent::dqn::DqnConfig::default().model_config(LinearQConfig::new(5, 2)));
//! let mut recorder = BufferedRecorder::new();
//! let (agent, stat, _) = train_apex::<Apex<ChainEnv, LinearQ>, ChainEnv, _>(
//!     &agent_config,
//!     &ChainEnvConfig::default(),
//!     &ActorPoolConfig::default().n_actors(4),
//!     &ApexTrainerConfig::default().max_steps(10_000),
//!     &mut recorder,
//! )?;
//! println!("{}", stat.fmt());
//! # Ok(())
//! # }
//! ```
mod actor;
mod actor_pool;
mod apex_trainer;
mod error;
mod messages;
mod runtime;
mod util;
pub use actor::{actor_stats_fmt, Actor, ActorStat};
pub use actor_pool::{ActorPool, ActorPoolConfig, PoolRound};
pub use apex_trainer::{ApexTrainStat, ApexTrainer, ApexTrainerConfig};
pub use error::ApexTrainerError;
pub use messages::{ActorRequest, ActorResponse};
pub use runtime::Runtime;
pub use util::train_apex;
