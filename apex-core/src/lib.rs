#![warn(missing_docs)]
//! Core of the distributed actor-learner pipeline.
//!
//! This crate holds the pieces shared by the learner and the rollout actors:
//!
//! * [`Env`], [`Policy`], [`Agent`] and [`Configurable`], the interfaces through which
//!   environments and agents are plugged into the pipeline.
//! * [`Transition`], [`Rollout`] and [`WeightSnapshot`], the records exchanged between
//!   actors and the learner.
//! * [`aggregator`], folding per-actor transition streams into n-step windows.
//! * [`replay_buffer`], a ring buffer of windows with a sum-tree priority index.
//! * [`record`], key-value records used to report learner and actor statistics.
pub mod aggregator;
pub mod dummy;
pub mod error;
pub mod record;
pub mod replay_buffer;

mod base;
pub use base::{
    Act, ActionMode, Agent, Configurable, DiscreteAct, Env, NamedParams, Obs, Policy, Rollout,
    Step, Transition, WeightSnapshot,
};
pub use error::ApexError;
