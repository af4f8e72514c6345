//! Q-learning agents for the actor-learner pipeline.
//!
//! * [`model::QModel`] is the contract an action-value function must satisfy, and
//!   [`linear::LinearQ`] is a small reference implementation of it.
//!   [`model::QuantileModel`] extends it with quantiles of the return, implemented by
//!   [`linear::LinearQuantile`].
//! * [`dqn::Dqn`], [`multistep_dqn::MultistepDqn`], [`apex::Apex`] and
//!   [`qrdqn::QrDqn`] implement
//!   [`Agent`](apex_core::Agent). They hold a [`dqn::DqnCore`] with the online and
//!   target models, the replay buffer and the step counters, and differ in how windows
//!   are built, sampled and turned into targets.
pub mod apex;
pub mod dqn;
pub mod linear;
pub mod model;
pub mod multistep_dqn;
pub mod opt;
pub mod qrdqn;
pub mod util;
