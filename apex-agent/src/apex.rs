//! Ape-X agent.
//!
//! A learner with prioritized n-step replay fed by many actors, each exploring with
//! its own fixed epsilon from [`apex_epsilon`](crate::dqn::apex_epsilon).
mod base;
mod config;
pub use base::Apex;
pub use config::ApexConfig;
