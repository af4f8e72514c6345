//! Fan-out/fan-in over a fixed set of actors.
mod base;
mod config;
pub use base::{ActorPool, PoolRound};
pub use config::ActorPoolConfig;
