//! Takes transitions from an environment and sends them to the actor pool.
mod base;
mod stat;
pub use base::Actor;
pub use stat::{actor_stats_fmt, ActorStat};
