//! DQN agent.
mod base;
mod config;
mod dqn_core;
mod explorer;
pub use base::Dqn;
pub use config::DqnConfig;
pub use dqn_core::DqnCore;
pub use explorer::{apex_epsilon, DqnExplorer, EpsilonGreedy, Softmax};
