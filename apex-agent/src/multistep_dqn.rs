//! Multi-step DQN agent.
mod base;
mod config;
pub use base::MultistepDqn;
pub use config::MultistepDqnConfig;
