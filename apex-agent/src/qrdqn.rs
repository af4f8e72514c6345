//! Distributional DQN with quantile regression.
mod base;
mod config;
pub use base::QrDqn;
pub use config::QrDqnConfig;
