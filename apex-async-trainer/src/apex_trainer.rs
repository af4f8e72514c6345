//! Coordinator loop.
mod base;
mod config;
mod stat;
pub use base::ApexTrainer;
pub use config::ApexTrainerConfig;
pub use stat::ApexTrainStat;
