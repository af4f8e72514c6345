//! Linear action-value functions.
mod base;
mod config;
mod quantile;
pub use base::LinearQ;
pub use config::LinearQConfig;
pub use quantile::{LinearQuantile, LinearQuantileConfig};
