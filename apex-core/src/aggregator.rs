//! Folding per-stream transitions into n-step windows.
//!
//! Each rollout stream (one per actor) keeps a bounded FIFO of its last `n`
//! unconsumed [`Transition`](crate::Transition)s. Once the FIFO is full, every new
//! transition yields one [`Window`] spanning the FIFO and the oldest item is dropped.
//! When an episode ends, every remaining suffix of the FIFO is emitted as a
//! truncated window and the FIFO is cleared, so each transition heads exactly one
//! window and no window crosses an episode boundary.
//!
//! ```rust
//! use apex_core::{aggregator::{AggregatorConfig, TransitionAggregator}, Transition};
//!
//! let mut agg = TransitionAggregator::<Vec<f32>, usize>::build(&AggregatorConfig::default().n_step(2)).unwrap();
//! let tr = |done| Transition::new(vec![0.0], 0, 1.0, vec![0.0], done);
//! assert_eq!(agg.push(0, tr(false)).len(), 0);
//! assert_eq!(agg.push(0, tr(false)).len(), 1);
//! assert_eq!(agg.push(0, tr(true)).len(), 2);
//! ```
mod base;
mod config;
mod window;
pub use base::TransitionAggregator;
pub use config::AggregatorConfig;
pub use window::Window;
