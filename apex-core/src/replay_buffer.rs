//! Replay buffer of n-step windows with prioritized sampling.
//!
//! [`ReplayBuffer`] stores [`Window`](crate::aggregator::Window)s in a circular array
//! of `capacity` slots. With a [`PerConfig`], slot priorities live in a [`SumTree`]
//! and batches are drawn in proportion to them, with importance weights correcting
//! for the non-uniform sampling.
//!
//! Priorities are stored already raised to `alpha`. The learner converts absolute
//! TD errors with [`ReplayBuffer::priority_from_td_error`] and pushes them back with
//! [`ReplayBuffer::update_priority`], so the probability of drawing a slot is its
//! stored priority divided by the total.
mod base;
mod batch;
mod config;
mod iw_scheduler;
mod sum_tree;
pub use base::ReplayBuffer;
pub use batch::{SlotIndex, WindowBatch};
pub use config::{PerConfig, ReplayBufferConfig};
pub use iw_scheduler::IwScheduler;
pub use sum_tree::SumTree;
