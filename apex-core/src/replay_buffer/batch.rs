//! Batches sampled from the replay buffer.
use crate::aggregator::Window;

/// Position of a window in the buffer, stamped with the slot's write generation.
///
/// The generation lets the buffer detect priority updates that arrive after the slot
/// was overwritten by a later window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotIndex {
    /// Slot in `[0, capacity)`.
    pub slot: usize,

    /// Number of writes to the slot when it was sampled.
    pub generation: u64,
}

/// A batch of windows with their importance weights.
#[derive(Debug, Clone)]
pub struct WindowBatch<O, A> {
    /// Sampled windows.
    pub windows: Vec<Window<O, A>>,

    /// Importance weights normalized so that the largest is 1.
    pub weights: Vec<f32>,

    /// Where each window came from, used to push priorities back.
    pub ixs: Vec<SlotIndex>,

    /// Mean priority of the sampled slots.
    pub sampled_p: f32,

    /// Mean priority over live slots.
    pub mean_p: f32,
}

impl<O, A> WindowBatch<O, A> {
    /// Number of windows.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Returns `true` if the batch holds no windows.
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
