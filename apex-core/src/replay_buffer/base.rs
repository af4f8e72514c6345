//! Circular slot array composed with a priority index.
use super::{IwScheduler, PerConfig, ReplayBufferConfig, SlotIndex, SumTree, WindowBatch};
use crate::{aggregator::Window, error::ApexError};
use anyhow::Result;
use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Floor of sampling probabilities when computing importance weights.
const MIN_PROB: f64 = 1e-12;

/// State of prioritized sampling.
struct PerState {
    sum_tree: SumTree,
    iw_scheduler: IwScheduler,
    alpha: f32,
    uniform_sample_prob: f32,
    priority_eps: f32,
}

impl PerState {
    fn new(capacity: usize, per_config: &PerConfig) -> Self {
        Self {
            sum_tree: SumTree::new(capacity),
            iw_scheduler: per_config.into(),
            alpha: per_config.alpha,
            uniform_sample_prob: per_config.uniform_sample_prob,
            priority_eps: per_config.priority_eps,
        }
    }
}

/// Replay buffer of n-step windows.
///
/// Windows are written to the slot after the most recently written one, so the live
/// set is always the most recent `min(count, capacity)` windows and occupies slots
/// `[0, len())`. Every write bumps the slot's generation.
///
/// The buffer is not synchronized. The coordinator thread owns it and performs every
/// `store`, `batch` and `update_priority` call.
///
/// ```rust
/// use apex_core::{
///     aggregator::Window,
///     replay_buffer::{PerConfig, ReplayBuffer, ReplayBufferConfig},
/// };
///
/// let config = ReplayBufferConfig::default()
///     .capacity(8)
///     .per_config(Some(PerConfig::default()));
/// let mut buffer = ReplayBuffer::<Vec<f32>, usize>::build(&config).unwrap();
/// for _ in 0..4 {
///     buffer.store(Window {
///         state: vec![0.0], action: 0, rewards: vec![1.0], dones: vec![false],
///         next_state: vec![0.0], n_step: 1,
///     });
/// }
/// let batch = buffer.batch(2, 0.4).unwrap();
/// for ix in batch.ixs.iter() {
///     let p = buffer.priority_from_td_error(0.5);
///     buffer.update_priority(ix, p).unwrap();
/// }
/// ```
pub struct ReplayBuffer<O, A> {
    capacity: usize,

    /// Next slot to write.
    i: usize,

    /// Number of live windows.
    size: usize,

    slots: Vec<Window<O, A>>,
    generations: Vec<u64>,
    rng: StdRng,
    per_state: Option<PerState>,
}

impl<O: Clone, A: Clone> ReplayBuffer<O, A> {
    /// Builds a replay buffer, failing on out-of-domain parameters.
    pub fn build(config: &ReplayBufferConfig) -> Result<Self> {
        config.validate()?;
        let capacity = config.capacity;
        info!(
            "Built replay buffer with capacity {}, prioritized: {}",
            capacity,
            config.per_config.is_some()
        );
        Ok(Self {
            capacity,
            i: 0,
            size: 0,
            slots: Vec::with_capacity(capacity.min(1 << 16)),
            generations: vec![0; capacity],
            rng: StdRng::seed_from_u64(config.seed),
            per_state: config
                .per_config
                .as_ref()
                .map(|per_config| PerState::new(capacity, per_config)),
        })
    }

    /// Maximum number of windows.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live windows.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if nothing was stored yet.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns `true` if sampling is prioritized.
    pub fn is_prioritized(&self) -> bool {
        self.per_state.is_some()
    }

    /// Window in a live slot.
    pub fn get(&self, slot: usize) -> Option<&Window<O, A>> {
        self.slots.get(slot)
    }

    /// Stores a window in the next slot and returns its index.
    ///
    /// The slot gets the largest priority seen so far, or 1 for the first write.
    pub fn store(&mut self, window: Window<O, A>) -> SlotIndex {
        let slot = self.i;
        if slot < self.slots.len() {
            self.slots[slot] = window;
        } else {
            self.slots.push(window);
        }
        self.generations[slot] += 1;

        if let Some(per_state) = self.per_state.as_mut() {
            let p = per_state.sum_tree.max_priority();
            // In range and finite by construction.
            let _ = per_state.sum_tree.set(slot, p);
        }

        self.i = (self.i + 1) % self.capacity;
        self.size = (self.size + 1).min(self.capacity);

        SlotIndex {
            slot,
            generation: self.generations[slot],
        }
    }

    /// Samples `batch_size` windows with replacement.
    ///
    /// Each draw is uniform over live slots with probability `uniform_sample_prob`,
    /// and proportional to priority otherwise. The importance weight of a draw with
    /// probability `P` is `(1 / (N * P))^beta`, divided by the batch maximum.
    /// Without prioritization all draws are uniform and all weights are 1.
    pub fn batch(
        &mut self,
        batch_size: usize,
        beta: f32,
    ) -> Result<WindowBatch<O, A>, ApexError> {
        if batch_size == 0 || self.size < batch_size {
            return Err(ApexError::InsufficientData {
                live: self.size,
                requested: batch_size,
            });
        }
        let live = self.size;

        let (ixs, weights, sampled_p, mean_p) = match self.per_state.as_ref() {
            None => {
                let ixs: Vec<usize> = (0..batch_size)
                    .map(|_| self.rng.gen_range(0..live))
                    .collect();
                (ixs, vec![1f32; batch_size], 1.0, 1.0)
            }
            Some(per_state) => {
                let tree = &per_state.sum_tree;
                let total = tree.total();
                let ixs: Vec<usize> = (0..batch_size)
                    .map(|_| {
                        if total <= 0.0 || self.rng.gen::<f32>() < per_state.uniform_sample_prob
                        {
                            self.rng.gen_range(0..live)
                        } else {
                            tree.sample(self.rng.gen::<f32>()).0
                        }
                    })
                    .collect();

                let ps: Vec<f32> = ixs.iter().map(|&ix| tree.get(ix)).collect();
                let ws: Vec<f64> = ps
                    .iter()
                    .map(|&p| {
                        let prob = if total > 0.0 {
                            (p as f64 / total as f64).max(MIN_PROB)
                        } else {
                            1.0 / live as f64
                        };
                        (1.0 / (live as f64 * prob)).powf(beta as f64)
                    })
                    .collect();
                let w_max = ws.iter().cloned().fold(f64::MIN_POSITIVE, f64::max);
                let weights = ws.iter().map(|w| (w / w_max) as f32).collect();
                let sampled_p = ps.iter().sum::<f32>() / batch_size as f32;
                let mean_p = total / live as f32;
                (ixs, weights, sampled_p, mean_p)
            }
        };

        Ok(WindowBatch {
            windows: ixs.iter().map(|&ix| self.slots[ix].clone()).collect(),
            ixs: ixs
                .iter()
                .map(|&slot| SlotIndex {
                    slot,
                    generation: self.generations[slot],
                })
                .collect(),
            weights,
            sampled_p,
            mean_p,
        })
    }

    /// Sets the priority of a sampled slot.
    ///
    /// Fails with [`ApexError::InvalidSlot`] if the slot is out of range, was never
    /// written, or was overwritten since it was sampled. The update is not applied in
    /// those cases. Without prioritization valid updates are ignored.
    pub fn update_priority(&mut self, ix: &SlotIndex, priority: f32) -> Result<(), ApexError> {
        if ix.slot >= self.size {
            return Err(ApexError::InvalidSlot {
                slot: ix.slot,
                reason: format!("not live ({} live slots)", self.size),
            });
        }
        if self.generations[ix.slot] != ix.generation {
            return Err(ApexError::InvalidSlot {
                slot: ix.slot,
                reason: format!(
                    "overwritten (generation {} != {})",
                    self.generations[ix.slot], ix.generation
                ),
            });
        }
        match self.per_state.as_mut() {
            Some(per_state) => per_state.sum_tree.set(ix.slot, priority),
            None => Ok(()),
        }
    }

    /// Converts an absolute TD error into a stored priority, `(|td| + eps)^alpha`.
    ///
    /// Returns 1 without prioritization.
    pub fn priority_from_td_error(&self, td_error: f32) -> f32 {
        match self.per_state.as_ref() {
            Some(per_state) => (td_error.abs() + per_state.priority_eps).powf(per_state.alpha),
            None => 1.0,
        }
    }

    /// Exponent of importance weights at the given environment step.
    pub fn beta(&self, env_step: usize) -> f32 {
        match self.per_state.as_ref() {
            Some(per_state) => per_state.iw_scheduler.beta(env_step),
            None => 0.0,
        }
    }

    /// Probability that a prioritized draw picks the slot.
    pub fn probability(&self, slot: usize) -> Option<f32> {
        let per_state = self.per_state.as_ref()?;
        let total = per_state.sum_tree.total();
        if slot >= self.size || total <= 0.0 {
            None
        } else {
            Some(per_state.sum_tree.get(slot) / total)
        }
    }

    /// Priorities of live slots, empty without prioritization.
    pub fn priorities(&self) -> Vec<f32> {
        match self.per_state.as_ref() {
            Some(per_state) => per_state.sum_tree.leaves()[..self.size].to_vec(),
            None => vec![],
        }
    }

    /// Writes saved priorities back into live slots, in slot order.
    ///
    /// Entries beyond the live range are ignored. Returns the number of slots written.
    pub fn restore_priorities(&mut self, priorities: &[f32]) -> Result<usize, ApexError> {
        let n = priorities.len().min(self.size);
        if let Some(per_state) = self.per_state.as_mut() {
            for (slot, &p) in priorities[..n].iter().enumerate() {
                per_state.sum_tree.set(slot, p)?;
            }
            Ok(n)
        } else {
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    type Buffer = ReplayBuffer<Vec<f32>, usize>;

    fn window(marker: f32) -> Window<Vec<f32>, usize> {
        Window {
            state: vec![marker],
            action: 0,
            rewards: vec![marker],
            dones: vec![false],
            next_state: vec![marker],
            n_step: 1,
        }
    }

    fn per_buffer(capacity: usize, uniform_sample_prob: f32) -> Buffer {
        let config = ReplayBufferConfig::default().capacity(capacity).per_config(Some(
            PerConfig::default()
                .alpha(0.6)
                .uniform_sample_prob(uniform_sample_prob),
        ));
        Buffer::build(&config).unwrap()
    }

    #[test]
    fn batch_before_warmup_is_insufficient() {
        let mut buffer = per_buffer(16, 0.0);
        for i in 0..3 {
            buffer.store(window(i as f32));
        }
        assert_eq!(
            buffer.batch(4, 0.4).unwrap_err(),
            ApexError::InsufficientData {
                live: 3,
                requested: 4
            }
        );
        assert!(buffer.batch(3, 0.4).is_ok());
    }

    #[test]
    fn ring_overwrite_keeps_most_recent() {
        let capacity = 10;
        let mut buffer = per_buffer(capacity, 0.0);
        let early: Vec<SlotIndex> = (0..capacity).map(|i| buffer.store(window(i as f32))).collect();
        for i in capacity..capacity + 5 {
            buffer.store(window(i as f32));
        }
        assert_eq!(buffer.len(), capacity);

        // Slots 0..5 were overwritten, their old indices are stale.
        for ix in early[..5].iter() {
            assert!(matches!(
                buffer.update_priority(ix, 100.0),
                Err(ApexError::InvalidSlot { .. })
            ));
        }
        for ix in early[5..].iter() {
            assert!(buffer.update_priority(ix, 0.5).is_ok());
        }

        for _ in 0..200 {
            let batch = buffer.batch(8, 0.4).unwrap();
            for w in batch.windows.iter() {
                assert!(w.rewards[0] >= 5.0);
            }
        }
    }

    #[test]
    fn out_of_range_update_is_invalid() {
        let mut buffer = per_buffer(4, 0.0);
        buffer.store(window(0.0));
        let ix = SlotIndex {
            slot: 2,
            generation: 0,
        };
        assert!(matches!(
            buffer.update_priority(&ix, 1.0),
            Err(ApexError::InvalidSlot { slot: 2, .. })
        ));
    }

    #[test]
    fn sampling_follows_priorities() {
        let mut buffer = per_buffer(4, 0.0);
        let ixs: Vec<_> = (0..4).map(|i| buffer.store(window(i as f32))).collect();
        let priorities = [1.0, 2.0, 3.0, 4.0];
        for (ix, p) in ixs.iter().zip(priorities.iter()) {
            buffer.update_priority(ix, *p).unwrap();
        }

        let n_draws = 20_000;
        let mut counts = [0usize; 4];
        // Batches can not exceed the live windows.
        for _ in 0..n_draws / 4 {
            let batch = buffer.batch(4, 0.4).unwrap();
            for ix in batch.ixs.iter() {
                counts[ix.slot] += 1;
            }
        }
        for (count, p) in counts.iter().zip(priorities.iter()) {
            let freq = *count as f32 / n_draws as f32;
            assert!((freq - p / 10.0).abs() < 0.02, "freq {} for p {}", freq, p);
        }
    }

    #[test]
    fn weights_are_normalized_by_batch_max() {
        let mut buffer = per_buffer(64, 1e-3);
        let ixs: Vec<_> = (0..64).map(|i| buffer.store(window(i as f32))).collect();
        for (i, ix) in ixs.iter().enumerate() {
            buffer.update_priority(ix, 0.01 + i as f32).unwrap();
        }
        for beta in [0.0, 0.4, 1.0] {
            for _ in 0..20 {
                let batch = buffer.batch(16, beta).unwrap();
                let w_max = batch.weights.iter().cloned().fold(f32::MIN, f32::max);
                assert!((w_max - 1.0).abs() < 1e-6);
                assert!(batch.weights.iter().all(|w| *w >= 0.0 && w.is_finite()));
            }
        }
    }

    #[test]
    fn priority_update_changes_probability() {
        let mut buffer = per_buffer(8, 0.0);
        let ixs: Vec<_> = (0..8).map(|i| buffer.store(window(i as f32))).collect();
        assert!((buffer.probability(3).unwrap() - 0.125).abs() < 1e-6);

        let p = buffer.priority_from_td_error(2.0);
        assert!((p - (2.0f32 + 1e-6).powf(0.6)).abs() < 1e-5);
        buffer.update_priority(&ixs[3], p).unwrap();

        let total = 7.0 + p;
        assert!((buffer.probability(3).unwrap() - p / total).abs() < 1e-6);

        let mut hits = 0;
        let n_draws = 20_000;
        for _ in 0..n_draws / 8 {
            let batch = buffer.batch(8, 0.4).unwrap();
            hits += batch.ixs.iter().filter(|ix| ix.slot == 3).count();
        }
        let freq = hits as f32 / n_draws as f32;
        assert!((freq - p / total).abs() < 0.02);
    }

    #[test]
    fn new_windows_get_max_priority() {
        let mut buffer = per_buffer(8, 0.0);
        let ix = buffer.store(window(0.0));
        assert_eq!(buffer.priorities(), vec![1.0]);
        buffer.update_priority(&ix, 5.0).unwrap();
        buffer.store(window(1.0));
        assert_eq!(buffer.priorities(), vec![5.0, 5.0]);
    }

    #[test]
    fn uniform_buffer_has_unit_weights() {
        let mut buffer = Buffer::build(&ReplayBufferConfig::default().capacity(8)).unwrap();
        let ix = buffer.store(window(0.0));
        buffer.store(window(1.0));
        let batch = buffer.batch(2, 0.4).unwrap();
        assert_eq!(batch.weights, vec![1.0, 1.0]);
        assert!(buffer.update_priority(&ix, 3.0).is_ok());
        assert_eq!(buffer.priority_from_td_error(3.0), 1.0);
        assert!(buffer.priorities().is_empty());
    }

    #[test]
    fn priorities_restore_into_live_slots() {
        let mut buffer = per_buffer(8, 0.0);
        for i in 0..4 {
            buffer.store(window(i as f32));
        }
        let n = buffer
            .restore_priorities(&[0.5, 1.5, 2.5, 3.5, 4.5])
            .unwrap();
        assert_eq!(n, 4);
        assert_eq!(buffer.priorities(), vec![0.5, 1.5, 2.5, 3.5]);
    }
}
