//! Sum tree for prioritized sampling.
use crate::error::ApexError;

/// Array-backed complete binary tree over `capacity` slots.
///
/// Leaves hold slot priorities and every internal node holds the sum of its subtree.
/// The tree is 1-indexed with the root at index 1, and the leaf layer is padded to a
/// power of two with zero priorities. Ancestors are recomputed from their children on
/// every write rather than shifted by a delta, so rounding errors do not accumulate.
#[derive(Debug, Clone)]
pub struct SumTree {
    capacity: usize,
    n_leaves: usize,
    tree: Vec<f32>,
    max_priority: f32,
}

impl SumTree {
    /// Creates a tree whose priorities are all zero.
    pub fn new(capacity: usize) -> Self {
        let n_leaves = capacity.max(1).next_power_of_two();
        Self {
            capacity,
            n_leaves,
            tree: vec![0.0; 2 * n_leaves],
            max_priority: 0.0,
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sets the priority of a slot.
    pub fn set(&mut self, slot: usize, priority: f32) -> Result<(), ApexError> {
        if slot >= self.capacity {
            return Err(ApexError::InvalidSlot {
                slot,
                reason: format!("out of range [0, {})", self.capacity),
            });
        }
        if !priority.is_finite() || priority < 0.0 {
            return Err(ApexError::InvalidPriority(priority));
        }

        let mut ix = slot + self.n_leaves;
        self.tree[ix] = priority;
        while ix > 1 {
            ix /= 2;
            self.tree[ix] = self.tree[2 * ix] + self.tree[2 * ix + 1];
        }
        self.max_priority = self.max_priority.max(priority);
        Ok(())
    }

    /// Priority of a slot, zero for slots outside the range.
    pub fn get(&self, slot: usize) -> f32 {
        if slot >= self.capacity {
            0.0
        } else {
            self.tree[slot + self.n_leaves]
        }
    }

    /// Sum of all priorities.
    pub fn total(&self) -> f32 {
        self.tree[1]
    }

    /// Largest priority ever set, `1.0` before the first write.
    ///
    /// New slots start with this value so they are likely to be sampled before the
    /// learner corrects their priority.
    pub fn max_priority(&self) -> f32 {
        if self.max_priority > 0.0 {
            self.max_priority
        } else {
            1.0
        }
    }

    /// Locates the slot whose cumulative priority range contains `u * total()`.
    ///
    /// `u` is expected in `[0, 1)`. Returns the slot and its priority. Descent never
    /// enters a subtree whose sum is zero, so zero-priority slots are never returned
    /// while the total is positive.
    pub fn sample(&self, u: f32) -> (usize, f32) {
        let mut target = u.clamp(0.0, 1.0) * self.total();
        let mut ix = 1;
        while ix < self.n_leaves {
            let left = 2 * ix;
            let right = left + 1;
            if target < self.tree[left] || self.tree[right] <= 0.0 {
                ix = left;
            } else {
                target -= self.tree[left];
                ix = right;
            }
        }
        let slot = (ix - self.n_leaves).min(self.capacity.saturating_sub(1));
        (slot, self.tree[slot + self.n_leaves])
    }

    /// Priorities of all slots.
    pub fn leaves(&self) -> &[f32] {
        &self.tree[self.n_leaves..self.n_leaves + self.capacity]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn total_matches_leaves_over_random_updates() {
        let mut rng = StdRng::seed_from_u64(42);
        for capacity in [1usize, 3, 8, 13, 100] {
            let mut tree = SumTree::new(capacity);
            for _ in 0..2000 {
                let slot = rng.gen_range(0..capacity);
                let p: f32 = rng.gen_range(0.0..10.0);
                tree.set(slot, p).unwrap();
                let sum: f32 = tree.leaves().iter().sum();
                assert!(
                    (tree.total() - sum).abs() <= 1e-3 * sum.max(1.0),
                    "total {} != sum {}",
                    tree.total(),
                    sum
                );
            }
        }
    }

    #[test]
    fn rejects_bad_writes() {
        let mut tree = SumTree::new(4);
        assert!(matches!(
            tree.set(4, 1.0),
            Err(ApexError::InvalidSlot { slot: 4, .. })
        ));
        assert!(matches!(
            tree.set(0, -1.0),
            Err(ApexError::InvalidPriority(_))
        ));
        assert!(matches!(
            tree.set(0, f32::NAN),
            Err(ApexError::InvalidPriority(_))
        ));
        assert_eq!(tree.total(), 0.0);
    }

    #[test]
    fn sample_walks_cumulative_ranges() {
        let mut tree = SumTree::new(3);
        tree.set(0, 1.0).unwrap();
        tree.set(1, 2.0).unwrap();
        tree.set(2, 1.0).unwrap();

        assert_eq!(tree.sample(0.0).0, 0);
        assert_eq!(tree.sample(0.24).0, 0);
        assert_eq!(tree.sample(0.26).0, 1);
        assert_eq!(tree.sample(0.74).0, 1);
        assert_eq!(tree.sample(0.76).0, 2);
        assert_eq!(tree.sample(0.999).0, 2);
    }

    #[test]
    fn zero_priority_slots_are_skipped() {
        let mut tree = SumTree::new(5);
        tree.set(1, 3.0).unwrap();
        for u in [0.0, 0.3, 0.6, 0.9, 0.9999] {
            assert_eq!(tree.sample(u).0, 1);
        }
    }

    #[test]
    fn max_priority_tracks_writes() {
        let mut tree = SumTree::new(4);
        assert_eq!(tree.max_priority(), 1.0);
        tree.set(0, 0.5).unwrap();
        assert_eq!(tree.max_priority(), 0.5);
        tree.set(1, 3.0).unwrap();
        tree.set(1, 0.1).unwrap();
        assert_eq!(tree.max_priority(), 3.0);
    }
}
