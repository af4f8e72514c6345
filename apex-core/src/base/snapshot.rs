//! Weight snapshots exchanged between the learner and actors.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameters keyed by name, each flattened to a vector.
pub type NamedParams = BTreeMap<String, Vec<f32>>;

/// An immutable copy of the learner's policy parameters.
///
/// `version` is the learner's optimization step count at the time of the copy, so
/// versions are non-decreasing over a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightSnapshot {
    /// Number of optimization steps the learner had performed.
    pub version: usize,

    /// Parameters.
    pub params: NamedParams,
}

impl WeightSnapshot {
    /// Constructs a snapshot.
    pub fn new(version: usize, params: NamedParams) -> Self {
        Self { version, params }
    }

    /// Serializes the snapshot.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserializes a snapshot.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Total number of scalar parameters.
    pub fn n_params(&self) -> usize {
        self.params.values().map(|v| v.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_preserve_params() -> Result<()> {
        let mut params = NamedParams::new();
        params.insert("w".to_string(), vec![0.5, -1.0, 2.0]);
        params.insert("b".to_string(), vec![0.0]);
        let snapshot = WeightSnapshot::new(7, params);

        let restored = WeightSnapshot::from_bytes(&snapshot.to_bytes()?)?;
        assert_eq!(restored, snapshot);
        assert_eq!(restored.n_params(), 4);
        Ok(())
    }
}
