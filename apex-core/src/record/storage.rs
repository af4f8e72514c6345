//! Aggregation of stored records.
use super::{Record, RecordValue};
use std::collections::HashSet;
use xxhash_rust::xxh3::Xxh3Builder;

/// Stores records and aggregates them per key.
///
/// Scalars seen once are passed through. Scalars seen several times are summarized
/// as `<key>_min`, `<key>_max`, `<key>_mean` and `<key>_median`. For other value
/// types the most recent value is kept. Values whose type differs from the first
/// value seen for the key are skipped.
#[derive(Default)]
pub struct RecordStorage {
    data: Vec<Record>,
}

fn median(mut vs: Vec<f32>) -> f32 {
    vs.sort_by(|x, y| x.total_cmp(y));
    vs[vs.len() / 2]
}

impl RecordStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self { data: vec![] }
    }

    /// Stores a record.
    pub fn store(&mut self, record: Record) {
        self.data.push(record);
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if no record is stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn get_keys(&self) -> HashSet<String, Xxh3Builder> {
        let mut keys = HashSet::<String, Xxh3Builder>::default();
        for record in self.data.iter() {
            for k in record.keys() {
                keys.insert(k.clone());
            }
        }
        keys
    }

    fn scalar(&self, key: &str) -> Record {
        let vs: Vec<f32> = self
            .data
            .iter()
            .filter_map(|record| match record.get(key) {
                Some(RecordValue::Scalar(v)) => Some(*v),
                _ => None,
            })
            .collect();

        match vs.len() {
            0 => Record::empty(),
            1 => Record::from_scalar(key, vs[0]),
            n => {
                let min = vs.iter().cloned().fold(f32::INFINITY, f32::min);
                let max = vs.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
                let mean = vs.iter().sum::<f32>() / n as f32;
                Record::from_slice(&[
                    (format!("{}_min", key), RecordValue::Scalar(min)),
                    (format!("{}_max", key), RecordValue::Scalar(max)),
                    (format!("{}_mean", key), RecordValue::Scalar(mean)),
                    (format!("{}_median", key), RecordValue::Scalar(median(vs))),
                ])
            }
        }
    }

    fn latest(&self, key: &str) -> Record {
        self.data
            .iter()
            .rev()
            .find_map(|record| record.get(key))
            .map(|value| Record::from_slice(&[(key, value.clone())]))
            .unwrap_or_else(Record::empty)
    }

    /// Aggregates the stored records and clears the storage.
    pub fn aggregate(&mut self) -> Record {
        let mut record = Record::empty();

        for key in self.get_keys().iter() {
            let first = self.data.iter().find_map(|record| record.get(key));
            let r = match first {
                Some(RecordValue::Scalar(..)) => self.scalar(key),
                Some(_) => self.latest(key),
                None => Record::empty(),
            };
            record.merge_inplace(r);
        }

        self.data = vec![];

        record
    }
}
