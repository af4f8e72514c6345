//! Records and their values.
use crate::error::ApexError;
use chrono::prelude::{DateTime, Local};
use std::collections::{
    hash_map::{IntoIter, Iter, Keys},
    HashMap,
};

/// Value stored in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single value such as a loss.
    Scalar(f32),

    /// A timestamp.
    DateTime(DateTime<Local>),

    /// A vector of values such as per-actor statistics.
    Array1(Vec<f32>),

    /// A text value.
    String(String),
}

/// A set of named values.
#[derive(Debug, Clone, Default)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record holding a single scalar.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Keys in the record.
    pub fn keys(&self) -> Keys<'_, String, RecordValue> {
        self.0.keys()
    }

    /// Inserts a value, replacing any value with the same key.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Iterates over key-value pairs.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Iterates over key-value pairs, consuming the record.
    pub fn into_iter_in_record(self) -> IntoIter<String, RecordValue> {
        self.0.into_iter()
    }

    /// Value with the given key.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Merges two records. Values of `record` win on key collisions.
    pub fn merge(self, record: Record) -> Self {
        Record(self.0.into_iter().chain(record.0).collect())
    }

    /// Merges another record into this one. Values of `record` win on key collisions.
    pub fn merge_inplace(&mut self, record: Record) {
        self.0.extend(record.0);
    }

    /// Scalar with the given key.
    pub fn get_scalar(&self, k: &str) -> Result<f32, ApexError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(ApexError::RecordValueTypeError("Scalar".to_string())),
            None => Err(ApexError::RecordKeyError(k.to_string())),
        }
    }

    /// Vector with the given key.
    pub fn get_array1(&self, k: &str) -> Result<Vec<f32>, ApexError> {
        match self.0.get(k) {
            Some(RecordValue::Array1(v)) => Ok(v.clone()),
            Some(_) => Err(ApexError::RecordValueTypeError("Array1".to_string())),
            None => Err(ApexError::RecordKeyError(k.to_string())),
        }
    }

    /// String with the given key.
    pub fn get_string(&self, k: &str) -> Result<String, ApexError> {
        match self.0.get(k) {
            Some(RecordValue::String(s)) => Ok(s.clone()),
            Some(_) => Err(ApexError::RecordValueTypeError("String".to_string())),
            None => Err(ApexError::RecordKeyError(k.to_string())),
        }
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the record holds no values.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_borrow_the_record() {
        let mut record = Record::from_scalar("loss", 1.5);
        record.insert("beta", RecordValue::Scalar(0.4));
        let mut keys: Vec<&String> = record.keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["beta", "loss"]);
    }

    #[test]
    fn typed_access() {
        let mut record = Record::from_scalar("loss", 1.5);
        record.insert("name", RecordValue::String("apex".to_string()));

        assert_eq!(record.get_scalar("loss"), Ok(1.5));
        assert_eq!(record.get_string("name"), Ok("apex".to_string()));
        assert!(matches!(
            record.get_scalar("name"),
            Err(ApexError::RecordValueTypeError(_))
        ));
        assert!(matches!(
            record.get_array1("missing"),
            Err(ApexError::RecordKeyError(_))
        ));
    }

    #[test]
    fn merge_prefers_right() {
        let a = Record::from_slice(&[
            ("x", RecordValue::Scalar(1.0)),
            ("y", RecordValue::Scalar(2.0)),
        ]);
        let b = Record::from_scalar("y", 3.0);
        let merged = a.merge(b);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get_scalar("y"), Ok(3.0));
    }
}
