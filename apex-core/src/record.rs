//! Key-value records reporting what the learner and actors did.
//!
//! Agents return a [`Record`] from every learn or process step. The trainer hands
//! them to an [`AggregateRecorder`], which stores them and periodically flushes
//! values aggregated with [`RecordStorage`].
//!
//! ```rust
//! use apex_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("loss", 0.25);
//! record.insert("epsilon", RecordValue::Scalar(0.4));
//! assert_eq!(record.get_scalar("loss").unwrap(), 0.25);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;
mod storage;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::{AggregateRecorder, Recorder};
pub use storage::RecordStorage;
