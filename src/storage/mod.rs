//! System-of-record access.
//!
//! The external realtime database is a path-addressed key-value tree; this
//! module expresses the slice of it the pipeline touches as an explicit
//! ordered-by-timestamp time-series abstraction with "latest" and "tail-N"
//! operations, independent of the backing store's key-ordering semantics.
//!
//! [`RecordStore`] is the evaluator's interface boundary; [`SledStore`] is
//! the shipped implementation, with timestamp-keyed sled trees named after
//! the record paths.

mod sled_store;

pub use sled_store::SledStore;

use async_trait::async_trait;

use crate::types::{FieldStatus, PredictionRecord, RiskLevel, SensorSample};

/// Errors from the record store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The slice of the system of record the evaluation pipeline reads and writes.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All known user identifiers.
    async fn users(&self) -> Result<Vec<String>, StoreError>;

    /// Live status of every field owned by a user.
    async fn live_fields(&self, user: &str) -> Result<Vec<(String, FieldStatus)>, StoreError>;

    /// Overwrite the field's prediction record, atomically as one value.
    async fn write_prediction(
        &self,
        user: &str,
        field: &str,
        record: &PredictionRecord,
    ) -> Result<(), StoreError>;

    /// Overwrite one probe's risk classification.
    async fn write_probe_prediction(
        &self,
        user: &str,
        field: &str,
        probe: &str,
        risk: RiskLevel,
    ) -> Result<(), StoreError>;

    /// Last `n` valid samples from the historical log, oldest first.
    ///
    /// Entries that fail validation are dropped after the tail is taken, so
    /// the result may be shorter than `n` even when the log is longer.
    async fn historical_tail(
        &self,
        user: &str,
        field: &str,
        n: usize,
    ) -> Result<Vec<SensorSample>, StoreError>;

    /// Timestamp of the most recent archive entry, if any.
    async fn latest_archive_timestamp(
        &self,
        user: &str,
        field: &str,
    ) -> Result<Option<u64>, StoreError>;

    /// Append a sample to the archive, keyed by its timestamp.
    async fn append_archive(
        &self,
        user: &str,
        field: &str,
        sample: &SensorSample,
    ) -> Result<(), StoreError>;

    /// Fields of a user that still have a non-empty root history bucket.
    async fn fields_with_history(&self, user: &str) -> Result<Vec<String>, StoreError>;

    /// Delete a field's root history bucket. Returns the entry count removed.
    async fn delete_history(&self, user: &str, field: &str) -> Result<usize, StoreError>;
}
