//! Throttled history archiving.
//!
//! Archive writes are record keeping, not prediction input: the evaluator
//! proceeds to scoring whatever happens here. Entries are keyed by sample
//! timestamp and spaced at least [`ARCHIVE_MIN_INTERVAL_MS`] apart, except
//! for the very first entry of a field.

use crate::config::defaults::ARCHIVE_MIN_INTERVAL_MS;
use crate::storage::{RecordStore, StoreError};
use crate::types::SensorSample;

/// What the archiver did with a live sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// First archive entry for this field.
    First,
    /// Appended; the minimum interval had elapsed.
    Appended,
    /// Within the throttle window; nothing written.
    Throttled { elapsed_ms: u64 },
}

/// Archive a live sample unless the previous entry is too recent.
pub async fn archive_sample(
    store: &dyn RecordStore,
    user: &str,
    field: &str,
    sample: &SensorSample,
) -> Result<ArchiveOutcome, StoreError> {
    let Some(last_ts) = store.latest_archive_timestamp(user, field).await? else {
        store.append_archive(user, field, sample).await?;
        return Ok(ArchiveOutcome::First);
    };

    let elapsed_ms = sample.timestamp_ms.saturating_sub(last_ts);
    if elapsed_ms < ARCHIVE_MIN_INTERVAL_MS {
        return Ok(ArchiveOutcome::Throttled { elapsed_ms });
    }

    store.append_archive(user, field, sample).await?;
    Ok(ArchiveOutcome::Appended)
}
