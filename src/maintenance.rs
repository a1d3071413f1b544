//! One-shot maintenance operations.
//!
//! Kept out of the steady-state pipeline; invoked via the `cleanup-history`
//! subcommand.

use tracing::info;

use crate::storage::{RecordStore, StoreError};

/// What a cleanup run touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    pub buckets_deleted: usize,
    pub entries_deleted: usize,
}

/// Delete the root history bucket of every field that also has a live-status
/// entry. Irreversible; intended as a one-time migration cleanup.
pub async fn cleanup_history(store: &dyn RecordStore) -> Result<CleanupSummary, StoreError> {
    let mut summary = CleanupSummary::default();

    for user in store.users().await? {
        let live_fields: Vec<String> = store
            .live_fields(&user)
            .await?
            .into_iter()
            .map(|(field, _)| field)
            .collect();

        for field in store.fields_with_history(&user).await? {
            if !live_fields.contains(&field) {
                continue;
            }

            let deleted = store.delete_history(&user, &field).await?;
            info!(
                user = %user,
                field = %field,
                entries = deleted,
                "Deleted root history bucket"
            );
            summary.buckets_deleted += 1;
            summary.entries_deleted += deleted;
        }
    }

    Ok(summary)
}
