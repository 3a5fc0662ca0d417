//! Deletion orchestrator
//!
//! Fragments go first, the record last. If any fragment cannot be removed
//! the record stays, so a retry can find the remaining fragments again.

use shv_core::{FileId, VaultError, VaultResult};
use shv_storage::{FragmentStore, RecordStore};
use tracing::{info, warn};

use crate::cleanup::delete_fragments;
use crate::vault::Vault;

impl<S: FragmentStore, R: RecordStore> Vault<S, R> {
    /// Remove every fragment of a file, then its record.
    pub async fn delete(&self, file_id: &FileId) -> VaultResult<()> {
        let record = self.lookup(file_id)?;

        let failures =
            delete_fragments(&self.store, &record.fragments, self.options.max_in_flight).await;
        if let Some((index, first)) = failures.into_iter().min_by_key(|(i, _)| *i) {
            warn!(file_id = %file_id, index, "record kept; fragment deletion incomplete");
            return Err(VaultError::FragmentUnavailable {
                index,
                reason: format!("{first:#}"),
            });
        }

        self.records
            .delete(file_id)
            .map_err(|e| VaultError::PersistenceFailed(format!("{e:#}")))?;

        info!(
            file_id = %file_id,
            name = %record.name,
            fragments = record.fragments.len(),
            "deleted"
        );
        Ok(())
    }
}
