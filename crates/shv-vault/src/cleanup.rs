//! Concurrent fragment removal shared by upload rollback and delete

use futures::StreamExt;
use shv_core::FragmentRef;
use shv_storage::FragmentStore;
use tracing::warn;

/// Attempt to delete every fragment, at most `max_in_flight` at a time.
///
/// Never stops early; returns `(index, error)` for each failure.
pub(crate) async fn delete_fragments<S: FragmentStore>(
    store: &S,
    fragments: &[FragmentRef],
    max_in_flight: usize,
) -> Vec<(u64, anyhow::Error)> {
    futures::stream::iter(fragments)
        .map(|fragment| async move {
            store
                .delete(&fragment.locator)
                .await
                .map_err(|e| (fragment.index, e))
        })
        .buffer_unordered(max_in_flight.max(1))
        .filter_map(|outcome| async move {
            match outcome {
                Ok(()) => None,
                Err((index, e)) => {
                    warn!(index, "fragment delete failed: {e:#}");
                    Some((index, e))
                }
            }
        })
        .collect()
        .await
}
