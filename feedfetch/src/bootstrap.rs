//! Run bootstrap
//!
//! Narrows the candidate list to identifiers the catalog does not hold yet.

use crate::db::CatalogStore;
use crate::utils::left_diff;
use feedfetch_common::Result;

/// Candidates minus identifiers already stored, in candidate order
pub async fn pending_identifiers(candidates: &[u64], store: &dyn CatalogStore) -> Result<Vec<u64>> {
    let known = store.known_ids().await?;
    let pending = left_diff(candidates, &known);

    tracing::info!(
        candidates = candidates.len(),
        known = known.len(),
        pending = pending.len(),
        "Bootstrap complete"
    );
    Ok(pending)
}
