//! Catalog store
//!
//! Every write goes through [`CatalogStore::persist_batch`], one transaction
//! per flushed buffer.

use super::podcasts::{insert_podcast, load_known_ids};
use crate::models::LookupResult;
use crate::utils::begin_timed;
use async_trait::async_trait;
use feedfetch_common::Result;
use sqlx::SqlitePool;

/// Persistence collaborator for harvested lookup results
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// iTunes ids already stored
    async fn known_ids(&self) -> Result<Vec<u64>>;

    /// Store `results` in one transaction
    ///
    /// Genres and artists are resolved or created by name. Results whose
    /// iTunes id is already stored are skipped.
    ///
    /// # Returns
    /// Number of podcast rows inserted
    async fn persist_batch(&self, results: &[LookupResult]) -> Result<u64>;
}

/// SQLite-backed catalog
#[derive(Clone)]
pub struct SqliteCatalogStore {
    pool: SqlitePool,
}

impl SqliteCatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn known_ids(&self) -> Result<Vec<u64>> {
        load_known_ids(&self.pool).await
    }

    async fn persist_batch(&self, results: &[LookupResult]) -> Result<u64> {
        let mut timed = begin_timed(&self.pool, "persist_batch").await?;

        let mut inserted = 0u64;
        for result in results {
            if insert_podcast(&mut **timed.tx()?, result).await? {
                inserted += 1;
            }
        }

        timed.commit().await?;

        tracing::debug!(
            submitted = results.len(),
            inserted,
            skipped = results.len() as u64 - inserted,
            "Persisted result batch"
        );
        Ok(inserted)
    }
}
