//! End-to-end harvest tests
//!
//! Run the full fetch / orchestrate / persist pipeline against a fake lookup
//! API and a real SQLite catalog in a temp directory.

use async_trait::async_trait;
use feedfetch::db::{CatalogStore, SqliteCatalogStore};
use feedfetch::models::LookupResult;
use feedfetch::{harvest, HarvestError};
use feedfetch::services::{LookupTransport, TransportError};
use feedfetch_common::config::TomlConfig;
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Lookup API double
///
/// Every id is known. A request carrying any id not seen before answers
/// 503; ids in `untitled` come back with a blank title.
struct FakeLookupApi {
    calls: AtomicUsize,
    seen_ids: Mutex<HashSet<u64>>,
    untitled: Vec<u64>,
}

impl FakeLookupApi {
    fn new(untitled: Vec<u64>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            seen_ids: Mutex::new(HashSet::new()),
            untitled,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LookupTransport for FakeLookupApi {
    async fn get(&self, url: &str) -> Result<String, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let ids: Vec<u64> = url
            .split("id=")
            .nth(1)
            .unwrap()
            .split(',')
            .map(|id| id.parse().unwrap())
            .collect();

        let mut seen = self.seen_ids.lock().unwrap();
        let first_sighting = ids.iter().fold(false, |fresh, id| seen.insert(*id) || fresh);
        drop(seen);
        if first_sighting {
            return Err(TransportError::Status(503));
        }

        let results: Vec<_> = ids
            .iter()
            .map(|id| {
                let title = if self.untitled.contains(id) {
                    String::new()
                } else {
                    format!("Podcast {id}")
                };
                json!({
                    "wrapperType": "track",
                    "kind": "podcast",
                    "collectionId": id,
                    "collectionName": title,
                    "collectionCensoredName": "",
                    "artistId": 1000 + id % 3,
                    "artistName": format!("Network {}", id % 3),
                    "feedUrl": format!("https://feeds.example.com/{id}.xml"),
                    "primaryGenreName": "Technology",
                    "genres": ["Technology", "Podcasts"]
                })
            })
            .collect();

        Ok(json!({ "resultCount": results.len(), "results": results }).to_string())
    }
}

fn test_config(dir: &TempDir) -> TomlConfig {
    let mut config = TomlConfig::default();
    config.lookup.base_url = "http://lookup.test/lookup".to_string();
    config.lookup.concurrent_fetches = 2;
    config.lookup.max_ids_per_fetch = 3;
    config.lookup.tick_interval_ms = 5;
    config.persistence.database_path = dir.path().join("catalog.db");
    config.persistence.save_threshold = 4;
    config.persistence.backoff_schedule_secs = Vec::new();
    config
}

async fn open_store(config: &TomlConfig) -> Arc<SqliteCatalogStore> {
    let pool = feedfetch_common::db::init_database(&config.persistence.database_path)
        .await
        .unwrap();
    Arc::new(SqliteCatalogStore::new(pool))
}

#[tokio::test]
async fn test_harvest_persists_every_titled_podcast() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let store = open_store(&config).await;
    let api = Arc::new(FakeLookupApi::new(vec![7]));

    let candidates: Vec<u64> = (1..=14).collect();
    let report = harvest(
        &config,
        api.clone(),
        store.clone(),
        candidates,
        std::future::pending::<()>(),
    )
    .await
    .unwrap();

    assert_eq!(report.seeded, 14);
    assert_eq!(report.rows_persisted, 13);
    assert_eq!(report.failed_ids, vec![7]);
    assert_eq!(report.remaining, 0);
    // Every id sat in one failed batch before succeeding
    assert!(report.requeued >= 14);

    let mut known = store.known_ids().await.unwrap();
    known.sort_unstable();
    let expected: Vec<u64> = (1..=14).filter(|id| *id != 7).collect();
    assert_eq!(known, expected);

    let artists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM artists")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(artists, 3);

    let censored: String = sqlx::query_scalar("SELECT censored_title FROM podcasts WHERE itunes_id = 1")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(censored, "Podcast 1");
}

#[tokio::test]
async fn test_rerun_only_fetches_missing_ids() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let store = open_store(&config).await;

    let first_api = Arc::new(FakeLookupApi::new(Vec::new()));
    harvest(&config, first_api, store.clone(), (1..=5).collect(), std::future::pending::<()>())
        .await
        .unwrap();

    let second_api = Arc::new(FakeLookupApi::new(Vec::new()));
    let report = harvest(
        &config,
        second_api.clone(),
        store.clone(),
        (1..=5).collect(),
        std::future::pending::<()>(),
    )
    .await
    .unwrap();

    assert_eq!(report.seeded, 0);
    assert_eq!(report.rows_persisted, 0);
    assert_eq!(second_api.calls(), 0);

    let third_api = Arc::new(FakeLookupApi::new(Vec::new()));
    let report = harvest(&config, third_api, store.clone(), (1..=8).collect(), std::future::pending::<()>())
        .await
        .unwrap();

    assert_eq!(report.seeded, 3);
    assert_eq!(report.rows_persisted, 3);
    assert_eq!(store.known_ids().await.unwrap().len(), 8);
}

#[tokio::test]
async fn test_shutdown_leaves_unfetched_ids_for_next_run() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let store = open_store(&config).await;
    let api = Arc::new(FakeLookupApi::new(Vec::new()));

    let candidates: Vec<u64> = (1..=60).collect();
    let report = harvest(&config, api, store.clone(), candidates, async {})
        .await
        .unwrap();

    // Nothing is lost: every id is either stored or still pending
    assert!(report.remaining > 0);
    assert_eq!(report.rows_persisted as usize + report.remaining, 60);
    assert!(report.failed_ids.is_empty());
    assert_eq!(
        store.known_ids().await.unwrap().len() as u64,
        report.rows_persisted
    );
}

/// Catalog whose first `failures` writes fail before reaching SQLite
struct UnreliableCatalog {
    inner: SqliteCatalogStore,
    failures: usize,
    attempts: AtomicUsize,
}

#[async_trait]
impl CatalogStore for UnreliableCatalog {
    async fn known_ids(&self) -> feedfetch_common::Result<Vec<u64>> {
        self.inner.known_ids().await
    }

    async fn persist_batch(&self, results: &[LookupResult]) -> feedfetch_common::Result<u64> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(feedfetch_common::Error::Internal("database is locked".to_string()));
        }
        self.inner.persist_batch(results).await
    }
}

async fn unreliable_store(config: &TomlConfig, failures: usize) -> Arc<UnreliableCatalog> {
    let inner = open_store(config).await.as_ref().clone();
    Arc::new(UnreliableCatalog {
        inner,
        failures,
        attempts: AtomicUsize::new(0),
    })
}

#[tokio::test]
async fn test_transient_persistence_failures_recover() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.persistence.backoff_schedule_secs = vec![0, 0, 0];
    let store = unreliable_store(&config, 2).await;
    let api = Arc::new(FakeLookupApi::new(Vec::new()));

    let report = harvest(&config, api, store.clone(), (1..=20).collect(), std::future::pending::<()>())
        .await
        .unwrap();

    assert_eq!(report.rows_persisted, 20);
    assert_eq!(report.remaining, 0);
    assert_eq!(store.known_ids().await.unwrap().len(), 20);
}

#[tokio::test]
async fn test_persistence_exhaustion_reports_unstored_results() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.persistence.backoff_schedule_secs = vec![0];
    let store = unreliable_store(&config, usize::MAX).await;
    let api = Arc::new(FakeLookupApi::new(Vec::new()));

    let outcome = harvest(&config, api, store.clone(), (1..=20).collect(), std::future::pending::<()>()).await;

    match outcome {
        Err(HarvestError::PersistenceExhausted { pending, .. }) => {
            assert!(!pending.is_empty());
            assert!(pending.iter().all(|id| (1..=20).contains(id)));
        }
        other => panic!("expected persistence exhaustion, got {other:?}"),
    }
    assert!(store.known_ids().await.unwrap().is_empty());
}
