//! feedfetch library interface
//!
//! Harvests podcast catalog metadata from the iTunes lookup API into a
//! SQLite catalog. [`harvest`] wires one run together:
//!
//! ```text
//! candidates -> bootstrap -> pool -> Fetcher -> responses -> ResponseOrchestrator
//!                              ^                                  |      |
//!                              +------------ requeue -------------+      v
//!                                                          PersistenceWriter -> CatalogStore
//! ```

pub mod bootstrap;
pub mod db;
pub mod error;
pub mod input;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{HarvestError, HarvestResult};

use crate::db::CatalogStore;
use crate::models::{FetcherCommand, RunReport};
use crate::services::{Fetcher, FetcherConfig, LookupTransport, ResponseOrchestrator};
use crate::utils::{Backoff, Pool};
use feedfetch_common::config::TomlConfig;
use std::future::Future;
use std::sync::Arc;

/// Run one harvest to completion
///
/// # Arguments
/// * `config` - Validated configuration
/// * `transport` - Lookup transport
/// * `store` - Catalog store; also the source of already-known identifiers
/// * `candidates` - Identifier list in input order
/// * `shutdown` - Resolves when the run should stop early (e.g. Ctrl+C)
///
/// # Returns
/// The run report, or the fatal error that ended the run.
pub async fn harvest<F>(
    config: &TomlConfig,
    transport: Arc<dyn LookupTransport>,
    store: Arc<dyn CatalogStore>,
    candidates: Vec<u64>,
    shutdown: F,
) -> HarvestResult<RunReport>
where
    F: Future<Output = ()> + Send + 'static,
{
    let pending = bootstrap::pending_identifiers(&candidates, store.as_ref()).await?;
    if pending.is_empty() {
        tracing::info!("Nothing to fetch, catalog already holds every candidate");
        let mut report = RunReport::new(0);
        report.finish();
        return Ok(report);
    }

    let seeded = pending.len();
    let pool = Arc::new(Pool::from_items(pending));

    let fetcher = Fetcher::spawn(FetcherConfig::from_lookup(&config.lookup), transport, Arc::clone(&pool));

    let stop = fetcher.commands.clone();
    let shutdown_task = tokio::spawn(async move {
        shutdown.await;
        tracing::info!("Shutdown requested, stopping fetcher");
        if stop.send(FetcherCommand::Stop).await.is_err() {
            tracing::debug!("Fetcher already gone, Stop not delivered");
        }
    });

    let orchestrator = ResponseOrchestrator::new(
        Arc::clone(&pool),
        store,
        fetcher.commands,
        config.persistence.save_threshold,
        Backoff::from_secs(&config.persistence.backoff_schedule_secs),
        seeded,
    );

    let outcome = orchestrator.run(fetcher.responses).await;
    shutdown_task.abort();

    match fetcher.task.await {
        Ok(batches) => tracing::debug!(batches, "Fetcher joined"),
        Err(e) => tracing::error!(error = %e, "Fetcher task failed"),
    }

    outcome
}
