//! Single persistence writer
//!
//! Owns every catalog write. Drained result buffers arrive on a bounded
//! queue and are written one transaction at a time. A failed write pauses
//! the fetcher for the duration of the backoff schedule:
//!
//! ```text
//! persist fails -> Pause -> retry per schedule -> success -> Resume
//!                                             -> exhausted -> Stop, fatal
//! ```

use crate::db::CatalogStore;
use crate::error::{HarvestError, HarvestResult};
use crate::models::{FetcherCommand, LookupResult};
use crate::utils::Backoff;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Queued buffers waiting for the writer
pub const WRITER_QUEUE_CAPACITY: usize = 4;

pub struct PersistenceWriter {
    store: Arc<dyn CatalogStore>,
    backoff: Backoff,
    commands: mpsc::Sender<FetcherCommand>,
}

impl PersistenceWriter {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        backoff: Backoff,
        commands: mpsc::Sender<FetcherCommand>,
    ) -> Self {
        Self {
            store,
            backoff,
            commands,
        }
    }

    /// Start the writer task
    ///
    /// The task ends when every queue sender is dropped (returning the total
    /// rows inserted) or when the backoff schedule is exhausted.
    pub fn spawn(
        self,
    ) -> (
        mpsc::Sender<Vec<LookupResult>>,
        JoinHandle<HarvestResult<u64>>,
    ) {
        let (queue_tx, queue_rx) = mpsc::channel(WRITER_QUEUE_CAPACITY);
        (queue_tx, tokio::spawn(self.run(queue_rx)))
    }

    async fn run(self, mut queue: mpsc::Receiver<Vec<LookupResult>>) -> HarvestResult<u64> {
        let mut rows = 0u64;

        while let Some(batch) = queue.recv().await {
            match self.persist(&batch).await {
                Ok(inserted) => rows += inserted,
                Err(source) => {
                    // Nothing queued behind the failed batch will be written either
                    queue.close();
                    let mut pending: Vec<u64> = batch.iter().map(|r| r.itunes_id).collect();
                    while let Some(queued) = queue.recv().await {
                        pending.extend(queued.iter().map(|r| r.itunes_id));
                    }
                    return Err(HarvestError::PersistenceExhausted { pending, source });
                }
            }
        }

        tracing::debug!(rows, "Persistence writer finished");
        Ok(rows)
    }

    /// Write one batch, running the pause/backoff/resume protocol on failure
    async fn persist(&self, batch: &[LookupResult]) -> feedfetch_common::Result<u64> {
        let first_error = match self.store.persist_batch(batch).await {
            Ok(rows) => return Ok(rows),
            Err(e) => e,
        };

        tracing::warn!(
            results = batch.len(),
            error = %first_error,
            "Persisting results failed, pausing fetcher"
        );
        self.send(FetcherCommand::Pause).await;

        match self
            .backoff
            .retry("persist_batch", || self.store.persist_batch(batch))
            .await
        {
            Ok(rows) => {
                tracing::info!(rows, "Persistence recovered, resuming fetcher");
                self.send(FetcherCommand::Resume).await;
                Ok(rows)
            }
            Err(e) => {
                tracing::error!(
                    results = batch.len(),
                    error = %e,
                    "Persistence retries exhausted, stopping fetcher"
                );
                self.send(FetcherCommand::Stop).await;
                Err(e)
            }
        }
    }

    async fn send(&self, command: FetcherCommand) {
        if self.commands.send(command).await.is_err() {
            tracing::debug!(?command, "Fetcher already gone, command dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use feedfetch_common::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Store whose first `failures` writes fail
    struct FlakyStore {
        failures: usize,
        attempts: AtomicUsize,
    }

    impl FlakyStore {
        fn failing(failures: usize) -> Self {
            Self {
                failures,
                attempts: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CatalogStore for FlakyStore {
        async fn known_ids(&self) -> feedfetch_common::Result<Vec<u64>> {
            Ok(Vec::new())
        }

        async fn persist_batch(&self, results: &[LookupResult]) -> feedfetch_common::Result<u64> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                Err(Error::Internal("database is locked".to_string()))
            } else {
                Ok(results.len() as u64)
            }
        }
    }

    fn result(itunes_id: u64) -> LookupResult {
        LookupResult {
            itunes_id,
            title: format!("Show {itunes_id}"),
            censored_title: format!("Show {itunes_id}"),
            artist_name: String::new(),
            artist_itunes_id: None,
            artist_view_url: None,
            feed_url: None,
            itunes_view_url: None,
            release_date: None,
            country: None,
            content_advisory_rating: None,
            primary_genre: None,
            genres: Vec::new(),
            artwork_url_30: None,
            artwork_url_60: None,
            artwork_url_100: None,
            artwork_url_600: None,
        }
    }

    fn fast_backoff() -> Backoff {
        Backoff::new(vec![Duration::from_millis(1), Duration::from_millis(1)])
    }

    fn drain(commands: &mut mpsc::Receiver<FetcherCommand>) -> Vec<FetcherCommand> {
        let mut seen = Vec::new();
        while let Ok(command) = commands.try_recv() {
            seen.push(command);
        }
        seen
    }

    #[tokio::test]
    async fn test_clean_write_sends_no_commands() {
        let (command_tx, mut command_rx) = mpsc::channel(8);
        let writer = PersistenceWriter::new(Arc::new(FlakyStore::failing(0)), fast_backoff(), command_tx);

        let (queue, task) = writer.spawn();
        queue.send(vec![result(1), result(2)]).await.unwrap();
        drop(queue);

        assert_eq!(task.await.unwrap().unwrap(), 2);
        assert!(drain(&mut command_rx).is_empty());
    }

    #[tokio::test]
    async fn test_failure_then_success_pauses_and_resumes() {
        let (command_tx, mut command_rx) = mpsc::channel(8);
        let writer = PersistenceWriter::new(Arc::new(FlakyStore::failing(2)), fast_backoff(), command_tx);

        let (queue, task) = writer.spawn();
        queue.send(vec![result(1)]).await.unwrap();
        drop(queue);

        assert_eq!(task.await.unwrap().unwrap(), 1);
        assert_eq!(
            drain(&mut command_rx),
            vec![FetcherCommand::Pause, FetcherCommand::Resume]
        );
    }

    #[tokio::test]
    async fn test_exhaustion_stops_fetcher_and_reports_pending() {
        let (command_tx, mut command_rx) = mpsc::channel(8);
        let writer = PersistenceWriter::new(Arc::new(FlakyStore::failing(usize::MAX)), fast_backoff(), command_tx);

        let (queue, task) = writer.spawn();
        queue.send(vec![result(1), result(2)]).await.unwrap();
        drop(queue);

        match task.await.unwrap() {
            Err(HarvestError::PersistenceExhausted { pending, .. }) => {
                assert_eq!(pending, vec![1, 2]);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(
            drain(&mut command_rx),
            vec![FetcherCommand::Pause, FetcherCommand::Stop]
        );
    }
}
