//! Response orchestrator
//!
//! Sole consumer of the fetcher's response stream. Classifies each response,
//! buffers validated results and requeues anything worth another attempt.
//!
//! | Response                        | Outcome                                |
//! |---------------------------------|----------------------------------------|
//! | failed, body unreadable         | batch ids -> failed buffer             |
//! | failed, body readable           | batch ids -> pool, shuffle             |
//! | success, body not a lookup JSON | batch ids -> pool, shuffle             |
//! | success                         | entries validated, unfetched -> pool   |
//!
//! The result buffer is flushed to the persistence writer whenever it grows
//! past the save threshold, and once more when the stream ends.

use crate::db::CatalogStore;
use crate::error::{HarvestError, HarvestResult};
use crate::models::{
    parse_lookup_response, FetchResponse, FetcherCommand, LookupResult, RunReport,
};
use crate::services::persistence_writer::PersistenceWriter;
use crate::utils::{left_diff, Backoff, Pool};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct ResponseOrchestrator {
    pool: Arc<Pool<u64>>,
    results: Pool<LookupResult>,
    failed: Vec<u64>,
    save_threshold: usize,
    writer: mpsc::Sender<Vec<LookupResult>>,
    writer_task: JoinHandle<HarvestResult<u64>>,
    report: RunReport,
}

impl ResponseOrchestrator {
    /// Create the orchestrator and start its persistence writer
    ///
    /// # Arguments
    /// * `pool` - Identifier pool shared with the fetcher
    /// * `store` - Catalog written by the persistence writer
    /// * `commands` - Fetcher control channel, used for backpressure
    /// * `save_threshold` - Buffer length above which results are flushed
    /// * `backoff` - Persistence retry schedule
    /// * `seeded` - Pool size at start, for the run report
    pub fn new(
        pool: Arc<Pool<u64>>,
        store: Arc<dyn CatalogStore>,
        commands: mpsc::Sender<FetcherCommand>,
        save_threshold: usize,
        backoff: Backoff,
        seeded: usize,
    ) -> Self {
        let (writer, writer_task) = PersistenceWriter::new(store, backoff, commands).spawn();

        Self {
            pool,
            results: Pool::new(),
            failed: Vec::new(),
            save_threshold,
            writer,
            writer_task,
            report: RunReport::new(seeded),
        }
    }

    /// Consume responses until the stream closes
    ///
    /// # Returns
    /// * `Ok(RunReport)` - Stream ended and every buffered result was written
    /// * `Err(PersistenceExhausted)` - Writes kept failing; the error lists
    ///   every identifier whose result was not stored
    pub async fn run(mut self, mut responses: mpsc::Receiver<FetchResponse>) -> HarvestResult<RunReport> {
        while let Some(response) = responses.recv().await {
            self.handle_response(response);

            if self.results.len() > self.save_threshold {
                if let Err(unsent) = self.flush().await {
                    return self.writer_failure(unsent).await;
                }
            }
        }

        tracing::debug!("Response stream closed, flushing remaining results");
        if let Err(unsent) = self.flush().await {
            return self.writer_failure(unsent).await;
        }

        let Self {
            pool,
            failed,
            writer,
            writer_task,
            mut report,
            ..
        } = self;

        drop(writer);
        report.rows_persisted = writer_task.await??;
        report.failed_ids = failed;
        report.remaining = pool.len();
        report.finish();

        Ok(report)
    }

    fn handle_response(&mut self, response: FetchResponse) {
        self.report.responses += 1;

        if !response.success {
            if response.body_valid {
                tracing::debug!(url = %response.url, status = ?response.status, "Requeueing failed batch");
                self.requeue(response.ids);
            } else {
                tracing::warn!(
                    url = %response.url,
                    batch_ids = ?response.ids,
                    "Unreadable body, identifiers marked failed"
                );
                self.failed.extend(response.ids);
            }
            return;
        }

        let parsed = match parse_lookup_response(response.body.as_deref().unwrap_or_default()) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(url = %response.url, error = %e, "Lookup body is not valid JSON, requeueing");
                self.requeue(response.ids);
                return;
            }
        };

        let mut accepted = Vec::with_capacity(parsed.results.len());
        // Identifiers the API answered for, accepted or not
        let mut answered = Vec::with_capacity(parsed.results.len());
        for decoded in parsed.into_entries() {
            match decoded.and_then(LookupResult::try_from) {
                Ok(result) => {
                    answered.push(result.itunes_id);
                    accepted.push(result);
                }
                Err(rejection) => {
                    tracing::warn!(%rejection, "Lookup entry rejected");
                    self.report.results_rejected += 1;
                    if let Some(id) = rejection.collection_id() {
                        answered.push(id);
                        self.failed.push(id);
                    }
                }
            }
        }

        let unfetched = left_diff(&response.ids, &answered);

        tracing::debug!(
            requested = response.ids.len(),
            accepted = accepted.len(),
            unfetched = unfetched.len(),
            "Lookup batch handled"
        );

        self.report.results_buffered += accepted.len();
        self.results.put(accepted);

        if !unfetched.is_empty() {
            self.requeue(unfetched);
        }
    }

    fn requeue(&mut self, ids: Vec<u64>) {
        self.report.requeued += ids.len();
        self.pool.put(ids);
        self.pool.shuffle();
    }

    /// Hand the buffer to the writer; returns the batch back if the writer is gone
    async fn flush(&mut self) -> Result<(), Vec<LookupResult>> {
        let batch = self.results.drain();
        if batch.is_empty() {
            return Ok(());
        }

        tracing::info!(results = batch.len(), "Flushing result buffer");
        self.writer.send(batch).await.map_err(|rejected| rejected.0)
    }

    async fn writer_failure(self, unsent: Vec<LookupResult>) -> HarvestResult<RunReport> {
        let Self {
            writer,
            writer_task,
            results,
            ..
        } = self;
        drop(writer);

        let unsent_ids = unsent
            .iter()
            .chain(results.drain().iter())
            .map(|r| r.itunes_id)
            .collect::<Vec<_>>();

        match writer_task.await? {
            Err(HarvestError::PersistenceExhausted {
                mut pending,
                source,
            }) => {
                pending.extend(unsent_ids);
                Err(HarvestError::PersistenceExhausted { pending, source })
            }
            Err(other) => Err(other),
            Ok(_) => Err(HarvestError::TaskFailed(
                "persistence writer stopped accepting results".to_string(),
            )),
        }
    }
}
