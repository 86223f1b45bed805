//! Rate-limited batch fetcher
//!
//! A periodic tick drains the identifier pool into lookup batches and runs
//! one worker per batch. Each worker emits exactly one [`FetchResponse`] on
//! the response channel. The tick waits for all of its workers before the
//! next tick may start, so at most `concurrent_fetches` requests are ever in
//! flight.
//!
//! **State machine:**
//! ```text
//! Running --Pause--> Paused --Resume--> Running
//! Running|Paused --Stop--> Terminated
//! Running --(empty pool, nothing unsettled)--> Terminated
//! ```
//!
//! The fetcher owns the only long-lived response sender, so the response
//! stream closes once the loop ends and the last worker is gone.

use crate::models::{FetchResponse, FetcherCommand, LookupBatch, SettleTicket};
use crate::services::lookup_client::{LookupTransport, TransportError};
use crate::utils::Pool;
use feedfetch_common::config::LookupConfig;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Buffered command slots; Pause/Resume/Stop senders never wait on the fetcher
pub const COMMAND_CAPACITY: usize = 16;

type QuotaLimiter = governor::RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Fetcher settings
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub base_url: String,
    pub concurrent_fetches: usize,
    pub max_ids_per_fetch: usize,
    pub tick_interval: Duration,
    /// Per-request quota on top of the tick schedule
    pub requests_per_minute: Option<NonZeroU32>,
}

impl FetcherConfig {
    pub fn from_lookup(config: &LookupConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            concurrent_fetches: config.concurrent_fetches,
            max_ids_per_fetch: config.max_ids_per_fetch,
            tick_interval: Duration::from_millis(config.tick_interval_ms),
            requests_per_minute: config.requests_per_minute.and_then(NonZeroU32::new),
        }
    }

    /// Identifiers drained from the pool per tick
    pub fn ids_per_tick(&self) -> usize {
        self.concurrent_fetches * self.max_ids_per_fetch
    }

    /// Response channel capacity: two ticks worth of responses
    fn response_capacity(&self) -> usize {
        (self.concurrent_fetches * 2).max(1)
    }
}

/// Fetcher state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetcherState {
    Running,
    Paused,
    Terminated,
}

/// Channels and task of a spawned fetcher
pub struct FetcherHandle {
    /// Control channel, clone freely
    pub commands: mpsc::Sender<FetcherCommand>,
    /// Response stream; ends when the fetcher terminates
    pub responses: mpsc::Receiver<FetchResponse>,
    /// Resolves to the number of batches dispatched
    pub task: JoinHandle<usize>,
}

/// Timer-driven batch fetcher
pub struct Fetcher {
    config: FetcherConfig,
    transport: Arc<dyn LookupTransport>,
    pool: Arc<Pool<u64>>,
    commands: mpsc::Receiver<FetcherCommand>,
    responses: mpsc::Sender<FetchResponse>,
    limiter: Option<Arc<QuotaLimiter>>,
    outstanding: Arc<AtomicUsize>,
    state: FetcherState,
    last_batch_end: Option<Instant>,
    batches_dispatched: usize,
}

impl Fetcher {
    /// Start the tick loop on the runtime
    ///
    /// # Arguments
    /// * `config` - Batch sizing and schedule
    /// * `transport` - Performs the individual lookups
    /// * `pool` - Identifier pool shared with the orchestrator
    pub fn spawn(
        config: FetcherConfig,
        transport: Arc<dyn LookupTransport>,
        pool: Arc<Pool<u64>>,
    ) -> FetcherHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (response_tx, response_rx) = mpsc::channel(config.response_capacity());

        let limiter = config
            .requests_per_minute
            .map(|rpm| Arc::new(governor::RateLimiter::direct(governor::Quota::per_minute(rpm))));

        let fetcher = Fetcher {
            config,
            transport,
            pool,
            commands: command_rx,
            responses: response_tx,
            limiter,
            outstanding: Arc::new(AtomicUsize::new(0)),
            state: FetcherState::Running,
            last_batch_end: None,
            batches_dispatched: 0,
        };

        FetcherHandle {
            commands: command_tx,
            responses: response_rx,
            task: tokio::spawn(fetcher.run()),
        }
    }

    async fn run(mut self) -> usize {
        tracing::info!(
            pending = self.pool.len(),
            concurrent_fetches = self.config.concurrent_fetches,
            max_ids_per_fetch = self.config.max_ids_per_fetch,
            tick_ms = self.config.tick_interval.as_millis(),
            "Fetcher started"
        );

        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut commands_open = true;

        while self.state != FetcherState::Terminated {
            tokio::select! {
                biased;

                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => self.apply(command),
                    None => {
                        tracing::debug!("All command senders dropped");
                        commands_open = false;
                    }
                },

                _ = interval.tick() => {
                    if self.on_tick().await {
                        // Measure the next tick from the end of this batch
                        interval.reset();
                    }
                }
            }
        }

        tracing::info!(
            batches = self.batches_dispatched,
            remaining = self.pool.len(),
            "Fetcher terminated"
        );

        self.batches_dispatched
    }

    fn apply(&mut self, command: FetcherCommand) {
        let next = match (self.state, command) {
            (FetcherState::Terminated, _) => FetcherState::Terminated,
            (_, FetcherCommand::Stop) => FetcherState::Terminated,
            (_, FetcherCommand::Pause) => FetcherState::Paused,
            (_, FetcherCommand::Resume) => FetcherState::Running,
        };

        if next != self.state {
            tracing::info!(from = ?self.state, to = ?next, ?command, "Fetcher state change");
        }
        self.state = next;
    }

    /// One tick; returns true when a batch was dispatched
    async fn on_tick(&mut self) -> bool {
        if self.state != FetcherState::Running {
            return false;
        }

        if let Some(end) = self.last_batch_end {
            if end.elapsed() < self.config.tick_interval {
                tracing::trace!("Tick within interval of previous batch, skipping");
                return false;
            }
        }

        // Settle count first: a response requeues before its ticket drops,
        // so zero here means every requeue is already in the pool
        let unsettled = self.outstanding.load(Ordering::SeqCst);
        if self.pool.is_empty() {
            if unsettled == 0 {
                tracing::info!("Identifier pool exhausted");
                self.state = FetcherState::Terminated;
            } else {
                tracing::debug!(unsettled, "Pool empty, waiting for responses to settle");
            }
            return false;
        }

        let ids = self.pool.take(self.config.ids_per_tick());
        let batches = LookupBatch::partition(&self.config.base_url, &ids, self.config.max_ids_per_fetch);
        let batch_count = batches.len();

        tracing::debug!(
            ids = ids.len(),
            batches = batch_count,
            remaining = self.pool.len(),
            "Dispatching lookup batches"
        );

        let workers = batches.into_iter().map(|batch| {
            let ticket = SettleTicket::issue(&self.outstanding);
            let transport = Arc::clone(&self.transport);
            let limiter = self.limiter.clone();
            let responses = self.responses.clone();

            tokio::spawn(async move {
                if let Some(limiter) = limiter {
                    limiter.until_ready().await;
                }

                let response = lookup(transport.as_ref(), batch).await.with_ticket(ticket);
                let outcome = TickOutcome::of(&response);
                if let Err(rejected) = responses.send(response).await {
                    tracing::warn!(
                        batch_ids = ?rejected.0.ids,
                        "Response stream closed, dropping batch"
                    );
                }
                outcome
            })
        });

        let mut stats = TickStats::default();
        for result in join_all(workers).await {
            match result {
                Ok(outcome) => stats.record(outcome),
                Err(e) => tracing::error!(error = %e, "Lookup worker failed"),
            }
        }
        stats.log();

        self.batches_dispatched += batch_count;
        self.last_batch_end = Some(Instant::now());
        true
    }
}

/// How one lookup of a tick ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickOutcome {
    Succeeded,
    /// Failed, with the HTTP status when one was received
    Failed(Option<u16>),
}

impl TickOutcome {
    fn of(response: &FetchResponse) -> Self {
        if response.success {
            Self::Succeeded
        } else {
            Self::Failed(response.status)
        }
    }
}

/// Per-tick lookup outcomes, failures grouped by status
#[derive(Debug, Default)]
struct TickStats {
    succeeded: usize,
    failures: BTreeMap<Option<u16>, usize>,
}

impl TickStats {
    fn record(&mut self, outcome: TickOutcome) {
        match outcome {
            TickOutcome::Succeeded => self.succeeded += 1,
            TickOutcome::Failed(status) => *self.failures.entry(status).or_default() += 1,
        }
    }

    fn failed(&self) -> usize {
        self.failures.values().sum()
    }

    fn log(&self) {
        tracing::debug!(
            succeeded = self.succeeded,
            failed = self.failed(),
            by_status = ?self.failures,
            "Tick complete"
        );
    }
}

/// Perform one lookup and classify the outcome
pub async fn lookup(transport: &dyn LookupTransport, batch: LookupBatch) -> FetchResponse {
    match transport.get(&batch.url).await {
        Ok(body) => {
            tracing::trace!(batch_ids = ?batch.ids, bytes = body.len(), "Lookup succeeded");
            FetchResponse::success(batch, 200, body)
        }
        Err(err @ TransportError::Body { .. }) => {
            tracing::warn!(url = %batch.url, error = %err, "Lookup body unreadable");
            FetchResponse::unreadable_body(batch, err.status())
        }
        Err(err) => {
            tracing::warn!(url = %batch.url, status = ?err.status(), error = %err, "Lookup failed");
            FetchResponse::transient_failure(batch, err.status())
        }
    }
}
