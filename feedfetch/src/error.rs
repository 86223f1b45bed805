//! Error types for feedfetch
//!
//! Only startup errors and persistence exhaustion end a run. Network
//! failures, unreadable bodies and rejected entries are absorbed by the
//! orchestrator and never surface here.

use thiserror::Error;

/// Harvest run error
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Configuration, input file or database setup error
    #[error("Common error: {0}")]
    Common(#[from] feedfetch_common::Error),

    /// Catalog writes kept failing after the whole backoff schedule
    ///
    /// `pending` holds the identifiers of every result that was not persisted.
    #[error("Persistence retries exhausted with {} results pending: {source}", pending.len())]
    PersistenceExhausted {
        pending: Vec<u64>,
        source: feedfetch_common::Error,
    },

    /// A spawned task panicked or was cancelled
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

impl From<tokio::task::JoinError> for HarvestError {
    fn from(err: tokio::task::JoinError) -> Self {
        HarvestError::TaskFailed(err.to_string())
    }
}

/// Convenience result type
pub type HarvestResult<T> = Result<T, HarvestError>;
