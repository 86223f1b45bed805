//! Transaction timing
//!
//! Wraps catalog transactions so slow connection acquisition and long-held
//! transactions show up in the logs. A flush that keeps hitting these
//! warnings is usually the precursor of the persistence backoff path.

use feedfetch_common::{Error, Result};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::time::Instant;

/// Acquisition slower than this is logged at WARN
const SLOW_ACQUIRE_MS: u128 = 1000;
/// Transactions held longer than this are logged at WARN
const LONG_HOLD_MS: u128 = 2000;

/// Transaction wrapper that logs how long the connection was held
pub struct TimedTransaction<'c> {
    tx: Option<Transaction<'c, Sqlite>>,
    caller: &'static str,
    acquired_at: Instant,
}

impl<'c> TimedTransaction<'c> {
    /// Borrow the open transaction
    pub fn tx(&mut self) -> Result<&mut Transaction<'c, Sqlite>> {
        self.tx
            .as_mut()
            .ok_or_else(|| Error::Internal(format!("{}: transaction already finished", self.caller)))
    }

    /// Commit and log the hold time
    pub async fn commit(mut self) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| Error::Internal(format!("{}: transaction already finished", self.caller)))?;

        tx.commit().await?;
        self.log_release("commit");
        Ok(())
    }

    /// Roll back and log the hold time
    pub async fn rollback(mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        self.log_release("rollback");
        Ok(())
    }

    fn log_release(&self, how: &'static str) {
        let held_ms = self.acquired_at.elapsed().as_millis();
        if held_ms > LONG_HOLD_MS {
            tracing::warn!(
                caller = self.caller,
                held_ms,
                how,
                "Long transaction, connection held for extended period"
            );
        } else {
            tracing::debug!(caller = self.caller, held_ms, how, "Connection released");
        }
    }
}

impl Drop for TimedTransaction<'_> {
    fn drop(&mut self) {
        // Still open: sqlx rolls it back on drop (error path)
        if self.tx.is_some() {
            self.log_release("drop");
        }
    }
}

/// Begin a transaction, logging acquisition wait
pub async fn begin_timed<'c>(
    pool: &'c SqlitePool,
    caller: &'static str,
) -> Result<TimedTransaction<'c>> {
    let start = Instant::now();

    let tx = pool.begin().await?;

    let wait_ms = start.elapsed().as_millis();
    if wait_ms > SLOW_ACQUIRE_MS {
        tracing::warn!(
            caller,
            wait_ms,
            "Slow connection acquisition, database may be busy"
        );
    } else {
        tracing::debug!(caller, wait_ms, "Connection acquired");
    }

    Ok(TimedTransaction {
        tx: Some(tx),
        caller,
        acquired_at: Instant::now(),
    })
}
