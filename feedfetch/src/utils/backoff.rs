//! Scheduled backoff retry
//!
//! Retries an operation after each wait in a fixed, escalating schedule.
//! Used by the persistence writer when a catalog transaction fails.

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

/// Default persistence retry schedule: 5s, 30s, 1 minute
pub const DEFAULT_SCHEDULE_SECS: [u64; 3] = [5, 30, 60];

/// Ordered wait schedule for [`Backoff::retry`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    schedule: Vec<Duration>,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_secs(&DEFAULT_SCHEDULE_SECS)
    }
}

impl Backoff {
    pub fn new(schedule: Vec<Duration>) -> Self {
        Self { schedule }
    }

    pub fn from_secs(secs: &[u64]) -> Self {
        Self::new(secs.iter().copied().map(Duration::from_secs).collect())
    }

    pub fn schedule(&self) -> &[Duration] {
        &self.schedule
    }

    /// Worst-case time spent inside [`Backoff::retry`], excluding the attempts
    pub fn total_wait(&self) -> Duration {
        self.schedule.iter().sum()
    }

    /// Sleep for each scheduled wait, then attempt `operation`
    ///
    /// **Algorithm:**
    /// 1. Sleep for the next scheduled duration
    /// 2. Attempt operation
    /// 3. If successful, return result
    /// 4. Otherwise continue with the next duration
    /// 5. Schedule exhausted: return the last error
    ///
    /// An empty schedule makes a single immediate attempt.
    ///
    /// The caller is suspended for the whole schedule in the worst case.
    pub async fn retry<F, Fut, T, E>(&self, operation_name: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let Some((final_wait, leading)) = self.schedule.split_last() else {
            return operation().await;
        };

        let start_time = Instant::now();
        let attempts = self.schedule.len();

        for (index, wait) in leading.iter().enumerate() {
            let attempt = index + 1;
            tracing::debug!(
                operation = operation_name,
                attempt,
                wait_ms = wait.as_millis(),
                "Waiting before retry"
            );
            tokio::time::sleep(*wait).await;

            match operation().await {
                Ok(result) => {
                    tracing::info!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis(),
                        "Operation succeeded after retry"
                    );
                    return Ok(result);
                }
                Err(err) => {
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        remaining = attempts - attempt,
                        error = %err,
                        "Retry failed, backing off further"
                    );
                }
            }
        }

        tracing::debug!(
            operation = operation_name,
            attempt = attempts,
            wait_ms = final_wait.as_millis(),
            "Waiting before final retry"
        );
        tokio::time::sleep(*final_wait).await;

        match operation().await {
            Ok(result) => {
                tracing::info!(
                    operation = operation_name,
                    attempt = attempts,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    "Operation succeeded on final retry"
                );
                Ok(result)
            }
            Err(err) => {
                tracing::error!(
                    operation = operation_name,
                    attempts,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    error = %err,
                    "Retry schedule exhausted"
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast(ms: &[u64]) -> Backoff {
        Backoff::new(ms.iter().copied().map(Duration::from_millis).collect())
    }

    #[test]
    fn test_default_schedule() {
        let backoff = Backoff::default();
        assert_eq!(
            backoff.schedule(),
            &[
                Duration::from_secs(5),
                Duration::from_secs(30),
                Duration::from_secs(60)
            ]
        );
        assert_eq!(backoff.total_wait(), Duration::from_secs(95));
    }

    #[tokio::test]
    async fn test_stops_at_first_success() {
        let attempts = AtomicUsize::new(0);

        let result: Result<u32, String> = fast(&[1, 1, 1])
            .retry("test_op", || {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 2 {
                        Err(format!("attempt {n} failed"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let attempts = AtomicUsize::new(0);

        let result: Result<(), String> = fast(&[1, 2, 3])
            .retry("test_op", || {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(format!("failure {n}")) }
            })
            .await;

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_waits_before_each_attempt() {
        let start = Instant::now();

        let result: Result<(), String> = fast(&[20, 30])
            .retry("test_op", || async { Err("nope".to_string()) })
            .await;

        assert!(result.is_err());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_empty_schedule_attempts_once() {
        let attempts = AtomicUsize::new(0);

        let result: Result<(), String> = Backoff::new(Vec::new())
            .retry("test_op", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err("only try".to_string()) }
            })
            .await;

        assert_eq!(result, Err("only try".to_string()));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
