//! Run summary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters collected over one harvest run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Identifiers placed into the pool at start
    pub seeded: usize,

    /// Responses handled by the orchestrator
    pub responses: usize,

    /// Entries accepted into the result buffer
    pub results_buffered: usize,

    /// Entries rejected during validation
    pub results_rejected: usize,

    /// Rows inserted into the catalog
    pub rows_persisted: u64,

    /// Identifiers put back into the pool for another attempt
    pub requeued: usize,

    /// Identifiers that failed permanently: unreadable body or rejected entry
    pub failed_ids: Vec<u64>,

    /// Identifiers still in the pool when the run ended (after Stop)
    pub remaining: usize,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunReport {
    pub fn new(seeded: usize) -> Self {
        Self {
            seeded,
            responses: 0,
            results_buffered: 0,
            results_rejected: 0,
            rows_persisted: 0,
            requeued: 0,
            failed_ids: Vec::new(),
            remaining: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_seconds(&self) -> i64 {
        self.finished_at
            .map(|end| (end - self.started_at).num_seconds())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfinished_report_has_zero_duration() {
        let report = RunReport::new(10);
        assert_eq!(report.seeded, 10);
        assert_eq!(report.duration_seconds(), 0);
        assert!(report.finished_at.is_none());
    }

    #[test]
    fn test_finish_stamps_end_time() {
        let mut report = RunReport::new(0);
        report.finish();

        let finished = report.finished_at.unwrap();
        assert!(finished >= report.started_at);
    }
}
