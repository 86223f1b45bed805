//! Fetcher batches, responses and control commands

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Control command sent to the fetcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetcherCommand {
    /// Stop issuing new batches; ticks become no-ops
    Pause,
    /// Resume issuing batches after a pause
    Resume,
    /// Stop ticking and close the response stream
    Stop,
}

/// Identifiers mapped to exactly one lookup request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupBatch {
    pub ids: Vec<u64>,
    pub url: String,
}

impl LookupBatch {
    pub fn new(base_url: &str, ids: Vec<u64>) -> Self {
        let joined = ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let separator = if base_url.contains('?') { '&' } else { '?' };
        let url = format!("{base_url}{separator}entity=podcast&id={joined}");

        Self { ids, url }
    }

    /// Split `ids` into batches of at most `max_ids_per_fetch`, preserving order
    pub fn partition(base_url: &str, ids: &[u64], max_ids_per_fetch: usize) -> Vec<LookupBatch> {
        ids.chunks(max_ids_per_fetch.max(1))
            .map(|chunk| LookupBatch::new(base_url, chunk.to_vec()))
            .collect()
    }
}

/// Counts one dispatched batch until its response has been handled
///
/// The fetcher issues a ticket per batch; the count drops when the response
/// (and the ticket inside it) is dropped, either after the orchestrator is
/// done with it or because nobody was left to receive it.
pub struct SettleTicket {
    outstanding: Arc<AtomicUsize>,
}

impl SettleTicket {
    pub fn issue(outstanding: &Arc<AtomicUsize>) -> Self {
        outstanding.fetch_add(1, Ordering::SeqCst);
        Self {
            outstanding: Arc::clone(outstanding),
        }
    }
}

impl Drop for SettleTicket {
    fn drop(&mut self) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

impl fmt::Debug for SettleTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettleTicket").finish_non_exhaustive()
    }
}

/// Outcome of one lookup request
#[derive(Debug)]
pub struct FetchResponse {
    /// Request returned 200 with a readable body
    pub success: bool,
    /// False when the body could not be read; the batch is not retried
    pub body_valid: bool,
    /// HTTP status, absent on network errors
    pub status: Option<u16>,
    pub url: String,
    /// Identifiers requested by the batch
    pub ids: Vec<u64>,
    pub body: Option<String>,
    ticket: Option<SettleTicket>,
}

impl FetchResponse {
    pub fn success(batch: LookupBatch, status: u16, body: String) -> Self {
        Self {
            success: true,
            body_valid: true,
            status: Some(status),
            url: batch.url,
            ids: batch.ids,
            body: Some(body),
            ticket: None,
        }
    }

    /// Network error or non-200 status
    pub fn transient_failure(batch: LookupBatch, status: Option<u16>) -> Self {
        Self {
            success: false,
            body_valid: true,
            status,
            url: batch.url,
            ids: batch.ids,
            body: None,
            ticket: None,
        }
    }

    /// Body could not be read or decoded
    pub fn unreadable_body(batch: LookupBatch, status: Option<u16>) -> Self {
        Self {
            success: false,
            body_valid: false,
            status,
            url: batch.url,
            ids: batch.ids,
            body: None,
            ticket: None,
        }
    }

    pub fn with_ticket(mut self, ticket: SettleTicket) -> Self {
        self.ticket = Some(ticket);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://itunes.apple.com/lookup";

    #[test]
    fn test_batch_url() {
        let batch = LookupBatch::new(BASE, vec![123, 456, 789]);
        assert_eq!(
            batch.url,
            "https://itunes.apple.com/lookup?entity=podcast&id=123,456,789"
        );
        assert_eq!(batch.ids, vec![123, 456, 789]);
    }

    #[test]
    fn test_batch_url_with_existing_query() {
        let batch = LookupBatch::new("http://localhost/lookup?country=us", vec![1]);
        assert_eq!(batch.url, "http://localhost/lookup?country=us&entity=podcast&id=1");
    }

    #[test]
    fn test_partition_sizes() {
        let ids: Vec<u64> = (1..=7).collect();
        let batches = LookupBatch::partition(BASE, &ids, 3);

        let sizes: Vec<usize> = batches.iter().map(|b| b.ids.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(batches[2].ids, vec![7]);
    }

    #[test]
    fn test_ticket_settles_on_drop() {
        let outstanding = Arc::new(AtomicUsize::new(0));
        let batch = LookupBatch::new(BASE, vec![1, 2]);

        let response = FetchResponse::transient_failure(batch, Some(503))
            .with_ticket(SettleTicket::issue(&outstanding));
        assert_eq!(outstanding.load(Ordering::SeqCst), 1);

        drop(response);
        assert_eq!(outstanding.load(Ordering::SeqCst), 0);
    }
}
