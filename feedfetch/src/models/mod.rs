//! Data models for feedfetch
//!
//! - Lookup API payloads and validated results
//! - Fetcher batches, responses and commands
//! - End-of-run report

pub mod fetch;
pub mod lookup;
pub mod run_report;

pub use fetch::{FetchResponse, FetcherCommand, LookupBatch, SettleTicket};
pub use lookup::{parse_lookup_response, EntryRejection, LookupEntry, LookupResponse, LookupResult};
pub use run_report::RunReport;
