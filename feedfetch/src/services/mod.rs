//! Harvest services
//!
//! - `lookup_client`: HTTP transport for the lookup API
//! - `fetcher`: timer-driven batch fetcher with Pause/Resume/Stop control
//! - `orchestrator`: response classification, requeue and flush policy
//! - `persistence_writer`: single catalog writer with backoff

pub mod fetcher;
pub mod lookup_client;
pub mod orchestrator;
pub mod persistence_writer;

pub use fetcher::{Fetcher, FetcherConfig, FetcherHandle, FetcherState, COMMAND_CAPACITY};
pub use lookup_client::{HttpTransport, LookupTransport, TransportError};
pub use orchestrator::ResponseOrchestrator;
pub use persistence_writer::PersistenceWriter;
