//! Utility modules for feedfetch

pub mod backoff;
pub mod pool;
pub mod set_diff;
pub mod tx_monitor;

pub use backoff::Backoff;
pub use pool::Pool;
pub use set_diff::{left_diff, left_diff_by_key};
pub use tx_monitor::{begin_timed, TimedTransaction};
