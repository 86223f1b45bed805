//! Catalog persistence
//!
//! Schema creation lives in `feedfetch_common::db`; this module reads and
//! writes the catalog rows.

pub mod artists;
pub mod catalog;
pub mod genres;
pub mod podcasts;

pub use catalog::{CatalogStore, SqliteCatalogStore};

use feedfetch_common::{Error, Result};

/// SQLite integers are signed; iTunes ids always fit
pub(crate) fn sql_id(id: u64) -> Result<i64> {
    i64::try_from(id).map_err(|_| Error::InvalidInput(format!("Identifier {id} out of range")))
}
