//! # feedfetch common library
//!
//! Shared code for the feedfetch workspace:
//! - Error and result types
//! - TOML configuration loading and config file resolution
//! - SQLite catalog database initialization

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;

pub use error::{Error, Result};
