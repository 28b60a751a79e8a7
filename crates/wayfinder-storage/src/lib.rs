//! Wayfinder Storage Layer
//!
//! SQLite-backed key-value persistence for extension settings.
//! Session data is deliberately not stored here; it lives only in memory.

mod database;
mod error;
mod migrations;

pub use database::Database;
pub use error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;
