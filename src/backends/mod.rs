//! Native driver implementations
//!
//! This module contains concrete implementations of the native driver
//! contract defined in [`crate::core::native`].

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteBridge, SqliteConnection, SqliteResult, SqliteStatement};
