//! Engine implementations
//!
//! This module contains the concrete implementations of the engine traits
//! for each supported database.

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteEngine;

#[cfg(feature = "postgres")]
pub use postgres::{PgParam, PostgresEngine};
