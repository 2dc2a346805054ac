//! Engine capability traits
//!
//! The mapper never talks to a driver directly. Backends implement [`Engine`]
//! (a pool of connections) and [`EngineConnection`] (one checked-out
//! connection), and everything above this module is written against those two
//! traits.

use super::dialect::Dialect;
use super::error::Result;
use super::value::{Record, Value};
use async_trait::async_trait;
use serde::Serialize;

/// One connection checked out of an engine's pool
///
/// The connection goes back to the pool when the box is dropped. Statements
/// on the same connection run in order, so a transaction opened with
/// [`execute_batch`](EngineConnection::execute_batch) spans every call made
/// on it until it is committed or rolled back.
#[async_trait]
pub trait EngineConnection: Send + Sync {
    /// Dialect spoken by this connection
    fn dialect(&self) -> Dialect;

    /// Execute a parameterized statement and return the number of affected rows
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Run a parameterized query and return its rows in order
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>>;

    /// Execute one or more statements without parameters (DDL, transaction control)
    async fn execute_batch(&self, sql: &str) -> Result<()>;
}

/// A pooled database engine
///
/// # Example
///
/// ```no_run
/// use schemaless_sql::backends::SqliteEngine;
/// use schemaless_sql::core::{ConnectOptions, Engine};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let engine = SqliteEngine::open_memory(ConnectOptions::default()).await?;
///     let rows = engine.query("SELECT 1 AS one", &[]).await?;
///     assert_eq!(rows.len(), 1);
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait Engine: Send + Sync {
    /// Dialect spoken by every connection of this engine
    fn dialect(&self) -> Dialect;

    /// Check a connection out of the pool.
    ///
    /// Waits at most the configured checkout timeout.
    async fn acquire(&self) -> Result<Box<dyn EngineConnection>>;

    /// Current pool status
    fn stats(&self) -> PoolStats;

    /// Close the pool; later checkouts fail with a connection error
    fn close(&self);

    /// Execute one statement on a freshly checked-out connection
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let conn = self.acquire().await?;
        conn.execute(sql, params).await
    }

    /// Run one query on a freshly checked-out connection
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        let conn = self.acquire().await?;
        conn.query(sql, params).await
    }
}

/// Pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PoolStats {
    /// Maximum number of connections the pool will open
    pub max_size: usize,
    /// Total number of connections in the pool
    pub size: usize,
    /// Number of idle connections
    pub available: usize,
    /// Number of requests waiting for a connection
    pub waiting: usize,
}
