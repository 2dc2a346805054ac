//! Pooled SQLite engine
//!
//! This module provides the SQLite implementation of the engine traits using
//! deadpool for connection management. Every driver call runs inside
//! `interact` on deadpool's blocking pool and is bounded by the operation
//! timeout.

use crate::core::{
    error::DatabaseError, error::Result, ConnectOptions, Dialect, Engine, EngineConnection,
    PoolStats, Record, Value,
};
use crate::core::value::{DATETIME_FORMAT, DATE_FORMAT};
use async_trait::async_trait;
use deadpool_sqlite::{
    Config, InteractError, Object, Pool, PoolConfig, PoolError, Runtime, Status, TimeoutType,
};
use rusqlite::params_from_iter;
use rusqlite::types::{Value as SqliteValue, ValueRef};
use std::path::Path;
use std::time::Duration;

/// Pooled SQLite engine
///
/// File databases get a pool of `max_size` connections in WAL mode. An
/// in-memory database lives and dies with its connection, so its pool is
/// pinned to a single connection that is never recycled.
///
/// # Example
///
/// ```no_run
/// use schemaless_sql::backends::SqliteEngine;
/// use schemaless_sql::core::{ConnectOptions, Engine, Value};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let engine = SqliteEngine::open("app.db", ConnectOptions::default()).await?;
///     engine
///         .execute("CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY, name TEXT)", &[])
///         .await?;
///     engine
///         .execute("INSERT INTO users (name) VALUES (?)", &[Value::from("Alice")])
///         .await?;
///     Ok(())
/// }
/// ```
pub struct SqliteEngine {
    pool: Pool,
    operation_timeout: Duration,
    checkout_timeout: Duration,
    recycle: Option<Duration>,
}

impl SqliteEngine {
    /// Open (creating if needed) a database file
    ///
    /// # Errors
    ///
    /// Returns error if pool creation or initialization fails
    pub async fn open(path: impl AsRef<Path>, options: ConnectOptions) -> Result<Self> {
        let engine = Self::with_config(path.as_ref(), false, &options)?;

        let conn = engine.checkout().await?;
        run(&conn, engine.operation_timeout, |conn| {
            // journal_mode returns a row, so it cannot go through execute.
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
        })
        .await?;

        tracing::debug!(path = %path.as_ref().display(), "opened sqlite database");
        Ok(engine)
    }

    /// Open a private in-memory database
    pub async fn open_memory(options: ConnectOptions) -> Result<Self> {
        let engine = Self::with_config(Path::new(":memory:"), true, &options)?;
        // Create the single connection now so the database exists from the start.
        drop(engine.checkout().await?);
        Ok(engine)
    }

    fn with_config(path: &Path, memory: bool, options: &ConnectOptions) -> Result<Self> {
        let max_size = if memory { 1 } else { options.max_size.max(1) };

        let mut pool_config = PoolConfig::new(max_size);
        pool_config.timeouts.wait = Some(options.timeout);

        let mut config = Config::new(path);
        config.pool = Some(pool_config);

        let pool = config
            .create_pool(Runtime::Tokio1)
            .map_err(|e| DatabaseError::connection(format!("Failed to create pool: {}", e)))?;

        Ok(Self {
            pool,
            operation_timeout: options.operation_timeout,
            checkout_timeout: options.timeout,
            recycle: if memory { None } else { Some(options.recycle) },
        })
    }

    async fn checkout(&self) -> Result<Object> {
        if let Some(recycle) = self.recycle {
            self.pool.retain(|_, metrics| metrics.age() < recycle);
        }

        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| pool_error(e, self.pool.status(), self.checkout_timeout))?;

        let busy_timeout = self.operation_timeout;
        run(&conn, self.operation_timeout, move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch("PRAGMA foreign_keys = ON")?;
            // A transaction guard dropped outside a runtime leaves its transaction open.
            if !conn.is_autocommit() {
                conn.execute_batch("ROLLBACK")?;
            }
            Ok(())
        })
        .await?;

        Ok(conn)
    }

}

/// Map a checkout failure; a wait timeout means every slot stayed checked out
fn pool_error(err: PoolError, status: Status, checkout_timeout: Duration) -> DatabaseError {
    match err {
        PoolError::Timeout(TimeoutType::Wait) => DatabaseError::pool_exhausted(
            status.size.saturating_sub(status.available),
            status.max_size,
        ),
        PoolError::Timeout(_) => {
            DatabaseError::connection_timeout(checkout_timeout.as_millis() as u64)
        }
        PoolError::Closed => DatabaseError::connection("Pool is closed"),
        other => DatabaseError::connection(format!("Failed to acquire connection: {}", other)),
    }
}

/// A connection whose worker panicked or was dropped is unusable
fn interact_error(err: InteractError) -> DatabaseError {
    DatabaseError::connection(format!("Connection worker failed: {}", err))
}

#[async_trait]
impl Engine for SqliteEngine {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn acquire(&self) -> Result<Box<dyn EngineConnection>> {
        let conn = self.checkout().await?;
        Ok(Box::new(SqliteConnection {
            conn,
            operation_timeout: self.operation_timeout,
        }))
    }

    fn stats(&self) -> PoolStats {
        let status = self.pool.status();
        PoolStats {
            max_size: status.max_size,
            size: status.size,
            available: status.available,
            waiting: status.waiting,
        }
    }

    fn close(&self) {
        self.pool.close();
    }
}

/// One pooled SQLite connection
struct SqliteConnection {
    conn: Object,
    operation_timeout: Duration,
}

#[async_trait]
impl EngineConnection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        tracing::debug!(sql, params = params.len(), "execute");
        let sql = sql.to_string();
        let params: Vec<SqliteValue> = params.iter().map(to_sqlite).collect();

        run(&self.conn, self.operation_timeout, move |conn| {
            let mut stmt = conn.prepare_cached(&sql)?;
            let affected = stmt.execute(params_from_iter(params.iter()))?;
            Ok(affected as u64)
        })
        .await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        tracing::debug!(sql, params = params.len(), "query");
        let sql = sql.to_string();
        let params: Vec<SqliteValue> = params.iter().map(to_sqlite).collect();

        run(&self.conn, self.operation_timeout, move |conn| {
            let mut stmt = conn.prepare_cached(&sql)?;
            let mut rows = stmt.query(params_from_iter(params.iter()))?;

            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_record(row)?);
            }
            Ok(results)
        })
        .await
    }

    async fn execute_batch(&self, sql: &str) -> Result<()> {
        tracing::debug!(sql, "execute batch");
        let sql = sql.to_string();
        run(&self.conn, self.operation_timeout, move |conn| conn.execute_batch(&sql)).await
    }
}

/// Run `f` against the connection on deadpool's blocking pool
async fn run<T, F>(conn: &Object, timeout: Duration, f: F) -> Result<T>
where
    F: FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::time::timeout(timeout, conn.interact(f))
        .await
        .map_err(|_| DatabaseError::query_timeout(timeout.as_millis() as u64))?
        .map_err(interact_error)?
        .map_err(DatabaseError::from)
}

/// Convert a rusqlite Row to a Record
///
/// Column names are read from the row, not the prepared statement: a cached
/// statement is recompiled on its first step after a schema change.
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
    let stmt = row.as_ref();
    let column_count = stmt.column_count();
    let mut record = Record::with_capacity(column_count);

    for i in 0..column_count {
        let column_name = stmt.column_name(i)?.to_string();
        record.insert(column_name, from_sqlite(row.get_ref(i)?));
    }

    Ok(record)
}

fn from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(v) => Value::String(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => Value::Bytes(v.to_vec()),
    }
}

/// Convert a Value to its SQLite storage class
fn to_sqlite(value: &Value) -> SqliteValue {
    match value {
        Value::Null => SqliteValue::Null,
        Value::Bool(v) => SqliteValue::Integer(i64::from(*v)),
        Value::Int(v) => SqliteValue::Integer(*v),
        Value::Float(v) => SqliteValue::Real(*v),
        Value::String(v) | Value::Decimal(v) => SqliteValue::Text(v.clone()),
        Value::Bytes(v) => SqliteValue::Blob(v.clone()),
        Value::Date(v) => SqliteValue::Text(v.format(DATE_FORMAT).to_string()),
        Value::DateTime(v) => SqliteValue::Text(v.format(DATETIME_FORMAT).to_string()),
        Value::Json(v) => SqliteValue::Text(v.to_string()),
    }
}
