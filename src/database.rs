//! Database handle
//!
//! A [`Database`] owns one engine (connection pool) for one URL and caches a
//! [`Table`] per table name, so every caller working on the same table shares
//! its schema cache and DDL lock.

use crate::core::{
    column_type::PrimaryKey,
    error::{DatabaseError, Result},
    introspect,
    statement::drop_table_sql,
    ConnectOptions, ConnectionUrl, Dialect, Engine, PoolStats, Record, Target, Value,
};
use crate::table::Table;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "postgres")]
use crate::backends::PostgresEngine;
#[cfg(feature = "sqlite")]
use crate::backends::SqliteEngine;

/// Handle on one database
///
/// # Example
///
/// ```no_run
/// use schemaless_sql::{record, ConnectOptions, Database, Query};
///
/// #[tokio::main]
/// async fn main() -> schemaless_sql::Result<()> {
///     let db = Database::open("sqlite:///app.db", ConnectOptions::default()).await?;
///     let users = db.table("users").await?;
///     users.insert(&record! { "name" => "Alice", "age" => 30 }).await?;
///     assert_eq!(users.count(&Query::new()).await?, 1);
///     Ok(())
/// }
/// ```
pub struct Database {
    url: ConnectionUrl,
    engine: Arc<dyn Engine>,
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl Database {
    /// Open a pool for `url`
    ///
    /// # Errors
    ///
    /// `InvalidConnectionString` or `UnsupportedDialect` for URLs this build
    /// cannot serve, connectivity errors when the engine cannot be reached.
    pub async fn open(url: &str, options: ConnectOptions) -> Result<Self> {
        let url = ConnectionUrl::parse(url)?;
        let engine: Arc<dyn Engine> = match url.target() {
            #[cfg(feature = "sqlite")]
            Target::SqliteMemory => Arc::new(SqliteEngine::open_memory(options).await?),
            #[cfg(feature = "sqlite")]
            Target::SqliteFile(path) => Arc::new(SqliteEngine::open(path, options).await?),
            #[cfg(feature = "postgres")]
            Target::Postgres(conn) => Arc::new(PostgresEngine::connect(conn, options).await?),
            #[allow(unreachable_patterns)]
            _ => {
                let _ = options;
                return Err(DatabaseError::unsupported_dialect(format!(
                    "{} (feature not enabled)",
                    url.dialect()
                )));
            }
        };

        tracing::info!(url = %url, dialect = %url.dialect(), "opened database");
        Ok(Self::with_engine(url, engine))
    }

    /// Wrap an already constructed engine
    pub fn with_engine(url: ConnectionUrl, engine: Arc<dyn Engine>) -> Self {
        Self {
            url,
            engine,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// URL this handle was opened with
    pub fn url(&self) -> &ConnectionUrl {
        &self.url
    }

    /// Dialect of the underlying engine
    pub fn dialect(&self) -> Dialect {
        self.engine.dialect()
    }

    /// Underlying engine
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Handle on table `name`, created with an `id` autoincrement key on first write
    pub async fn table(&self, name: &str) -> Result<Arc<Table>> {
        self.cached_table(name, PrimaryKey::default()).await
    }

    /// Create table `name` with `primary_key` now, or return it if it exists
    ///
    /// An existing table keeps whatever key it was created with.
    pub async fn create_table(&self, name: &str, primary_key: PrimaryKey) -> Result<Arc<Table>> {
        let table = self.cached_table(name, primary_key.clone()).await?;
        table.schema().ensure_table(&primary_key).await?;
        Ok(table)
    }

    async fn cached_table(&self, name: &str, primary_key: PrimaryKey) -> Result<Arc<Table>> {
        let cached = self.tables.read().get(name).cloned();
        if let Some(table) = cached {
            return Ok(table);
        }

        let table = Arc::new(Table::open(Arc::clone(&self.engine), name, primary_key).await?);
        let mut tables = self.tables.write();
        // Another task may have opened the same table while we introspected.
        Ok(Arc::clone(tables.entry(name.to_string()).or_insert(table)))
    }

    /// Drop table `name` if it exists and forget its handle
    ///
    /// Handles still held elsewhere see the table as absent and recreate it on
    /// their next write.
    pub async fn drop_table(&self, name: &str) -> Result<()> {
        self.engine
            .execute(&drop_table_sql(self.dialect(), name), &[])
            .await?;
        tracing::info!(table = %name, "dropped table");

        let forgotten = self.tables.write().remove(name);
        if let Some(table) = forgotten {
            table.schema().refresh().await?;
        }
        Ok(())
    }

    /// Names of the user tables, sorted
    pub async fn table_names(&self) -> Result<Vec<String>> {
        let conn = self.engine.acquire().await?;
        introspect::table_names(conn.as_ref()).await
    }

    /// Whether table `name` exists
    pub async fn has_table(&self, name: &str) -> Result<bool> {
        let conn = self.engine.acquire().await?;
        introspect::has_table(conn.as_ref(), name).await
    }

    /// Run a raw parameterized query
    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        self.engine.query(sql, params).await
    }

    /// Execute a raw parameterized statement
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.engine.execute(sql, params).await
    }

    /// Pool status
    pub fn stats(&self) -> PoolStats {
        self.engine.stats()
    }

    /// Close the pool and forget all table handles
    pub fn close(&self) {
        self.tables.write().clear();
        self.engine.close();
        tracing::info!(url = %self.url, "closed database");
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("url", &self.url)
            .field("dialect", &self.dialect())
            .field("tables", &self.tables.read().keys().collect::<Vec<_>>())
            .finish()
    }
}
