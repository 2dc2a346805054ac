//! Transaction guard for automatic rollback on drop
//!
//! A [`Transaction`] owns the pooled connection it runs on. Commit and
//! rollback consume the guard; a guard dropped while still open (an early `?`
//! return, a cancelled future) rolls back on a spawned task before the
//! connection returns to the pool.

use super::engine::{Engine, EngineConnection};
use super::error::{DatabaseError, Result};
use super::value::{Record, Value};

/// Transaction guard that rolls back on drop if not committed
///
/// # Example
///
/// ```no_run
/// use schemaless_sql::backends::SqliteEngine;
/// use schemaless_sql::core::{ConnectOptions, Transaction};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let engine = SqliteEngine::open_memory(ConnectOptions::default()).await?;
///     let tx = Transaction::begin(&engine).await?;
///     tx.execute("CREATE TABLE accounts (id INTEGER PRIMARY KEY)", &[]).await?;
///     tx.commit().await?;
///     Ok(())
/// }
/// ```
pub struct Transaction {
    conn: Option<Box<dyn EngineConnection>>,
}

impl Transaction {
    /// Check out a connection and open a transaction on it
    ///
    /// # Errors
    ///
    /// Returns an error if no connection can be acquired or the engine refuses
    /// to start the transaction.
    pub async fn begin(engine: &dyn Engine) -> Result<Self> {
        let conn = engine.acquire().await?;
        Self::begin_on(conn).await
    }

    /// Open a transaction on a connection that is already checked out
    pub async fn begin_on(conn: Box<dyn EngineConnection>) -> Result<Self> {
        conn.execute_batch(conn.dialect().begin_sql()).await?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&self) -> Result<&dyn EngineConnection> {
        self.conn
            .as_deref()
            .ok_or_else(|| DatabaseError::transaction("Transaction is already finished"))
    }

    /// Execute a parameterized statement within the transaction
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.conn()?.execute(sql, params).await
    }

    /// Run a parameterized query within the transaction
    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        self.conn()?.query(sql, params).await
    }

    /// Commit the transaction
    ///
    /// # Errors
    ///
    /// Returns the commit error. The transaction is rolled back before the
    /// error is returned, so the connection goes back to the pool clean.
    pub async fn commit(mut self) -> Result<()> {
        let conn = self
            .conn
            .take()
            .ok_or_else(|| DatabaseError::transaction("Transaction is already finished"))?;

        if let Err(e) = conn.execute_batch("COMMIT").await {
            if let Err(rollback_err) = conn.execute_batch("ROLLBACK").await {
                tracing::warn!(error = %rollback_err, "rollback after failed commit also failed");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Explicitly roll back the transaction
    pub async fn rollback(mut self) -> Result<()> {
        let conn = self
            .conn
            .take()
            .ok_or_else(|| DatabaseError::transaction("Transaction is already finished"))?;
        conn.execute_batch("ROLLBACK").await
    }

    /// Whether the guard still holds an open transaction
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!("transaction dropped without commit or rollback; rolling back");
                handle.spawn(async move {
                    if let Err(e) = conn.execute_batch("ROLLBACK").await {
                        tracing::warn!(error = %e, "automatic rollback failed");
                    }
                });
            }
            Err(_) => {
                // The backend discards the open transaction on its next checkout.
                tracing::warn!("transaction dropped outside a tokio runtime; rollback deferred");
            }
        }
    }
}
