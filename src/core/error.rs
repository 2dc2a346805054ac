//! Error types for the mapper
//!
//! This module defines all error types that can occur while reaching the engine,
//! evolving a table's schema, or running record operations.

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Error types for database operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Connection error (generic)
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Timed out waiting for a pooled connection
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout { timeout_ms: u64 },

    /// Connection pool exhausted
    #[error("Connection pool exhausted: {active}/{max} connections in use")]
    PoolExhausted { active: usize, max: usize },

    /// Query execution error
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// Query timeout
    #[error("Query timeout after {timeout_ms}ms")]
    QueryTimeout { timeout_ms: u64 },

    /// Type conversion error
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Invalid connection string
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// The URL names a dialect this build cannot serve
    #[error("Unsupported dialect: {0}")]
    UnsupportedDialect(String),

    /// Transaction error
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// SQLite error
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// PostgreSQL error
    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    PostgresError(#[from] tokio_postgres::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl DatabaseError {
    /// Create a new connection error (generic)
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        DatabaseError::ConnectionError(msg.into())
    }

    /// Create a connection timeout error
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        DatabaseError::ConnectionTimeout { timeout_ms }
    }

    /// Create a pool exhausted error
    pub fn pool_exhausted(active: usize, max: usize) -> Self {
        DatabaseError::PoolExhausted { active, max }
    }

    /// Create a new query error
    pub fn query<S: Into<String>>(msg: S) -> Self {
        DatabaseError::QueryError(msg.into())
    }

    /// Create a query timeout error
    pub fn query_timeout(timeout_ms: u64) -> Self {
        DatabaseError::QueryTimeout { timeout_ms }
    }

    /// Create a new type mismatch error
    pub fn type_mismatch(expected: &str, actual: &str) -> Self {
        DatabaseError::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create an invalid connection string error
    pub fn invalid_url<S: Into<String>>(msg: S) -> Self {
        DatabaseError::InvalidConnectionString(msg.into())
    }

    /// Create an unsupported dialect error
    pub fn unsupported_dialect<S: Into<String>>(dialect: S) -> Self {
        DatabaseError::UnsupportedDialect(dialect.into())
    }

    /// Create a new transaction error
    pub fn transaction<S: Into<String>>(msg: S) -> Self {
        DatabaseError::TransactionError(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Other(msg.into())
    }

    /// Whether the error means the engine could not be reached or used.
    ///
    /// These are surfaced to the caller unchanged; retrying is the caller's call.
    pub fn is_connectivity(&self) -> bool {
        match self {
            DatabaseError::ConnectionError(_)
            | DatabaseError::ConnectionTimeout { .. }
            | DatabaseError::PoolExhausted { .. } => true,
            #[cfg(feature = "sqlite")]
            DatabaseError::SqliteError(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::CannotOpen
                    | rusqlite::ErrorCode::NotADatabase
                    | rusqlite::ErrorCode::PermissionDenied
            ),
            #[cfg(feature = "postgres")]
            DatabaseError::PostgresError(e) => e.is_closed() || e.code().is_none(),
            _ => false,
        }
    }

    /// Whether the engine rejected DDL because the table or column is already there.
    ///
    /// Another writer (thread or process) won the race; the schema is re-read
    /// instead of failing.
    pub fn is_already_exists(&self) -> bool {
        match self {
            #[cfg(feature = "sqlite")]
            DatabaseError::SqliteError(rusqlite::Error::SqliteFailure(_, Some(msg))) => {
                let msg = msg.to_lowercase();
                msg.contains("already exists") || msg.contains("duplicate column name")
            }
            #[cfg(feature = "postgres")]
            DatabaseError::PostgresError(e) => {
                use tokio_postgres::error::SqlState;
                // 23505 shows up when two sessions create the same table and collide on pg_type.
                matches!(
                    e.code(),
                    Some(code) if *code == SqlState::DUPLICATE_TABLE
                        || *code == SqlState::DUPLICATE_COLUMN
                        || *code == SqlState::UNIQUE_VIOLATION
                )
            }
            DatabaseError::QueryError(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("already exists") || msg.contains("duplicate column")
            }
            _ => false,
        }
    }
}
