//! # schemaless_sql
//!
//! Persist dictionary-shaped records into relational tables without declaring
//! a schema first. Tables are created on first write, every new record key
//! becomes a column whose type is inferred from its value, and reads, updates
//! and deletes take plain equality filters.
//!
//! ## Features
//!
//! - **Schema on write**: `CREATE TABLE` and `ALTER TABLE ... ADD COLUMN` issued on demand
//! - **Drift healing**: the cached schema is re-read whenever another writer got there first
//! - **Async Support**: async/await on Tokio, pooled connections per URL
//! - **Parameterized SQL**: values are always bound, identifiers always quoted
//! - **Transactions**: every write is one transaction, rolled back on failure
//!
//! ## Supported Databases
//!
//! | Database | Feature | Pool |
//! |----------|---------|------|
//! | SQLite | `sqlite` (default) | deadpool-sqlite, bundled |
//! | PostgreSQL | `postgres` | deadpool-postgres |
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! schemaless_sql = { version = "0.1", features = ["sqlite"] }
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! ### Basic Usage
//!
//! ```rust,no_run
//! use schemaless_sql::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let users = get_table("sqlite:///app.db", "users").await?;
//!
//!     // The table and its columns appear as records need them.
//!     users.insert(&record! { "name" => "Alice", "age" => 30 }).await?;
//!     users.insert(&record! { "name" => "Bob", "age" => 25, "email" => "bob@example.com" }).await?;
//!
//!     // Insert or update by key.
//!     users.upsert(&record! { "name" => "Bob", "age" => 26 }, &["name"]).await?;
//!
//!     let oldest = users.find(&Query::new().order_by("-age").limit(1)).await?;
//!     for row in oldest {
//!         println!("{}: {}", row["name"].as_string(), row["age"].as_string());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Project Structure
//!
//! ```text
//! schemaless_sql/
//! ├── src/
//! │   ├── core/              # Values, errors, dialects, statements, engine traits
//! │   ├── backends/          # SQLite and PostgreSQL engines
//! │   ├── database.rs        # Per-URL handle and table cache
//! │   ├── registry.rs        # Process-wide handle registry
//! │   ├── schema.rs          # Table creation and column widening
//! │   ├── table.rs           # Record operations
//! │   └── lib.rs
//! ├── demos/                 # Example programs
//! ├── tests/                 # Integration and property tests
//! └── benches/
//! ```

/// Core types and traits
pub mod core;

/// Engine implementations
pub mod backends;

pub mod database;
pub mod registry;
pub mod schema;
pub mod table;

/// Prelude for convenient imports
///
/// ```rust
/// use schemaless_sql::prelude::*;
///
/// let query = Query::new().where_eq("name", "Alice");
/// assert_eq!(query.filters()["name"], Value::from("Alice"));
/// ```
pub mod prelude {
    pub use crate::core::{
        ConnectOptions, DatabaseError, Dialect, PrimaryKey, PrimaryKeyType, Record, Result, Value,
    };
    pub use crate::database::Database;
    pub use crate::record;
    pub use crate::registry::{close, connect, connect_with, get_table};
    pub use crate::table::{Query, Table};
}

// Re-export at root level for convenience
pub use crate::core::{
    record_from_json, ColumnType, ConnectOptions, DatabaseError, Dialect, PrimaryKey,
    PrimaryKeyType, Record, Result, Value,
};
pub use database::Database;
pub use registry::{close, connect, connect_with, get_table, ConnectionRegistry};
pub use schema::{SchemaView, TableSchema};
pub use table::{Query, Table};
