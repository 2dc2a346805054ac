//! Core mapper types and traits
//!
//! This module provides the building blocks the record layer is written
//! against: error and value types, dialects, column types, statement builders,
//! the engine capability traits and transactions.

pub mod column_type;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod introspect;
pub mod options;
pub mod statement;
pub mod transaction;
pub mod url;
pub mod value;

// Re-export commonly used types
pub use column_type::{ColumnInfo, ColumnType, PrimaryKey, PrimaryKeyType};
pub use dialect::Dialect;
pub use engine::{Engine, EngineConnection, PoolStats};
pub use error::{DatabaseError, Result};
pub use options::ConnectOptions;
pub use statement::{
    CreateTableBuilder, DeleteBuilder, InsertBuilder, OrderDirection, SelectBuilder, Statement,
    UpdateBuilder,
};
pub use transaction::Transaction;
pub use url::{ConnectionUrl, Target};
pub use value::{record_from_json, Record, Value};
