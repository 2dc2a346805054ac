//! Catalog introspection
//!
//! Reads table and column metadata through an ordinary [`EngineConnection`]
//! using the dialect's catalog queries.

use super::column_type::{ColumnInfo, ColumnType};
use super::engine::EngineConnection;
use super::error::{DatabaseError, Result};
use super::value::{Record, Value};

/// Names of all user tables, sorted
pub async fn table_names(conn: &dyn EngineConnection) -> Result<Vec<String>> {
    let rows = conn.query(conn.dialect().table_names_sql(), &[]).await?;
    rows.iter().map(|row| text_field(row, "name")).collect()
}

/// Whether `table` exists
pub async fn has_table(conn: &dyn EngineConnection, table: &str) -> Result<bool> {
    Ok(!columns(conn, table).await?.is_empty())
}

/// Columns of `table` in declaration order; empty when the table does not exist
pub async fn columns(conn: &dyn EngineConnection, table: &str) -> Result<Vec<ColumnInfo>> {
    let rows = conn
        .query(conn.dialect().columns_sql(), &[Value::from(table)])
        .await?;
    tracing::debug!(table, columns = rows.len(), "introspected table");
    rows.iter().map(column_info).collect()
}

fn column_info(row: &Record) -> Result<ColumnInfo> {
    let name = text_field(row, "name")?;
    // SQLite reports an empty declared type for untyped columns.
    let declared_type = match row.get("declared_type") {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };

    Ok(ColumnInfo {
        column_type: ColumnType::from_declared(&declared_type),
        primary_key: flag_field(row, "primary_key"),
        nullable: flag_field(row, "nullable"),
        autoincrement: flag_field(row, "autoincrement"),
        name,
        declared_type,
    })
}

fn text_field(row: &Record, field: &str) -> Result<String> {
    match row.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(DatabaseError::type_mismatch("string", other.type_name())),
        None => Err(DatabaseError::query(format!(
            "catalog row is missing '{}'",
            field
        ))),
    }
}

fn flag_field(row: &Record, field: &str) -> bool {
    row.get(field).and_then(Value::as_bool).unwrap_or(false)
}
