//! Per-table schema management
//!
//! [`TableSchema`] owns the cached column view of one table. It creates the
//! table on first write, adds a column for every unseen record key and
//! re-reads the catalog after every change, so the cache mirrors the physical
//! table instead of what the mapper believes it did.

use crate::core::{
    column_type::{ColumnInfo, ColumnType, PrimaryKey},
    error::Result,
    introspect,
    statement::{add_column_sql, CreateTableBuilder},
    Engine, Record,
};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Snapshot of a table's physical schema
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaView {
    /// Table name
    pub table: String,
    /// Whether the table exists
    pub exists: bool,
    /// Columns in declaration order
    pub columns: IndexMap<String, ColumnInfo>,
    /// First primary-key column, if the table has one
    pub primary_key: Option<String>,
    /// Whether the primary key is generated by the engine
    pub autoincrement: bool,
}

impl SchemaView {
    fn absent(table: &str) -> Self {
        Self {
            table: table.to_string(),
            exists: false,
            columns: IndexMap::new(),
            primary_key: None,
            autoincrement: false,
        }
    }

    fn from_columns(table: &str, columns: Vec<ColumnInfo>) -> Self {
        let pk = columns.iter().find(|c| c.primary_key);
        Self {
            table: table.to_string(),
            exists: !columns.is_empty(),
            primary_key: pk.map(|c| c.name.clone()),
            autoincrement: pk.is_some_and(|c| c.autoincrement),
            columns: columns.into_iter().map(|c| (c.name.clone(), c)).collect(),
        }
    }

    /// Whether the table has a column named `name`
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Column metadata by name
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.get(name)
    }

    /// Column names in declaration order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}

/// Mutable schema state of one table
///
/// Readers take cheap snapshots through [`view`](Self::view). DDL is
/// serialized by a per-table async lock, and every DDL path re-reads the
/// catalog after taking it, because another handle or process may have made
/// the same change first.
pub struct TableSchema {
    engine: Arc<dyn Engine>,
    name: String,
    state: RwLock<Arc<SchemaView>>,
    ddl: Mutex<()>,
}

impl TableSchema {
    /// Load the schema of `name` from the catalog
    pub async fn load(engine: Arc<dyn Engine>, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let schema = Self {
            state: RwLock::new(Arc::new(SchemaView::absent(&name))),
            engine,
            name,
            ddl: Mutex::new(()),
        };
        schema.refresh().await?;
        Ok(schema)
    }

    /// Table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current cached view
    pub fn view(&self) -> Arc<SchemaView> {
        Arc::clone(&self.state.read())
    }

    /// Re-read the table's columns from the catalog and replace the cache
    pub async fn refresh(&self) -> Result<Arc<SchemaView>> {
        let columns = {
            let conn = self.engine.acquire().await?;
            introspect::columns(conn.as_ref(), &self.name).await?
        };
        let view = Arc::new(SchemaView::from_columns(&self.name, columns));
        *self.state.write() = Arc::clone(&view);
        Ok(view)
    }

    /// Make sure the table exists, creating it with only `primary_key` if not
    ///
    /// Idempotent. A concurrent creator winning the race is not an error.
    pub async fn ensure_table(&self, primary_key: &PrimaryKey) -> Result<Arc<SchemaView>> {
        let view = self.view();
        if view.exists {
            return Ok(view);
        }

        let _guard = self.ddl.lock().await;
        let view = self.refresh().await?;
        if view.exists {
            return Ok(view);
        }

        let dialect = self.engine.dialect();
        let sql = CreateTableBuilder::new(&self.name)
            .primary_key(primary_key.clone())
            .build(dialect);
        {
            let conn = self.engine.acquire().await?;
            match conn.execute_batch(&sql).await {
                Ok(()) => tracing::info!(table = %self.name, "created table"),
                Err(e) if e.is_already_exists() => {
                    tracing::warn!(table = %self.name, error = %e, "table created concurrently");
                }
                Err(e) => return Err(e),
            }
        }

        self.refresh().await
    }

    /// Add a column for every key of `record` the table does not have yet
    ///
    /// Column types are inferred from the record's values. The table must
    /// already exist.
    pub async fn reconcile_columns(&self, record: &Record) -> Result<Arc<SchemaView>> {
        let view = self.view();
        if record.keys().all(|k| view.has_column(k)) {
            return Ok(view);
        }

        let _guard = self.ddl.lock().await;
        let view = self.refresh().await?;
        let missing: Vec<(&String, ColumnType)> = record
            .iter()
            .filter(|(k, _)| !view.has_column(k))
            .map(|(k, v)| (k, ColumnType::infer(v)))
            .collect();
        if missing.is_empty() {
            return Ok(view);
        }

        let dialect = self.engine.dialect();
        {
            let conn = self.engine.acquire().await?;
            for (column, column_type) in missing {
                let sql = add_column_sql(dialect, &self.name, column, column_type);
                match conn.execute_batch(&sql).await {
                    Ok(()) => tracing::info!(
                        table = %self.name,
                        column = %column,
                        column_type = ?column_type,
                        "added column"
                    ),
                    Err(e) if e.is_already_exists() => tracing::warn!(
                        table = %self.name,
                        column = %column,
                        "column added concurrently"
                    ),
                    Err(e) => return Err(e),
                }
            }
        }

        self.refresh().await
    }

    /// Render the table's current definition as a `CREATE TABLE` statement
    ///
    /// Returns `None` when the table does not exist.
    pub async fn create_table_sql(&self) -> Result<Option<String>> {
        let view = self.refresh().await?;
        if !view.exists {
            return Ok(None);
        }

        let dialect = self.engine.dialect();
        let builder = view
            .columns
            .values()
            .fold(CreateTableBuilder::new(&self.name), |builder, col| {
                let mut parts = Vec::new();
                if !col.declared_type.is_empty() {
                    parts.push(col.declared_type.to_uppercase());
                }
                if !col.nullable && !col.primary_key {
                    parts.push("NOT NULL".to_string());
                }
                if col.primary_key {
                    parts.push("PRIMARY KEY".to_string());
                }
                builder.declared_column(&col.name, parts.join(" "))
            });

        Ok(Some(builder.build(dialect)))
    }
}

impl std::fmt::Debug for TableSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableSchema")
            .field("name", &self.name)
            .field("view", &self.view())
            .finish()
    }
}
