//! Record operations on one table
//!
//! A [`Table`] turns records into parameterized statements against the
//! current [`SchemaView`]. Writes create the table and widen it on demand;
//! fields the table does not know are ignored everywhere else.

use crate::core::{
    column_type::PrimaryKey,
    error::Result,
    statement::{DeleteBuilder, InsertBuilder, OrderDirection, SelectBuilder, UpdateBuilder},
    Engine, Record, Transaction, Value,
};
use crate::schema::{SchemaView, TableSchema};
use std::sync::Arc;

/// Equality filter, ordering and pagination for reads
///
/// # Example
///
/// ```
/// use schemaless_sql::Query;
///
/// let query = Query::new()
///     .where_eq("status", "active")
///     .order_by("-age")
///     .order_by("name")
///     .limit(10);
/// assert_eq!(query.filters().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filter: Record,
    order_by: Vec<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl Query {
    /// Match every row
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field = value`; a `Null` value matches `IS NULL`
    #[must_use]
    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filter.insert(field.to_string(), value.into());
        self
    }

    /// Require every `field = value` pair of `filter`
    #[must_use]
    pub fn filter(mut self, filter: Record) -> Self {
        self.filter.extend(filter);
        self
    }

    /// Order by a field; a leading `-` sorts descending
    #[must_use]
    pub fn order_by(mut self, spec: &str) -> Self {
        self.order_by.push(spec.to_string());
        self
    }

    /// Return at most `limit` rows
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first `offset` rows
    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Equality filter
    pub fn filters(&self) -> &Record {
        &self.filter
    }

    fn fields(&self) -> impl Iterator<Item = &str> {
        self.filter.keys().map(String::as_str).chain(
            self.order_by
                .iter()
                .map(|spec| OrderDirection::parse(spec).0),
        )
    }
}

impl From<Record> for Query {
    fn from(filter: Record) -> Self {
        Self::new().filter(filter)
    }
}

/// Fields of `record` the table has a column for
fn known_fields<'r>(view: &SchemaView, record: &'r Record) -> Vec<(&'r str, &'r Value)> {
    record
        .iter()
        .filter(|(k, _)| view.has_column(k))
        .map(|(k, v)| (k.as_str(), v))
        .collect()
}

/// Record store for one table
pub struct Table {
    engine: Arc<dyn Engine>,
    schema: TableSchema,
    primary_key: PrimaryKey,
}

impl Table {
    /// Open a handle; the table is created with `primary_key` on first write
    pub async fn open(
        engine: Arc<dyn Engine>,
        name: impl Into<String>,
        primary_key: PrimaryKey,
    ) -> Result<Self> {
        let schema = TableSchema::load(Arc::clone(&engine), name).await?;
        Ok(Self {
            engine,
            schema,
            primary_key,
        })
    }

    /// Table name
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Schema manager behind this handle
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Primary key used if this handle creates the table
    pub fn primary_key(&self) -> &PrimaryKey {
        &self.primary_key
    }

    /// Whether the table existed at the last catalog read
    pub fn exists(&self) -> bool {
        self.schema.view().exists
    }

    /// Column names at the last catalog read
    pub fn columns(&self) -> Vec<String> {
        self.schema.view().columns.keys().cloned().collect()
    }

    /// Create the table if needed and return its schema
    pub async fn ensure(&self) -> Result<Arc<SchemaView>> {
        self.schema.ensure_table(&self.primary_key).await
    }

    /// `CREATE TABLE` statement for the table as it exists now
    pub async fn create_table_sql(&self) -> Result<Option<String>> {
        self.schema.create_table_sql().await
    }

    async fn write_view(&self, record: &Record, ensure: bool) -> Result<Arc<SchemaView>> {
        let view = self.ensure().await?;
        if ensure {
            self.schema.reconcile_columns(record).await
        } else {
            Ok(view)
        }
    }

    /// Cached view, re-read once if the table or any of `fields` is unknown
    async fn resolve<'a>(&self, mut fields: impl Iterator<Item = &'a str>) -> Result<Arc<SchemaView>> {
        let view = self.schema.view();
        if view.exists && fields.all(|f| view.has_column(f)) {
            return Ok(view);
        }
        self.schema.refresh().await
    }

    fn decode(view: &SchemaView, row: Record) -> Record {
        row.into_iter()
            .map(|(name, value)| {
                let value = match view.column(&name) {
                    Some(column) => column.column_type.decode(value),
                    None => value,
                };
                (name, value)
            })
            .collect()
    }

    fn insert_builder(&self, view: &SchemaView, record: &Record) -> InsertBuilder {
        known_fields(view, record)
            .into_iter()
            .fold(InsertBuilder::new(self.name()), |builder, (field, value)| {
                builder.value(field, value.clone())
            })
    }

    /// Insert one record, adding columns for new fields
    ///
    /// Returns the generated primary key when the key autoincrements. An
    /// empty record is not written.
    pub async fn insert(&self, record: &Record) -> Result<Option<Value>> {
        self.insert_with(record, true).await
    }

    /// Insert one record; with `ensure` off unknown fields are dropped instead
    pub async fn insert_with(&self, record: &Record, ensure: bool) -> Result<Option<Value>> {
        if record.is_empty() {
            return Ok(None);
        }

        let view = self.write_view(record, ensure).await?;
        let generated = match (&view.primary_key, view.autoincrement) {
            (Some(pk), true) => Some(pk.as_str()),
            _ => None,
        };

        let mut builder = self.insert_builder(&view, record);
        if let Some(pk) = generated {
            builder = builder.returning(pk);
        }
        let stmt = builder.build(self.engine.dialect());

        let tx = Transaction::begin(self.engine.as_ref()).await?;
        let rows = tx.query(&stmt.sql, &stmt.params).await?;
        tx.commit().await?;

        tracing::debug!(table = %self.name(), "inserted record");
        Ok(generated.and_then(|pk| rows.into_iter().next()?.shift_remove(pk)))
    }

    /// Insert many records in one transaction
    ///
    /// The schema is widened with the union of all keys, each typed by the
    /// first non-null value seen for it. Returns the number of rows written;
    /// rows left with no known field are skipped.
    pub async fn insert_many(&self, rows: &[Record]) -> Result<u64> {
        self.insert_many_with(rows, true).await
    }

    /// [`insert_many`](Self::insert_many) with widening switchable
    pub async fn insert_many_with(&self, rows: &[Record], ensure: bool) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let view = if ensure {
            let mut sample = Record::new();
            for (key, value) in rows.iter().flatten() {
                let slot = sample.entry(key.clone()).or_insert(Value::Null);
                if slot.is_null() && !value.is_null() {
                    *slot = value.clone();
                }
            }
            self.write_view(&sample, true).await?
        } else {
            self.ensure().await?
        };

        let dialect = self.engine.dialect();
        let statements: Vec<_> = rows
            .iter()
            .filter(|row| row.keys().any(|k| view.has_column(k)))
            .map(|row| self.insert_builder(&view, row).build(dialect))
            .collect();
        if statements.is_empty() {
            return Ok(0);
        }

        let tx = Transaction::begin(self.engine.as_ref()).await?;
        for stmt in &statements {
            tx.execute(&stmt.sql, &stmt.params).await?;
        }
        tx.commit().await?;

        tracing::debug!(table = %self.name(), rows = statements.len(), "inserted records");
        Ok(statements.len() as u64)
    }

    /// Insert the record, or update the row whose `keys` fields match it
    ///
    /// Returns `false` without writing when the record or `keys` is empty.
    /// When none of `keys` is a known field present in the record, the
    /// record is inserted.
    pub async fn upsert(&self, record: &Record, keys: &[&str]) -> Result<bool> {
        self.upsert_with(record, keys, true).await
    }

    /// [`upsert`](Self::upsert) with widening switchable
    pub async fn upsert_with(&self, record: &Record, keys: &[&str], ensure: bool) -> Result<bool> {
        if record.is_empty() || keys.is_empty() {
            return Ok(false);
        }

        let view = self.write_view(record, ensure).await?;
        let conditions: Vec<(&str, &Value)> = keys
            .iter()
            .filter_map(|k| record.get_key_value(*k))
            .filter(|(k, _)| view.has_column(k))
            .map(|(k, v)| (k.as_str(), v))
            .collect();

        if conditions.is_empty() {
            self.insert_with(record, false).await?;
            return Ok(true);
        }

        let dialect = self.engine.dialect();
        let select = conditions
            .iter()
            .fold(
                SelectBuilder::new(self.name()).columns(&[conditions[0].0]),
                |builder, (k, v)| builder.where_eq(k, (*v).clone()),
            )
            .limit(1)
            .build(dialect);

        let tx = Transaction::begin(self.engine.as_ref()).await?;
        if let Some(lock_sql) = dialect.upsert_lock_sql() {
            tx.execute(lock_sql, &[Value::from(self.name())]).await?;
        }

        let existing = tx.query(&select.sql, &select.params).await?;
        if existing.is_empty() {
            let stmt = self.insert_builder(&view, record).build(dialect);
            tx.execute(&stmt.sql, &stmt.params).await?;
        } else {
            let changes: Vec<(&str, &Value)> = known_fields(&view, record)
                .into_iter()
                .filter(|(k, _)| !keys.contains(k))
                .collect();
            if !changes.is_empty() {
                let stmt = conditions
                    .iter()
                    .fold(
                        changes
                            .iter()
                            .fold(UpdateBuilder::new(self.name()), |b, (k, v)| {
                                b.set(k, (*v).clone())
                            }),
                        |b, (k, v)| b.where_eq(k, (*v).clone()),
                    )
                    .build(dialect);
                tx.execute(&stmt.sql, &stmt.params).await?;
            }
        }
        tx.commit().await?;

        tracing::debug!(table = %self.name(), updated = !existing.is_empty(), "upserted record");
        Ok(true)
    }

    /// Update rows matching the record's `keys` fields with its other fields
    ///
    /// Returns the number of rows updated: 0 when the table does not exist,
    /// when no key field is usable, or when nothing is left to set.
    pub async fn update(&self, record: &Record, keys: &[&str]) -> Result<u64> {
        self.update_with(record, keys, true).await
    }

    /// [`update`](Self::update) with widening switchable
    pub async fn update_with(&self, record: &Record, keys: &[&str], ensure: bool) -> Result<u64> {
        if record.is_empty() || keys.is_empty() {
            return Ok(0);
        }

        let view = self.resolve(record.keys().map(String::as_str)).await?;
        if !view.exists {
            return Ok(0);
        }
        let view = if ensure {
            self.schema.reconcile_columns(record).await?
        } else {
            view
        };

        let fields = known_fields(&view, record);
        let (conditions, changes): (Vec<_>, Vec<_>) =
            fields.into_iter().partition(|(k, _)| keys.contains(k));
        if conditions.is_empty() || changes.is_empty() {
            return Ok(0);
        }

        let builder = changes
            .iter()
            .fold(UpdateBuilder::new(self.name()), |b, (k, v)| b.set(k, (*v).clone()));
        let stmt = conditions
            .iter()
            .fold(builder, |b, (k, v)| b.where_eq(k, (*v).clone()))
            .build(self.engine.dialect());

        let tx = Transaction::begin(self.engine.as_ref()).await?;
        let updated = tx.execute(&stmt.sql, &stmt.params).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Delete rows matching `filter`; an empty filter deletes every row
    pub async fn delete(&self, filter: &Record) -> Result<u64> {
        let view = self.resolve(filter.keys().map(String::as_str)).await?;
        if !view.exists {
            return Ok(0);
        }

        let stmt = known_fields(&view, filter)
            .into_iter()
            .fold(DeleteBuilder::new(self.name()), |b, (k, v)| {
                b.where_eq(k, v.clone())
            })
            .build(self.engine.dialect());

        let tx = Transaction::begin(self.engine.as_ref()).await?;
        let deleted = tx.execute(&stmt.sql, &stmt.params).await?;
        tx.commit().await?;
        Ok(deleted)
    }

    fn select_builder(&self, view: &SchemaView, query: &Query) -> SelectBuilder {
        let builder = known_fields(view, &query.filter)
            .into_iter()
            .fold(SelectBuilder::new(self.name()), |b, (k, v)| {
                b.where_eq(k, v.clone())
            });
        query
            .order_by
            .iter()
            .map(|spec| OrderDirection::parse(spec))
            .filter(|(column, _)| view.has_column(column))
            .fold(builder, |b, (column, direction)| b.order_by(column, direction))
    }

    /// Rows matching `query`, fully materialized
    ///
    /// Unknown filter and order fields are ignored; a table that does not
    /// exist yields no rows.
    pub async fn find(&self, query: &Query) -> Result<Vec<Record>> {
        let view = self.resolve(query.fields()).await?;
        if !view.exists {
            return Ok(Vec::new());
        }

        // Name the columns: a cached `SELECT *` plan goes stale when a column is added.
        let columns: Vec<&str> = view.column_names().collect();
        let mut builder = self.select_builder(&view, query).columns(columns.as_slice());
        if let Some(limit) = query.limit {
            builder = builder.limit(limit);
        }
        if let Some(offset) = query.offset {
            builder = builder.offset(offset);
        }
        let stmt = builder.build(self.engine.dialect());

        let rows = self.engine.query(&stmt.sql, &stmt.params).await?;
        Ok(rows.into_iter().map(|row| Self::decode(&view, row)).collect())
    }

    /// First row matching `query`
    pub async fn find_one(&self, query: &Query) -> Result<Option<Record>> {
        let rows = self.find(&query.clone().limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    /// Every row of the table
    pub async fn all(&self) -> Result<Vec<Record>> {
        self.find(&Query::new()).await
    }

    /// Number of rows matching `query`'s filter
    pub async fn count(&self, query: &Query) -> Result<u64> {
        let view = self.resolve(query.fields()).await?;
        if !view.exists {
            return Ok(0);
        }

        let stmt = known_fields(&view, &query.filter)
            .into_iter()
            .fold(SelectBuilder::new(self.name()).count(), |b, (k, v)| {
                b.where_eq(k, v.clone())
            })
            .build(self.engine.dialect());

        let rows = self.engine.query(&stmt.sql, &stmt.params).await?;
        let count = rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_int)
            .unwrap_or(0);
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// De-duplicated values of `column` among rows matching `query`'s filter
    ///
    /// An unknown column yields no values.
    pub async fn distinct(&self, column: &str, query: &Query) -> Result<Vec<Value>> {
        let view = self
            .resolve(std::iter::once(column).chain(query.filter.keys().map(String::as_str)))
            .await?;
        let Some(info) = view.column(column) else {
            return Ok(Vec::new());
        };

        let stmt = known_fields(&view, &query.filter)
            .into_iter()
            .fold(SelectBuilder::new(self.name()).distinct(column), |b, (k, v)| {
                b.where_eq(k, v.clone())
            })
            .build(self.engine.dialect());

        let rows = self.engine.query(&stmt.sql, &stmt.params).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .map(|(_, value)| info.column_type.decode(value))
            .collect())
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name())
            .field("primary_key", &self.primary_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_builder() {
        let query = Query::new()
            .where_eq("status", "active")
            .filter(crate::record! { "age" => 3 })
            .order_by("-age")
            .limit(2)
            .offset(1);

        assert_eq!(query.filters().len(), 2);
        let fields: Vec<&str> = query.fields().collect();
        assert_eq!(fields, vec!["status", "age", "age"]);
        assert_eq!(query.limit, Some(2));
        assert_eq!(query.offset, Some(1));
    }

    #[test]
    fn test_query_from_record() {
        let query = Query::from(crate::record! { "name" => "a" });
        assert_eq!(query.filters()["name"], Value::from("a"));
        assert!(query.order_by.is_empty());
    }
}
