//! Parameterized SQL statement builders
//!
//! Provides a fluent API for the statements the mapper issues. Every value is
//! bound as a parameter and every identifier is quoted, so record keys and
//! values never end up spliced into SQL text.

use super::column_type::{ColumnType, PrimaryKey};
use super::dialect::Dialect;
use super::value::Value;

/// A rendered statement with its parameters in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text
    pub sql: String,
    /// Bound parameters
    pub params: Vec<Value>,
}

impl Statement {
    fn new(dialect: Dialect) -> Binder {
        Binder {
            dialect,
            params: Vec::new(),
        }
    }
}

/// Collects parameters while handing out dialect placeholders
struct Binder {
    dialect: Dialect,
    params: Vec<Value>,
}

impl Binder {
    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        self.dialect.placeholder(self.params.len())
    }

    fn quote(&self, ident: &str) -> String {
        self.dialect.quote_ident(ident)
    }

    fn where_clause(&mut self, conditions: &[Condition]) -> String {
        if conditions.is_empty() {
            return String::new();
        }
        let rendered: Vec<String> = conditions
            .iter()
            .map(|cond| {
                let column = self.quote(&cond.column);
                match &cond.value {
                    Value::Null => format!("{} {}", column, Operator::IsNull.as_sql()),
                    value => {
                        let placeholder = self.bind(value.clone());
                        format!("{} {} {}", column, Operator::Eq.as_sql(), placeholder)
                    }
                }
            })
            .collect();
        format!(" WHERE {}", rendered.join(" AND "))
    }

    fn finish(self, sql: String) -> Statement {
        Statement {
            sql,
            params: self.params,
        }
    }
}

/// SQL comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    /// Equal to (=)
    Eq,
    /// IS NULL
    IsNull,
}

impl Operator {
    fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::IsNull => "IS NULL",
        }
    }
}

/// Equality condition; a `Null` value renders as `IS NULL`
#[derive(Debug, Clone)]
struct Condition {
    column: String,
    value: Value,
}

/// ORDER BY direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    /// Ascending order
    Asc,
    /// Descending order
    Desc,
}

impl OrderDirection {
    fn as_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }

    /// Split an order spec such as `"-age"` into column and direction
    pub fn parse(spec: &str) -> (&str, OrderDirection) {
        match spec.strip_prefix('-') {
            Some(column) => (column, OrderDirection::Desc),
            None => (spec, OrderDirection::Asc),
        }
    }
}

#[derive(Debug, Clone)]
enum Projection {
    Columns(Vec<String>),
    Count,
    Distinct(String),
}

/// SELECT query builder
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    table: String,
    projection: Projection,
    where_conditions: Vec<Condition>,
    order_by: Vec<(String, OrderDirection)>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl SelectBuilder {
    /// Create a new SELECT query builder
    ///
    /// # Example
    ///
    /// ```
    /// use schemaless_sql::core::{Dialect, SelectBuilder};
    ///
    /// let stmt = SelectBuilder::new("users")
    ///     .columns(&["id", "name"])
    ///     .where_eq("name", "Alice")
    ///     .build(Dialect::Postgres);
    /// assert_eq!(stmt.sql, "SELECT \"id\", \"name\" FROM \"users\" WHERE \"name\" = $1");
    /// ```
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            projection: Projection::Columns(Vec::new()),
            where_conditions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Select specific columns (all columns when left empty)
    #[must_use]
    pub fn columns<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.projection =
            Projection::Columns(columns.iter().map(|s| s.as_ref().to_string()).collect());
        self
    }

    /// Select `COUNT(*) AS "count"`
    #[must_use]
    pub fn count(mut self) -> Self {
        self.projection = Projection::Count;
        self
    }

    /// Select the distinct values of one column
    #[must_use]
    pub fn distinct(mut self, column: &str) -> Self {
        self.projection = Projection::Distinct(column.to_string());
        self
    }

    /// Add a WHERE column = value condition
    #[must_use]
    pub fn where_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.where_conditions.push(Condition {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    /// Add ORDER BY clause
    #[must_use]
    pub fn order_by(mut self, column: &str, direction: OrderDirection) -> Self {
        self.order_by.push((column.to_string(), direction));
        self
    }

    /// Add LIMIT clause
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Add OFFSET clause
    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Render the statement for `dialect`
    pub fn build(&self, dialect: Dialect) -> Statement {
        let mut binder = Statement::new(dialect);

        let projection = match &self.projection {
            Projection::Columns(columns) if columns.is_empty() => "*".to_string(),
            Projection::Columns(columns) => columns
                .iter()
                .map(|c| binder.quote(c))
                .collect::<Vec<_>>()
                .join(", "),
            Projection::Count => format!("COUNT(*) AS {}", binder.quote("count")),
            Projection::Distinct(column) => format!("DISTINCT {}", binder.quote(column)),
        };

        let mut sql = format!("SELECT {} FROM {}", projection, binder.quote(&self.table));
        sql.push_str(&binder.where_clause(&self.where_conditions));

        if !self.order_by.is_empty() {
            let order_clauses: Vec<String> = self
                .order_by
                .iter()
                .map(|(col, dir)| format!("{} {}", binder.quote(col), dir.as_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_clauses.join(", "));
        }

        match (self.limit, self.offset, dialect) {
            (Some(limit), _, _) => sql.push_str(&format!(" LIMIT {}", limit)),
            // SQLite only accepts OFFSET after a LIMIT.
            (None, Some(_), Dialect::Sqlite) => sql.push_str(" LIMIT -1"),
            _ => {}
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        binder.finish(sql)
    }
}

/// INSERT query builder
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    table: String,
    columns: Vec<String>,
    values: Vec<Value>,
    returning: Option<String>,
}

impl InsertBuilder {
    /// Create a new INSERT query builder
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            values: Vec::new(),
            returning: None,
        }
    }

    /// Add a column-value pair
    #[must_use]
    pub fn value(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.columns.push(column.to_string());
        self.values.push(value.into());
        self
    }

    /// Return the given column of the inserted row
    #[must_use]
    pub fn returning(mut self, column: &str) -> Self {
        self.returning = Some(column.to_string());
        self
    }

    /// Render the statement for `dialect`
    pub fn build(&self, dialect: Dialect) -> Statement {
        let mut binder = Statement::new(dialect);
        let table = binder.quote(&self.table);

        let mut sql = if self.columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", table)
        } else {
            let columns: Vec<String> = self.columns.iter().map(|c| binder.quote(c)).collect();
            let placeholders: Vec<String> =
                self.values.iter().map(|v| binder.bind(v.clone())).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        if let Some(column) = &self.returning {
            sql.push_str(&format!(" RETURNING {}", binder.quote(column)));
        }

        binder.finish(sql)
    }
}

/// UPDATE query builder
#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    table: String,
    set_columns: Vec<String>,
    set_values: Vec<Value>,
    where_conditions: Vec<Condition>,
}

impl UpdateBuilder {
    /// Create a new UPDATE query builder
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            set_columns: Vec::new(),
            set_values: Vec::new(),
            where_conditions: Vec::new(),
        }
    }

    /// Set a column value
    #[must_use]
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.set_columns.push(column.to_string());
        self.set_values.push(value.into());
        self
    }

    /// Add a WHERE condition
    #[must_use]
    pub fn where_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.where_conditions.push(Condition {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    /// Render the statement for `dialect`; SET values bind before WHERE values
    pub fn build(&self, dialect: Dialect) -> Statement {
        let mut binder = Statement::new(dialect);

        let set_clauses: Vec<String> = self
            .set_columns
            .iter()
            .zip(&self.set_values)
            .map(|(col, value)| {
                let column = binder.quote(col);
                format!("{} = {}", column, binder.bind(value.clone()))
            })
            .collect();

        let mut sql = format!(
            "UPDATE {} SET {}",
            binder.quote(&self.table),
            set_clauses.join(", ")
        );
        sql.push_str(&binder.where_clause(&self.where_conditions));

        binder.finish(sql)
    }
}

/// DELETE query builder
#[derive(Debug, Clone)]
pub struct DeleteBuilder {
    table: String,
    where_conditions: Vec<Condition>,
}

impl DeleteBuilder {
    /// Create a new DELETE query builder
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            where_conditions: Vec::new(),
        }
    }

    /// Add a WHERE condition
    #[must_use]
    pub fn where_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.where_conditions.push(Condition {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    /// Render the statement for `dialect`
    pub fn build(&self, dialect: Dialect) -> Statement {
        let mut binder = Statement::new(dialect);
        let mut sql = format!("DELETE FROM {}", binder.quote(&self.table));
        sql.push_str(&binder.where_clause(&self.where_conditions));
        binder.finish(sql)
    }
}

/// CREATE TABLE builder
#[derive(Debug, Clone)]
pub struct CreateTableBuilder {
    table: String,
    primary_key: Option<PrimaryKey>,
    columns: Vec<(String, String)>,
}

impl CreateTableBuilder {
    /// Create a new CREATE TABLE builder
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: None,
            columns: Vec::new(),
        }
    }

    /// Lead with a primary-key column
    #[must_use]
    pub fn primary_key(mut self, primary_key: PrimaryKey) -> Self {
        self.primary_key = Some(primary_key);
        self
    }

    /// Add a column with an inferred type
    #[must_use]
    pub fn column(self, name: &str, column_type: ColumnType, dialect: Dialect) -> Self {
        self.declared_column(name, column_type.sql_type(dialect))
    }

    /// Add a column with a declared type taken verbatim from the catalog
    #[must_use]
    pub fn declared_column(mut self, name: &str, declared: impl Into<String>) -> Self {
        self.columns.push((name.to_string(), declared.into()));
        self
    }

    /// Render the statement for `dialect`
    pub fn build(&self, dialect: Dialect) -> String {
        let mut definitions = Vec::with_capacity(self.columns.len() + 1);
        if let Some(pk) = &self.primary_key {
            definitions.push(pk.column_sql(dialect));
        }
        for (name, declared) in &self.columns {
            definitions.push(format!("{} {}", dialect.quote_ident(name), declared));
        }
        format!(
            "CREATE TABLE {} ({})",
            dialect.quote_ident(&self.table),
            definitions.join(", ")
        )
    }
}

/// `ALTER TABLE ... ADD COLUMN` for one nullable column
pub fn add_column_sql(dialect: Dialect, table: &str, column: &str, column_type: ColumnType) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        dialect.quote_ident(table),
        dialect.quote_ident(column),
        column_type.sql_type(dialect)
    )
}

/// `DROP TABLE IF EXISTS`
pub fn drop_table_sql(dialect: Dialect, table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", dialect.quote_ident(table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::column_type::PrimaryKeyType;

    #[test]
    fn test_select_basic() {
        let stmt = SelectBuilder::new("users").build(Dialect::Sqlite);
        assert_eq!(stmt.sql, "SELECT * FROM \"users\"");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_select_where() {
        let builder = SelectBuilder::new("users")
            .where_eq("id", 42)
            .where_eq("status", "active");

        let stmt = builder.build(Dialect::Sqlite);
        assert_eq!(
            stmt.sql,
            "SELECT * FROM \"users\" WHERE \"id\" = ? AND \"status\" = ?"
        );
        assert_eq!(stmt.params, vec![Value::Int(42), Value::from("active")]);

        let stmt = builder.build(Dialect::Postgres);
        assert_eq!(
            stmt.sql,
            "SELECT * FROM \"users\" WHERE \"id\" = $1 AND \"status\" = $2"
        );
    }

    #[test]
    fn test_select_null_filter_is_not_bound() {
        let stmt = SelectBuilder::new("users")
            .where_eq("deleted_at", Value::Null)
            .where_eq("name", "a")
            .build(Dialect::Postgres);
        assert_eq!(
            stmt.sql,
            "SELECT * FROM \"users\" WHERE \"deleted_at\" IS NULL AND \"name\" = $1"
        );
        assert_eq!(stmt.params.len(), 1);
    }

    #[test]
    fn test_select_order_limit() {
        let stmt = SelectBuilder::new("users")
            .order_by("age", OrderDirection::Desc)
            .order_by("name", OrderDirection::Asc)
            .limit(10)
            .offset(20)
            .build(Dialect::Sqlite);

        assert_eq!(
            stmt.sql,
            "SELECT * FROM \"users\" ORDER BY \"age\" DESC, \"name\" ASC LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn test_select_offset_without_limit() {
        let builder = SelectBuilder::new("users").offset(5);
        assert_eq!(
            builder.build(Dialect::Sqlite).sql,
            "SELECT * FROM \"users\" LIMIT -1 OFFSET 5"
        );
        assert_eq!(
            builder.build(Dialect::Postgres).sql,
            "SELECT * FROM \"users\" OFFSET 5"
        );
    }

    #[test]
    fn test_select_count_and_distinct() {
        let stmt = SelectBuilder::new("users")
            .count()
            .where_eq("age", 3)
            .build(Dialect::Sqlite);
        assert_eq!(
            stmt.sql,
            "SELECT COUNT(*) AS \"count\" FROM \"users\" WHERE \"age\" = ?"
        );

        let stmt = SelectBuilder::new("users").distinct("age").build(Dialect::Sqlite);
        assert_eq!(stmt.sql, "SELECT DISTINCT \"age\" FROM \"users\"");
    }

    #[test]
    fn test_order_direction_parse() {
        assert_eq!(OrderDirection::parse("-age"), ("age", OrderDirection::Desc));
        assert_eq!(OrderDirection::parse("age"), ("age", OrderDirection::Asc));
    }

    #[test]
    fn test_insert() {
        let stmt = InsertBuilder::new("users")
            .value("name", "Alice")
            .value("age", 30)
            .returning("id")
            .build(Dialect::Postgres);

        assert_eq!(
            stmt.sql,
            "INSERT INTO \"users\" (\"name\", \"age\") VALUES ($1, $2) RETURNING \"id\""
        );
        assert_eq!(stmt.params.len(), 2);
    }

    #[test]
    fn test_insert_default_values() {
        let stmt = InsertBuilder::new("users").build(Dialect::Sqlite);
        assert_eq!(stmt.sql, "INSERT INTO \"users\" DEFAULT VALUES");
    }

    #[test]
    fn test_update_binds_set_before_where() {
        let stmt = UpdateBuilder::new("users")
            .set("name", "Bob")
            .set("age", 31)
            .where_eq("id", 1)
            .build(Dialect::Postgres);

        assert_eq!(
            stmt.sql,
            "UPDATE \"users\" SET \"name\" = $1, \"age\" = $2 WHERE \"id\" = $3"
        );
        assert_eq!(
            stmt.params,
            vec![Value::from("Bob"), Value::Int(31), Value::Int(1)]
        );
    }

    #[test]
    fn test_delete() {
        let stmt = DeleteBuilder::new("users").where_eq("id", 42).build(Dialect::Sqlite);
        assert_eq!(stmt.sql, "DELETE FROM \"users\" WHERE \"id\" = ?");

        let stmt = DeleteBuilder::new("users").build(Dialect::Sqlite);
        assert_eq!(stmt.sql, "DELETE FROM \"users\"");
    }

    #[test]
    fn test_injection_stays_in_params() {
        let hostile = "x'; DROP TABLE users; --";
        let stmt = SelectBuilder::new("users")
            .where_eq("name", hostile)
            .build(Dialect::Sqlite);
        assert!(!stmt.sql.contains("DROP"));
        assert_eq!(stmt.params, vec![Value::from(hostile)]);
    }

    #[test]
    fn test_create_table() {
        let sql = CreateTableBuilder::new("users")
            .primary_key(PrimaryKey::default())
            .column("name", ColumnType::String { length: 255 }, Dialect::Sqlite)
            .build(Dialect::Sqlite);
        assert_eq!(
            sql,
            "CREATE TABLE \"users\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \"name\" VARCHAR(255))"
        );

        let sql = CreateTableBuilder::new("jobs")
            .primary_key(PrimaryKey::new("key", PrimaryKeyType::String, false))
            .build(Dialect::Postgres);
        assert_eq!(
            sql,
            "CREATE TABLE \"jobs\" (\"key\" VARCHAR(255) NOT NULL PRIMARY KEY)"
        );
    }

    #[test]
    fn test_add_and_drop() {
        assert_eq!(
            add_column_sql(Dialect::Postgres, "users", "payload", ColumnType::Json),
            "ALTER TABLE \"users\" ADD COLUMN \"payload\" JSON"
        );
        assert_eq!(
            drop_table_sql(Dialect::Sqlite, "users"),
            "DROP TABLE IF EXISTS \"users\""
        );
    }
}
