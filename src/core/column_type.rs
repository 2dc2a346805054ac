//! Column type descriptors
//!
//! Maps runtime [`Value`]s onto column types, renders those types for a dialect,
//! reads declared types back from the catalog, and decodes stored values.

use super::dialect::Dialect;
use super::value::{Value, DATETIME_FORMAT, DATE_FORMAT};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Longest string that still gets a bounded `VARCHAR` column
pub const SHORT_STRING_MAX: u32 = 255;

/// Precision used for inferred decimal columns
pub const DECIMAL_PRECISION: u8 = 20;

/// Scale used for inferred decimal columns
pub const DECIMAL_SCALE: u8 = 6;

/// Column type descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// Native integer (32-bit range)
    Integer,
    /// 64-bit integer
    BigInteger,
    /// Floating point
    Float,
    /// Boolean
    Boolean,
    /// Bounded string
    String { length: u32 },
    /// Unbounded text
    Text,
    /// Structured JSON text
    Json,
    /// Byte blob
    Blob,
    /// Calendar date
    Date,
    /// Date and time
    DateTime,
    /// Fixed-precision decimal
    Decimal { precision: u8, scale: u8 },
    /// A declared type the mapper does not model; values pass through untouched
    Other,
}

impl ColumnType {
    /// Pick the column type for a value seen in a record.
    ///
    /// The order matters: booleans are checked before integers and strings are
    /// split on their character length.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Null => ColumnType::Text,
            Value::Bool(_) => ColumnType::Boolean,
            Value::String(s) => {
                if s.chars().count() <= SHORT_STRING_MAX as usize {
                    ColumnType::String {
                        length: SHORT_STRING_MAX,
                    }
                } else {
                    ColumnType::Text
                }
            }
            Value::Int(v) => {
                if i32::try_from(*v).is_ok() {
                    ColumnType::Integer
                } else {
                    ColumnType::BigInteger
                }
            }
            Value::Float(_) => ColumnType::Float,
            Value::Bytes(_) => ColumnType::Blob,
            Value::Date(_) => ColumnType::Date,
            Value::DateTime(_) => ColumnType::DateTime,
            Value::Decimal(_) => ColumnType::Decimal {
                precision: DECIMAL_PRECISION,
                scale: DECIMAL_SCALE,
            },
            Value::Json(_) => ColumnType::Json,
        }
    }

    /// Render the type for `CREATE TABLE` / `ALTER TABLE ... ADD COLUMN`
    pub fn sql_type(&self, dialect: Dialect) -> String {
        match (self, dialect) {
            (ColumnType::Integer, _) => "INTEGER".to_string(),
            (ColumnType::BigInteger, _) => "BIGINT".to_string(),
            (ColumnType::Float, _) => "FLOAT".to_string(),
            (ColumnType::Boolean, _) => "BOOLEAN".to_string(),
            (ColumnType::String { length }, _) => format!("VARCHAR({})", length),
            (ColumnType::Text, _) | (ColumnType::Other, _) => "TEXT".to_string(),
            (ColumnType::Json, _) => "JSON".to_string(),
            (ColumnType::Blob, Dialect::Sqlite) => "BLOB".to_string(),
            (ColumnType::Blob, Dialect::Postgres) => "BYTEA".to_string(),
            (ColumnType::Date, _) => "DATE".to_string(),
            (ColumnType::DateTime, Dialect::Sqlite) => "DATETIME".to_string(),
            (ColumnType::DateTime, Dialect::Postgres) => "TIMESTAMP WITHOUT TIME ZONE".to_string(),
            // NUMERIC affinity would coerce the text to REAL and drop digits.
            (ColumnType::Decimal { precision, scale }, Dialect::Sqlite) => {
                format!("DECIMAL TEXT({}, {})", precision, scale)
            }
            (ColumnType::Decimal { precision, scale }, Dialect::Postgres) => {
                format!("NUMERIC({}, {})", precision, scale)
            }
        }
    }

    /// Read a declared type as reported by the catalog
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.trim().to_uppercase();
        let (base, args) = match upper.find('(') {
            Some(pos) => (
                upper[..pos].trim(),
                upper[pos + 1..].trim_end_matches(')').trim(),
            ),
            None => (upper.as_str(), ""),
        };
        let mut numbers = args.split(',').filter_map(|a| a.trim().parse::<u32>().ok());

        match base {
            "BIGINT" | "INT8" | "BIGSERIAL" => ColumnType::BigInteger,
            "INTEGER" | "INT" | "INT4" | "SMALLINT" | "INT2" | "SERIAL" | "TINYINT"
            | "MEDIUMINT" => ColumnType::Integer,
            "BOOLEAN" | "BOOL" => ColumnType::Boolean,
            "VARCHAR" | "CHARACTER VARYING" | "CHAR" | "CHARACTER" | "NVARCHAR" => {
                ColumnType::String {
                    length: numbers.next().unwrap_or(SHORT_STRING_MAX),
                }
            }
            "TEXT" | "CLOB" => ColumnType::Text,
            "JSON" | "JSONB" => ColumnType::Json,
            "BLOB" | "BYTEA" => ColumnType::Blob,
            "DATE" => ColumnType::Date,
            "DATETIME" | "TIMESTAMP" | "TIMESTAMP WITHOUT TIME ZONE"
            | "TIMESTAMP WITH TIME ZONE" | "TIMESTAMPTZ" => ColumnType::DateTime,
            "NUMERIC" | "DECIMAL" | "DECIMAL TEXT" => {
                let precision = numbers.next().unwrap_or(u32::from(DECIMAL_PRECISION));
                let scale = numbers.next().unwrap_or(u32::from(DECIMAL_SCALE));
                ColumnType::Decimal {
                    precision: u8::try_from(precision).unwrap_or(u8::MAX),
                    scale: u8::try_from(scale).unwrap_or(u8::MAX),
                }
            }
            "FLOAT" | "REAL" | "DOUBLE" | "DOUBLE PRECISION" | "FLOAT4" | "FLOAT8" => {
                ColumnType::Float
            }
            _ => ColumnType::Other,
        }
    }

    /// Turn a value as returned by the engine back into the variant it was written as.
    ///
    /// SQLite keeps booleans as integers and dates, JSON and decimals as text
    /// (decimal columns are declared with TEXT affinity so no digit is lost);
    /// values that do not parse are returned unchanged.
    pub fn decode(&self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (ColumnType::Boolean, Value::Int(v)) => Value::Bool(v != 0),
            (ColumnType::Float, Value::Int(v)) => Value::Float(v as f64),
            (ColumnType::Date, Value::String(s)) => match NaiveDate::parse_from_str(&s, DATE_FORMAT) {
                Ok(d) => Value::Date(d),
                Err(_) => Value::String(s),
            },
            (ColumnType::DateTime, Value::String(s)) => match parse_datetime(&s) {
                Some(dt) => Value::DateTime(dt),
                None => Value::String(s),
            },
            (ColumnType::Json, Value::String(s)) => match serde_json::from_str(&s) {
                Ok(json) => Value::Json(json),
                Err(_) => Value::String(s),
            },
            (ColumnType::Decimal { .. }, Value::String(s)) => Value::Decimal(s),
            // Numeric-affinity columns from other writers; exact only within f64 precision.
            (ColumnType::Decimal { scale, .. }, Value::Int(v)) => {
                Value::Decimal(format!("{:.*}", usize::from(*scale), v as f64))
            }
            (ColumnType::Decimal { scale, .. }, Value::Float(v)) => {
                Value::Decimal(format!("{:.*}", usize::from(*scale), v))
            }
            (_, other) => other,
        }
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

/// Type of the primary-key column a new table is created with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PrimaryKeyType {
    /// 32-bit integer
    #[default]
    Integer,
    /// 64-bit integer
    BigInteger,
    /// Bounded string; never autoincrements
    String,
}

/// Primary-key column requested when a table is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKey {
    name: String,
    key_type: PrimaryKeyType,
    autoincrement: bool,
}

impl Default for PrimaryKey {
    fn default() -> Self {
        Self {
            name: "id".to_string(),
            key_type: PrimaryKeyType::Integer,
            autoincrement: true,
        }
    }
}

impl PrimaryKey {
    /// Create a key spec; a string key forces autoincrement off
    pub fn new(name: impl Into<String>, key_type: PrimaryKeyType, autoincrement: bool) -> Self {
        Self {
            name: name.into(),
            key_type,
            autoincrement: autoincrement && key_type != PrimaryKeyType::String,
        }
    }

    /// Column name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column type
    pub fn key_type(&self) -> PrimaryKeyType {
        self.key_type
    }

    /// Whether the engine generates values; never true for a string key
    pub fn autoincrement(&self) -> bool {
        self.autoincrement && self.key_type != PrimaryKeyType::String
    }

    /// Column definition for `CREATE TABLE`, after applying dialect restrictions
    pub fn column_sql(&self, dialect: Dialect) -> String {
        let name = dialect.quote_ident(&self.name);
        let autoincrement = self.autoincrement();
        let key_type = match self.key_type {
            // SQLite can only autoincrement its native INTEGER rowid alias.
            PrimaryKeyType::BigInteger
                if autoincrement && dialect.autoincrement_requires_native_integer() =>
            {
                PrimaryKeyType::Integer
            }
            other => other,
        };

        match (dialect, key_type, autoincrement) {
            (Dialect::Sqlite, PrimaryKeyType::Integer, true) => {
                format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", name)
            }
            (Dialect::Postgres, PrimaryKeyType::Integer, true) => {
                format!("{} SERIAL PRIMARY KEY", name)
            }
            (Dialect::Postgres, PrimaryKeyType::BigInteger, true) => {
                format!("{} BIGSERIAL PRIMARY KEY", name)
            }
            // Exactly `INTEGER PRIMARY KEY` is a rowid alias and would generate values.
            (Dialect::Sqlite, PrimaryKeyType::Integer, false) => {
                format!("{} INT NOT NULL PRIMARY KEY", name)
            }
            (_, PrimaryKeyType::Integer, _) => format!("{} INTEGER NOT NULL PRIMARY KEY", name),
            (_, PrimaryKeyType::BigInteger, _) => format!("{} BIGINT NOT NULL PRIMARY KEY", name),
            (_, PrimaryKeyType::String, _) => format!(
                "{} VARCHAR({}) NOT NULL PRIMARY KEY",
                name, SHORT_STRING_MAX
            ),
        }
    }
}

/// One column as reported by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Declared type exactly as the engine reports it
    pub declared_type: String,
    /// Type the mapper reads the declaration as
    pub column_type: ColumnType,
    /// Part of the primary key
    pub primary_key: bool,
    /// Accepts NULL
    pub nullable: bool,
    /// Values generated by the engine
    pub autoincrement: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_scalars() {
        assert_eq!(ColumnType::infer(&Value::Null), ColumnType::Text);
        assert_eq!(ColumnType::infer(&Value::Bool(true)), ColumnType::Boolean);
        assert_eq!(ColumnType::infer(&Value::Float(0.5)), ColumnType::Float);
        assert_eq!(ColumnType::infer(&Value::Bytes(vec![1])), ColumnType::Blob);
        assert_eq!(
            ColumnType::infer(&Value::Json(serde_json::json!({"a": 1}))),
            ColumnType::Json
        );
        assert_eq!(
            ColumnType::infer(&Value::decimal("1.25")),
            ColumnType::Decimal {
                precision: 20,
                scale: 6
            }
        );
    }

    #[test]
    fn test_infer_integer_width() {
        assert_eq!(ColumnType::infer(&Value::Int(2_147_483_647)), ColumnType::Integer);
        assert_eq!(ColumnType::infer(&Value::Int(-2_147_483_648)), ColumnType::Integer);
        assert_eq!(
            ColumnType::infer(&Value::Int(2_147_483_648)),
            ColumnType::BigInteger
        );
    }

    #[test]
    fn test_infer_string_length_counts_chars() {
        let short = "é".repeat(255);
        assert_eq!(
            ColumnType::infer(&Value::String(short)),
            ColumnType::String { length: 255 }
        );
        assert_eq!(
            ColumnType::infer(&Value::String("x".repeat(256))),
            ColumnType::Text
        );
    }

    #[test]
    fn test_sql_type_per_dialect() {
        assert_eq!(ColumnType::Blob.sql_type(Dialect::Sqlite), "BLOB");
        assert_eq!(ColumnType::Blob.sql_type(Dialect::Postgres), "BYTEA");
        assert_eq!(
            ColumnType::String { length: 255 }.sql_type(Dialect::Sqlite),
            "VARCHAR(255)"
        );
        assert_eq!(
            ColumnType::infer(&Value::decimal("1")).sql_type(Dialect::Postgres),
            "NUMERIC(20, 6)"
        );
    }

    #[test]
    fn test_from_declared_round_trips_rendered_types() {
        for ty in [
            ColumnType::Integer,
            ColumnType::BigInteger,
            ColumnType::Float,
            ColumnType::Boolean,
            ColumnType::String { length: 255 },
            ColumnType::Text,
            ColumnType::Json,
            ColumnType::Blob,
            ColumnType::Date,
            ColumnType::DateTime,
            ColumnType::Decimal {
                precision: 20,
                scale: 6,
            },
        ] {
            for dialect in [Dialect::Sqlite, Dialect::Postgres] {
                assert_eq!(ColumnType::from_declared(&ty.sql_type(dialect)), ty);
            }
        }
    }

    #[test]
    fn test_sqlite_decimal_has_text_affinity() {
        let decimal = ColumnType::Decimal {
            precision: 20,
            scale: 6,
        };
        let declared = decimal.sql_type(Dialect::Sqlite);
        assert_eq!(declared, "DECIMAL TEXT(20, 6)");
        // SQLite picks TEXT affinity for a declared type containing "TEXT" and no "INT".
        assert!(declared.contains("TEXT") && !declared.contains("INT"));
        assert_eq!(ColumnType::from_declared("decimal text(20, 6)"), decimal);
    }

    #[test]
    fn test_decode_decimal_keeps_scale() {
        let decimal = ColumnType::Decimal {
            precision: 20,
            scale: 6,
        };
        assert_eq!(
            decimal.decode(Value::String("12345678901234.123456".into())),
            Value::decimal("12345678901234.123456")
        );
        assert_eq!(decimal.decode(Value::Float(12.5)), Value::decimal("12.500000"));
        assert_eq!(decimal.decode(Value::Int(100)), Value::decimal("100.000000"));
    }

    #[test]
    fn test_from_declared_catalog_spellings() {
        assert_eq!(
            ColumnType::from_declared("character varying(64)"),
            ColumnType::String { length: 64 }
        );
        assert_eq!(ColumnType::from_declared("double precision"), ColumnType::Float);
        assert_eq!(ColumnType::from_declared("jsonb"), ColumnType::Json);
        assert_eq!(ColumnType::from_declared("geometry"), ColumnType::Other);
    }

    #[test]
    fn test_decode_sqlite_storage() {
        assert_eq!(ColumnType::Boolean.decode(Value::Int(1)), Value::Bool(true));
        assert_eq!(
            ColumnType::Date.decode(Value::String("2024-02-18".into())),
            Value::Date(NaiveDate::from_ymd_opt(2024, 2, 18).unwrap())
        );
        assert_eq!(
            ColumnType::Json.decode(Value::String("{\"x\":29}".into())),
            Value::Json(serde_json::json!({"x": 29}))
        );
        assert_eq!(
            ColumnType::Json.decode(Value::String("not json".into())),
            Value::String("not json".into())
        );
        assert_eq!(ColumnType::Integer.decode(Value::Null), Value::Null);

        let dt = ColumnType::DateTime.decode(Value::String("2024-02-18 16:32:20".into()));
        assert!(matches!(dt, Value::DateTime(_)));
    }

    #[test]
    fn test_primary_key_sqlite_downgrade() {
        let pk = PrimaryKey::new("id", PrimaryKeyType::BigInteger, true);
        assert_eq!(
            pk.column_sql(Dialect::Sqlite),
            "\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"
        );
        assert_eq!(pk.column_sql(Dialect::Postgres), "\"id\" BIGSERIAL PRIMARY KEY");

        let pk = PrimaryKey::new("id", PrimaryKeyType::BigInteger, false);
        assert_eq!(
            pk.column_sql(Dialect::Sqlite),
            "\"id\" BIGINT NOT NULL PRIMARY KEY"
        );
    }

    #[test]
    fn test_string_primary_key_never_autoincrements() {
        let pk = PrimaryKey::new("task_id", PrimaryKeyType::String, true);
        assert!(!pk.autoincrement());
        assert_eq!(
            pk.column_sql(Dialect::Sqlite),
            "\"task_id\" VARCHAR(255) NOT NULL PRIMARY KEY"
        );

        // Deserialized keys go through the same rule.
        let pk: PrimaryKey = serde_json::from_str(
            r#"{"name": "task_id", "key_type": "String", "autoincrement": true}"#,
        )
        .unwrap();
        assert!(!pk.autoincrement());
        assert_eq!(pk.column_sql(Dialect::Postgres), "\"task_id\" VARCHAR(255) NOT NULL PRIMARY KEY");
    }

    #[test]
    fn test_integer_primary_key_without_autoincrement() {
        let pk = PrimaryKey::new("id", PrimaryKeyType::Integer, false);
        assert_eq!(pk.name(), "id");
        assert_eq!(pk.key_type(), PrimaryKeyType::Integer);
        assert!(!pk.autoincrement());
        // Not the rowid alias spelling, so SQLite does not generate values.
        assert_eq!(pk.column_sql(Dialect::Sqlite), "\"id\" INT NOT NULL PRIMARY KEY");
        assert_eq!(
            pk.column_sql(Dialect::Postgres),
            "\"id\" INTEGER NOT NULL PRIMARY KEY"
        );
        assert_eq!(ColumnType::from_declared("INT"), ColumnType::Integer);
    }
}
