//! SQL dialect definitions
//!
//! This module describes the per-engine differences the mapper has to respect:
//! identifier quoting, parameter placeholders, transaction start and catalog queries.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported SQL dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Embedded file-based SQLite
    Sqlite,
    /// PostgreSQL server
    Postgres,
}

impl Dialect {
    /// Convert dialect to string representation
    pub fn to_str(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
        }
    }

    /// Quote an identifier so any record key can be used as a column name
    pub fn quote_ident(&self, ident: &str) -> String {
        // Both dialects use ANSI double quotes.
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Placeholder for the 1-based parameter `index`
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${}", index),
        }
    }

    /// Statement that opens a unit of work
    pub fn begin_sql(&self) -> &'static str {
        match self {
            // Take the write lock up front: select-then-write cannot deadlock on upgrade.
            Dialect::Sqlite => "BEGIN IMMEDIATE",
            Dialect::Postgres => "BEGIN",
        }
    }

    /// Whether autoincrement is only available on the engine's native integer type
    pub fn autoincrement_requires_native_integer(&self) -> bool {
        matches!(self, Dialect::Sqlite)
    }

    /// Query listing the user tables, one `name` column per row
    pub fn table_names_sql(&self) -> &'static str {
        match self {
            Dialect::Sqlite => {
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
            }
            Dialect::Postgres => {
                "SELECT table_name::text AS name FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_type = 'BASE TABLE' \
                 ORDER BY table_name"
            }
        }
    }

    /// Query describing the columns of the table bound as the only parameter.
    ///
    /// Rows carry `name`, `declared_type`, `primary_key`, `nullable` and
    /// `autoincrement`; an absent table yields no rows.
    pub fn columns_sql(&self) -> &'static str {
        match self {
            Dialect::Sqlite => {
                "SELECT name, type AS declared_type, pk > 0 AS primary_key, \
                 \"notnull\" = 0 AS nullable, \
                 (pk > 0 AND upper(type) = 'INTEGER') AS autoincrement \
                 FROM pragma_table_info(?) ORDER BY cid"
            }
            Dialect::Postgres => {
                "SELECT c.column_name::text AS name, \
                 (CASE \
                    WHEN c.character_maximum_length IS NOT NULL \
                      THEN c.data_type || '(' || c.character_maximum_length || ')' \
                    WHEN c.data_type = 'numeric' AND c.numeric_precision IS NOT NULL \
                      THEN 'numeric(' || c.numeric_precision || ', ' || c.numeric_scale || ')' \
                    ELSE c.data_type \
                  END)::text AS declared_type, \
                 EXISTS ( \
                    SELECT 1 FROM information_schema.table_constraints tc \
                    JOIN information_schema.key_column_usage kcu \
                      ON tc.constraint_name = kcu.constraint_name \
                     AND tc.table_schema = kcu.table_schema \
                     AND tc.table_name = kcu.table_name \
                    WHERE tc.constraint_type = 'PRIMARY KEY' \
                      AND tc.table_schema = c.table_schema \
                      AND tc.table_name = c.table_name \
                      AND kcu.column_name = c.column_name \
                 ) AS primary_key, \
                 (c.is_nullable::text = 'YES') AS nullable, \
                 (COALESCE(c.column_default::text LIKE 'nextval(%', false) \
                    OR c.is_identity::text = 'YES') AS autoincrement \
                 FROM information_schema.columns c \
                 WHERE c.table_schema = current_schema() AND c.table_name::text = $1 \
                 ORDER BY c.ordinal_position"
            }
        }
    }

    /// Statement taking a transaction-scoped lock keyed by the table name bound as
    /// the only parameter, if the dialect needs one to make upserts atomic.
    ///
    /// SQLite already serializes writers through `BEGIN IMMEDIATE`.
    pub fn upsert_lock_sql(&self) -> Option<&'static str> {
        match self {
            Dialect::Sqlite => None,
            Dialect::Postgres => Some("SELECT pg_advisory_xact_lock(hashtext($1))"),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for Dialect {
    type Err = String;

    /// Accepts URL schemes too, ignoring a `+driver` suffix (`postgresql+psycopg2`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.split('+').next().unwrap_or(s);
        match name.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            _ => Err(format!("Invalid dialect: '{}'", s)),
        }
    }
}
