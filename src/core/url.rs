//! Connection URL parsing
//!
//! URLs take the form `dialect[+driver]://rest`. The driver suffix is accepted
//! and ignored.
//!
//! | URL | Target |
//! |---|---|
//! | `sqlite://`, `sqlite:///:memory:` | in-memory SQLite |
//! | `sqlite:///data/app.db` | `data/app.db`, relative |
//! | `sqlite:////var/app.db` | `/var/app.db`, absolute |
//! | `postgresql+psycopg2://u:p@host/db` | `postgresql://u:p@host/db` |

use super::dialect::Dialect;
use super::error::{DatabaseError, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Where a parsed URL points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Private in-memory SQLite database
    SqliteMemory,
    /// SQLite database file
    SqliteFile(PathBuf),
    /// PostgreSQL connection string, driver suffix removed
    Postgres(String),
}

/// A parsed connection URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionUrl {
    raw: String,
    dialect: Dialect,
    target: Target,
}

impl ConnectionUrl {
    /// Parse a connection URL
    ///
    /// # Errors
    ///
    /// `InvalidConnectionString` for malformed URLs, `UnsupportedDialect` for
    /// schemes naming an engine this crate does not speak.
    pub fn parse(url: &str) -> Result<Self> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| DatabaseError::invalid_url(format!("missing scheme in '{}'", url)))?;
        if scheme.is_empty() {
            return Err(DatabaseError::invalid_url(format!("missing scheme in '{}'", url)));
        }

        let dialect: Dialect = scheme
            .parse()
            .map_err(|_| DatabaseError::unsupported_dialect(scheme))?;

        let target = match dialect {
            Dialect::Sqlite => {
                let path = rest.split('?').next().unwrap_or_default();
                match path {
                    "" | "/" | "/:memory:" | ":memory:" => Target::SqliteMemory,
                    p => match p.strip_prefix('/') {
                        Some(file) => Target::SqliteFile(PathBuf::from(file)),
                        None => {
                            return Err(DatabaseError::invalid_url(format!(
                                "'{}': sqlite URLs take the form sqlite:///path",
                                url
                            )))
                        }
                    },
                }
            }
            Dialect::Postgres => {
                if rest.is_empty() {
                    return Err(DatabaseError::invalid_url(format!(
                        "'{}': missing host",
                        url
                    )));
                }
                Target::Postgres(format!("postgresql://{}", rest))
            }
        };

        Ok(Self {
            raw: url.to_string(),
            dialect,
            target,
        })
    }

    /// Dialect named by the scheme
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Parsed target
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// The URL exactly as given
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// URL safe for logs, with any password replaced by `***`
    pub fn redacted(&self) -> String {
        let Some((scheme, rest)) = self.raw.split_once("://") else {
            return self.raw.clone();
        };
        // The last '@' ends the userinfo; a password may contain unescaped '@'.
        match rest.rsplit_once('@') {
            Some((userinfo, host)) => match userinfo.split_once(':') {
                Some((user, _)) => format!("{}://{}:***@{}", scheme, user, host),
                None => self.raw.clone(),
            },
            None => self.raw.clone(),
        }
    }
}

impl FromStr for ConnectionUrl {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ConnectionUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.redacted())
    }
}
