//! Connection options
//!
//! Pool and timeout settings applied when a connection handle is created.
//! Durations deserialize from (fractional) seconds so options can be loaded
//! straight from a JSON or TOML configuration file.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default timeout for database operations (30 seconds)
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default age after which idle connections are replaced (1 hour)
pub const DEFAULT_RECYCLE: Duration = Duration::from_secs(3600);

/// Pool configuration for a connection handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    /// Maximum number of connections in the pool
    pub max_size: usize,
    /// Timeout for acquiring a connection from the pool
    #[serde(with = "seconds")]
    pub timeout: Duration,
    /// Timeout for database operations (query, execute, etc.)
    #[serde(with = "seconds")]
    pub operation_timeout: Duration,
    /// Connections older than this are closed instead of reused
    #[serde(with = "seconds")]
    pub recycle: Duration,
    /// Verify a pooled connection is alive before handing it out
    pub pre_ping: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            max_size: 16,
            timeout: Duration::from_secs(30),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            recycle: DEFAULT_RECYCLE,
            pre_ping: true,
        }
    }
}

impl ConnectOptions {
    /// Create options with the defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum pool size
    #[must_use]
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size.max(1);
        self
    }

    /// Set connection acquisition timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set database operation timeout (for query, execute, etc.)
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set the connection recycle age
    #[must_use]
    pub fn with_recycle(mut self, recycle: Duration) -> Self {
        self.recycle = recycle;
        self
    }

    /// Enable or disable liveness checks on checkout
    #[must_use]
    pub fn with_pre_ping(mut self, pre_ping: bool) -> Self {
        self.pre_ping = pre_ping;
        self
    }
}

mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
