//! Process-wide connection registry
//!
//! Handles are memoized by `(process id, url)`: every caller in a process
//! shares one [`Database`] (and so one pool) per URL, while a forked child
//! gets a different key and builds its own pool instead of reusing sockets
//! inherited from its parent.

use crate::core::{error::Result, ConnectOptions};
use crate::database::Database;
use crate::table::Table;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;

type HandleKey = (u32, String);

/// Memoized database handles
#[derive(Default)]
pub struct ConnectionRegistry {
    handles: RwLock<HashMap<HandleKey, Arc<Database>>>,
    construct: Mutex<()>,
}

impl ConnectionRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry backing [`connect`], [`connect_with`] and [`close`]
    pub fn global() -> &'static ConnectionRegistry {
        static GLOBAL: OnceLock<ConnectionRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ConnectionRegistry::new)
    }

    /// Handle for `url` in the current process, opened on first use
    ///
    /// `options` only apply when this call opens the handle.
    pub async fn get_connection(&self, url: &str, options: ConnectOptions) -> Result<Arc<Database>> {
        self.get_connection_for(std::process::id(), url, options)
            .await
    }

    pub(crate) async fn get_connection_for(
        &self,
        pid: u32,
        url: &str,
        options: ConnectOptions,
    ) -> Result<Arc<Database>> {
        let key = (pid, url.to_string());
        if let Some(db) = self.lookup(&key) {
            return Ok(db);
        }

        let _guard = self.construct.lock().await;
        if let Some(db) = self.lookup(&key) {
            return Ok(db);
        }

        let db = Arc::new(Database::open(url, options).await?);
        tracing::info!(url = %db.url(), pid, "registered database handle");
        self.handles.write().insert(key, Arc::clone(&db));
        Ok(db)
    }

    fn lookup(&self, key: &HandleKey) -> Option<Arc<Database>> {
        self.handles.read().get(key).cloned()
    }

    /// Close and forget the handle for `url` in the current process
    ///
    /// Returns whether a handle was registered.
    pub fn close(&self, url: &str) -> bool {
        let removed = self
            .handles
            .write()
            .remove(&(std::process::id(), url.to_string()));
        match removed {
            Some(db) => {
                db.close();
                true
            }
            None => false,
        }
    }

    /// Number of registered handles
    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    /// Whether no handle is registered
    pub fn is_empty(&self) -> bool {
        self.handles.read().is_empty()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("handles", &self.len())
            .finish()
    }
}

/// Shared handle for `url` with default options
///
/// # Example
///
/// ```no_run
/// #[tokio::main]
/// async fn main() -> schemaless_sql::Result<()> {
///     let db = schemaless_sql::connect("sqlite:///app.db").await?;
///     let again = schemaless_sql::connect("sqlite:///app.db").await?;
///     assert!(std::sync::Arc::ptr_eq(&db, &again));
///     Ok(())
/// }
/// ```
pub async fn connect(url: &str) -> Result<Arc<Database>> {
    connect_with(url, ConnectOptions::default()).await
}

/// Shared handle for `url`, opened with `options` if not registered yet
pub async fn connect_with(url: &str, options: ConnectOptions) -> Result<Arc<Database>> {
    ConnectionRegistry::global()
        .get_connection(url, options)
        .await
}

/// Handle on table `name` of the shared database for `url`
pub async fn get_table(url: &str, name: &str) -> Result<Arc<Table>> {
    connect(url).await?.table(name).await
}

/// Close the shared handle for `url`
pub fn close(url: &str) -> bool {
    ConnectionRegistry::global().close(url)
}
