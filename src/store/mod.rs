//! Persistent link store backed by SQLite.
//!
//! # Module Structure
//!
//! ```text
//! store/
//! ├── schema     # Table and index creation
//! ├── kv         # `state` key/value table with compare-and-set
//! ├── links      # Link rows: upsert, sweep, ordered reads, custom listing
//! ├── sitemaps   # Generated sitemap records
//! └── jobs       # Persisted batch job, lease and per-record errors
//! ```
//!
//! The store owns link rows exclusively. Sitemap records are derived data and
//! can be dropped at any time.
//!
//! A single connection is shared behind a mutex; every public method holds the
//! lock only for the duration of its statement or transaction. Separate
//! processes coordinate through SQLite itself (WAL mode, busy timeout).

mod jobs;
mod kv;
mod links;
mod schema;
mod sitemaps;

pub use jobs::JobRow;
pub use links::{CustomPage, CustomSort, LinkFilter, OverrideChange, SortOrder};

use parking_lot::Mutex;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::{InfrastructureError, StoreResult};

pub struct Store {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Store {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(InfrastructureError::io(parent))?;
        }
        let conn = Connection::open(path).map_err(InfrastructureError::store("open database"))?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(InfrastructureError::store("open database"))?;
        Self::init(conn, None)
    }

    fn init(mut conn: Connection, path: Option<PathBuf>) -> StoreResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(InfrastructureError::store("set busy timeout"))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })
        .map_err(InfrastructureError::store("enable WAL"))?;
        schema::initialise(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run `f` inside an immediate transaction, committing on success.
    pub(crate) fn transaction<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&Transaction<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(InfrastructureError::store(operation))?;
        let value = f(&tx)?;
        tx.commit().map_err(InfrastructureError::store(operation))?;
        Ok(value)
    }

    // ------------------------------------------------------------------------
    // key/value state
    // ------------------------------------------------------------------------

    pub fn kv_get(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_conn(|conn| kv::get(conn, key))
    }

    pub fn kv_set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.with_conn(|conn| kv::set(conn, key, value))
    }

    pub fn kv_increment(&self, key: &str) -> StoreResult<i64> {
        self.transaction("increment counter", |tx| kv::increment(tx, key))
    }
}

pub(crate) use sitemaps::count_settled as count_settled_in;
pub(crate) use kv::{
    compare_and_set as kv_cas_in, get as kv_get_in, increment as kv_increment_in,
    set as kv_set_in,
};
