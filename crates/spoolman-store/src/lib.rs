#![forbid(unsafe_code)]
//! SQLite persistence for the filament inventory.
//!
//! A single connection behind a mutex, driven from async handlers via
//! `spawn_blocking`. All timestamps are stored as unix seconds; foreign
//! keys are enforced so deleting a referenced record surfaces as a
//! conflict instead of leaving orphans.

mod coil;
mod filament;
mod schema;
mod setting;
mod spool;
mod sql;
mod vendor;

pub use coil::NewCoil;
pub use filament::NewFilament;
pub use spool::NewSpool;
pub use vendor::NewVendor;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub enum StoreError {
    NotFound { kind: &'static str, ident: String },
    Conflict(String),
    InvalidSort(String),
    Invalid(String),
    Sqlite(String),
    Internal(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { kind, ident } => write!(f, "{kind} {ident} not found"),
            Self::Conflict(msg) => write!(f, "conflict: {msg}"),
            Self::InvalidSort(msg) => write!(f, "invalid sort: {msg}"),
            Self::Invalid(msg) => write!(f, "invalid request: {msg}"),
            Self::Sqlite(msg) => write!(f, "sqlite error: {msg}"),
            Self::Internal(msg) => write!(f, "internal store error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Conflict(err.to_string())
            }
            _ => Self::Sqlite(err.to_string()),
        }
    }
}

/// Handle to the inventory database. Cheap to clone; all clones share one
/// connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Sqlite(format!("open {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "opened inventory database");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
            PRAGMA busy_timeout=5000;
            ",
        )?;
        schema::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs a closure against the connection on the blocking pool. rusqlite
    /// is synchronous; this keeps it off the async executor threads.
    pub(crate) async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Internal("connection mutex poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Internal(e.to_string()))?
    }
}
