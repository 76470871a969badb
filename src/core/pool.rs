//! SQLite connection pool with read/write separation.
//!
//! - Writes are serialized through a per-pool mutex and run on a fresh connection.
//! - Reads open a fresh connection without taking the mutex (concurrent via WAL).
//! - Both paths share the configured `busy_timeout`, the only timeout contract
//!   the store exposes.
//!
//! Connections are opened per operation rather than cached so a corrupt or
//! replaced database file is noticed on the next call instead of being masked
//! by a long-lived handle.

use crate::core::db;
use crate::core::error::{FailureKind, ReportError};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

pub struct SqlitePool {
    db_path: PathBuf,
    busy_timeout: Duration,
    write_lock: Mutex<()>,
}

impl SqlitePool {
    pub fn new(db_path: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Self {
            db_path: db_path.into(),
            busy_timeout,
            write_lock: Mutex::new(()),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Execute a closure with a write connection. Write access is serialized.
    pub fn with_write<F, R>(&self, f: F) -> Result<R, ReportError>
    where
        F: FnOnce(&mut Connection) -> Result<R, ReportError>,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| ReportError::StoreFailure(FailureKind::Internal))?;
        let mut conn = db::db_connect(&self.db_path, self.busy_timeout)?;
        f(&mut conn)
    }

    /// Execute a closure with a read connection (no mutex serialization).
    pub fn with_read<F, R>(&self, f: F) -> Result<R, ReportError>
    where
        F: FnOnce(&Connection) -> Result<R, ReportError>,
    {
        let conn = db::db_connect(&self.db_path, self.busy_timeout)?;
        f(&conn)
    }
}

/// Check if an error is a SQLite busy/locked error.
pub fn is_busy_error(err: &ReportError) -> bool {
    match err {
        ReportError::RusqliteError(rusqlite::Error::SqliteFailure(code, _)) => matches!(
            code.code,
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
        ),
        _ => false,
    }
}
