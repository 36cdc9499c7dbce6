//! SQLite connection pool with read/write separation and bounded retry.
//!
//! - Write operations run inside one `BEGIN IMMEDIATE` transaction, serialized
//!   in-process through a per-DB mutex and across processes by SQLite's
//!   reserved lock.
//! - Read operations create fresh connections without mutex serialization
//!   (WAL concurrent reads, read-committed).
//! - Both paths retry busy/locked/unreachable failures with exponential
//!   backoff and surface [`ShareError::StorageUnavailable`] once the attempt
//!   budget is spent.
//!
//! Connections are NOT pooled (opened fresh each time): the catalog usually
//! lives on a shared network path, and long-held handles keep WAL/SHM files
//! pinned for every other desktop process.

use crate::core::config::{RetryPolicy, Settings};
use crate::core::db;
use crate::core::error::ShareError;
use rusqlite::{Connection, TransactionBehavior};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::thread;

/// Per-database entry holding a write mutex for serialized write access.
struct PoolEntry {
    write_lock: Mutex<()>,
    db_path: PathBuf,
}

/// Connection pool providing read/write separation per SQLite database.
pub struct SqlitePool {
    entries: Mutex<HashMap<PathBuf, &'static PoolEntry>>,
}

impl SqlitePool {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn get_entry(&self, db_path: &Path) -> &'static PoolEntry {
        let canonical = db_path.to_path_buf();
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(entry) = entries.get(&canonical) {
            return entry;
        }
        let entry = Box::leak(Box::new(PoolEntry {
            write_lock: Mutex::new(()),
            db_path: canonical.clone(),
        }));
        entries.insert(canonical, entry);
        entry
    }

    /// Run `f` inside one IMMEDIATE transaction. The closure may run more
    /// than once when an attempt fails with a transient error; a failed
    /// attempt is rolled back before the next one starts.
    pub fn with_write<F, R>(&self, db_path: &Path, settings: &Settings, mut f: F) -> Result<R, ShareError>
    where
        F: FnMut(&Connection) -> Result<R, ShareError>,
    {
        let entry = self.get_entry(db_path);
        retry_on_busy(&settings.retry, || {
            let _guard = entry.write_lock.lock().unwrap_or_else(|p| p.into_inner());
            let mut conn = open_connection(&entry.db_path, settings.busy_timeout_secs)?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let out = f(&tx)?;
            tx.commit()?;
            Ok(out)
        })
    }

    /// Execute a closure with a read connection (no mutex serialization).
    pub fn with_read<F, R>(&self, db_path: &Path, settings: &Settings, mut f: F) -> Result<R, ShareError>
    where
        F: FnMut(&Connection) -> Result<R, ShareError>,
    {
        retry_on_busy(&settings.retry, || {
            let conn = open_connection(db_path, settings.busy_timeout_secs)?;
            f(&conn)
        })
    }
}

fn open_connection(db_path: &Path, busy_timeout_secs: u64) -> Result<Connection, ShareError> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    db::db_connect(db_path, busy_timeout_secs)
}

/// Retry a closure on transient storage errors with exponential backoff.
pub fn retry_on_busy<F, R>(policy: &RetryPolicy, mut f: F) -> Result<R, ShareError>
where
    F: FnMut() -> Result<R, ShareError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) if is_transient(&e) => {
                if attempt >= max_attempts {
                    tracing::error!(attempts = attempt, error = %e, "storage unavailable");
                    return Err(ShareError::StorageUnavailable {
                        attempts: attempt,
                        detail: e.to_string(),
                    });
                }
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient storage error, retrying"
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Busy/locked databases and unreachable files are worth another attempt.
pub fn is_transient(err: &ShareError) -> bool {
    match err {
        ShareError::RusqliteError(rusqlite::Error::SqliteFailure(code, _)) => matches!(
            code.code,
            rusqlite::ErrorCode::DatabaseBusy
                | rusqlite::ErrorCode::DatabaseLocked
                | rusqlite::ErrorCode::CannotOpen
                | rusqlite::ErrorCode::SystemIoFailure
        ),
        ShareError::IoError(_) => true,
        _ => false,
    }
}

/// Global pool instance (same lifetime as the process).
pub fn global_pool() -> &'static SqlitePool {
    static POOL: OnceLock<SqlitePool> = OnceLock::new();
    POOL.get_or_init(SqlitePool::new)
}
