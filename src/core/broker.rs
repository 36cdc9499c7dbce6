use crate::core::db;
use crate::core::error::ShareError;
use crate::core::identity::Identity;
use crate::core::pool;
use crate::core::store::Store;
use rusqlite::Connection;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

/// The DB Broker is the "Thin Waist" for catalog access.
///
/// Every operation names its actor and op so the outcome lands in the
/// structured log; connection handling, the write transaction, and the
/// bounded retry live in [`pool`].
pub struct DbBroker<'a> {
    store: &'a Store,
    db_path: PathBuf,
}

impl<'a> DbBroker<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self {
            store,
            db_path: store.master_db_path(),
        }
    }

    /// Run a check-then-write sequence as one IMMEDIATE transaction.
    pub fn write<F, R>(&self, actor: &Identity, op: &str, f: F) -> Result<R, ShareError>
    where
        F: FnMut(&Connection) -> Result<R, ShareError>,
    {
        self.ensure_schema()?;
        let started = Instant::now();
        let result = pool::global_pool().with_write(&self.db_path, &self.store.settings, f);
        self.log_event(actor, op, "write", started, &result);
        result
    }

    pub fn read<F, R>(&self, actor: &Identity, op: &str, f: F) -> Result<R, ShareError>
    where
        F: FnMut(&Connection) -> Result<R, ShareError>,
    {
        self.ensure_schema()?;
        let started = Instant::now();
        let result = pool::global_pool().with_read(&self.db_path, &self.store.settings, f);
        self.log_event(actor, op, "read", started, &result);
        result
    }

    /// Create the master tables once per process per catalog path.
    fn ensure_schema(&self) -> Result<(), ShareError> {
        static READY: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();
        let ready = READY.get_or_init(|| Mutex::new(HashSet::new()));
        if ready
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(&self.db_path)
        {
            return Ok(());
        }
        pool::global_pool().with_write(&self.db_path, &self.store.settings, |conn| {
            db::initialize_master_db(conn)
        })?;
        ready
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(self.db_path.clone());
        Ok(())
    }

    fn log_event<R>(
        &self,
        actor: &Identity,
        op: &str,
        mode: &str,
        started: Instant,
        result: &Result<R, ShareError>,
    ) {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let db_id = self
            .db_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy();
        match result {
            Ok(_) => tracing::debug!(
                actor = actor.as_str(),
                op,
                mode,
                db = %db_id,
                elapsed_ms,
                status = "success",
                "catalog op"
            ),
            Err(e) if e.is_storage_unavailable() => tracing::error!(
                actor = actor.as_str(),
                op,
                mode,
                db = %db_id,
                elapsed_ms,
                status = "unavailable",
                error = %e,
                "catalog op"
            ),
            Err(e) => tracing::info!(
                actor = actor.as_str(),
                op,
                mode,
                db = %db_id,
                elapsed_ms,
                status = "error",
                error = %e,
                "catalog op"
            ),
        }
    }
}
