use crate::core::error::ShareError;
use crate::core::schemas;
use rusqlite::{Connection, OptionalExtension, params};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub fn db_connect(db_path: &Path, busy_timeout_secs: u64) -> Result<Connection, ShareError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(busy_timeout_secs))?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
    conn.execute("PRAGMA foreign_keys=ON;", [])?;
    Ok(conn)
}

/// Create the master tables if missing and stamp the schema version.
pub fn initialize_master_db(conn: &Connection) -> Result<(), ShareError> {
    for stmt in schemas::MASTER_DB_STATEMENTS {
        conn.execute(stmt, [])?;
    }
    let version: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    match version {
        None => {
            conn.execute(
                "INSERT INTO meta(key, value) VALUES('schema_version', ?1)",
                params![schemas::MASTER_SCHEMA_VERSION.to_string()],
            )?;
        }
        Some(v) if v == schemas::MASTER_SCHEMA_VERSION.to_string() => {}
        Some(v) => {
            return Err(ShareError::ValidationError(format!(
                "master catalog schema version {} is not supported (expected {})",
                v,
                schemas::MASTER_SCHEMA_VERSION
            )));
        }
    }
    Ok(())
}

/// Ensure an instance store exists at `location` and is a readable SQLite file.
///
/// The tables inside an instance belong to the application layer; an empty
/// database is a valid freshly provisioned store.
pub fn materialize_instance_store(location: &Path, busy_timeout_secs: u64) -> Result<(), ShareError> {
    if let Some(parent) = location.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let conn = db_connect(location, busy_timeout_secs)?;
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(())
}
