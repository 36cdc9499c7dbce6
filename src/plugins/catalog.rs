//! Master catalog and per-user resolver.
//!
//! The catalog is the directory of every instance store the organisation
//! knows about. [`resolve`] decides which instance an identity opens:
//! its most recently used active instance, else the shared default
//! instance, else a freshly provisioned one in the identity's namespace.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error::ShareError;
use crate::core::identity::Identity;
use crate::core::schemas::ENTRY_COLUMNS;
use crate::core::store::{self, Store};
use crate::core::time;
use crate::plugins::permissions;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Display name given to the instance provisioned on an identity's first resolve.
pub const PRIMARY_INSTANCE_NAME: &str = "primary";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Active,
    Deleted,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Active => "active",
            EntryStatus::Deleted => "deleted",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(EntryStatus::Active),
            "deleted" => Some(EntryStatus::Deleted),
            _ => None,
        }
    }
}

text_enum_sql!(EntryStatus);

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: String,
    pub owner_identity: String,
    pub display_name: String,
    pub objective: String,
    pub subject_notes: String,
    pub created_at: i64,
    pub status: EntryStatus,
    pub location: String,
    pub last_access_at: i64,
}

impl CatalogEntry {
    /// Map a row whose first columns follow [`ENTRY_COLUMNS`].
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(CatalogEntry {
            id: row.get(0)?,
            owner_identity: row.get(1)?,
            display_name: row.get(2)?,
            objective: row.get(3)?,
            subject_notes: row.get(4)?,
            created_at: row.get(5)?,
            status: row.get(6)?,
            location: row.get(7)?,
            last_access_at: row.get(8)?,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == EntryStatus::Active
    }
}

/// Descriptive fields supplied when a location is first registered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Defaults to the location's file name.
    pub display_name: Option<String>,
    pub objective: String,
    pub subject_notes: String,
}

struct NewEntry<'a> {
    owner: &'a Identity,
    display_name: &'a str,
    objective: &'a str,
    subject_notes: &'a str,
    location: &'a str,
    now: i64,
}

fn insert_entry(conn: &Connection, new: &NewEntry<'_>) -> Result<CatalogEntry, ShareError> {
    let entry = CatalogEntry {
        id: time::new_id(),
        owner_identity: new.owner.as_str().to_string(),
        display_name: new.display_name.to_string(),
        objective: new.objective.to_string(),
        subject_notes: new.subject_notes.to_string(),
        created_at: new.now,
        status: EntryStatus::Active,
        location: new.location.to_string(),
        last_access_at: new.now,
    };
    conn.execute(
        "INSERT INTO catalog_entries(id, owner_identity, owner_key, display_name, objective, \
         subject_notes, created_at, status, location, last_access_at) \
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            entry.id,
            entry.owner_identity,
            new.owner.key(),
            entry.display_name,
            entry.objective,
            entry.subject_notes,
            entry.created_at,
            entry.status,
            entry.location,
            entry.last_access_at
        ],
    )?;
    Ok(entry)
}

pub(crate) fn entry_by_location(
    conn: &Connection,
    location: &str,
) -> Result<Option<CatalogEntry>, ShareError> {
    let sql = format!("SELECT {ENTRY_COLUMNS} FROM catalog_entries WHERE location = ?1");
    Ok(conn
        .query_row(&sql, params![location], CatalogEntry::from_row)
        .optional()?)
}

pub(crate) fn entry_by_id(conn: &Connection, id: &str) -> Result<Option<CatalogEntry>, ShareError> {
    let sql = format!("SELECT {ENTRY_COLUMNS} FROM catalog_entries WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id], CatalogEntry::from_row)
        .optional()?)
}

/// Bump `last_access_at` on an entry.
pub(crate) fn touch(conn: &Connection, entry_id: &str, now: i64) -> Result<(), ShareError> {
    conn.execute(
        "UPDATE catalog_entries SET last_access_at = ?1 WHERE id = ?2",
        params![now, entry_id],
    )?;
    Ok(())
}

fn most_recent_owned(conn: &Connection, identity: &Identity) -> Result<Option<String>, ShareError> {
    Ok(conn
        .query_row(
            "SELECT location FROM catalog_entries \
             WHERE owner_key = ?1 AND status = 'active' \
             ORDER BY last_access_at DESC, rowid DESC LIMIT 1",
            params![identity.key()],
            |row| row.get(0),
        )
        .optional()?)
}

fn default_location(conn: &Connection, default_name: &str) -> Result<Option<String>, ShareError> {
    Ok(conn
        .query_row(
            "SELECT location FROM catalog_entries \
             WHERE display_name = ?1 AND status = 'active' \
             ORDER BY created_at ASC, rowid ASC LIMIT 1",
            params![default_name],
            |row| row.get(0),
        )
        .optional()?)
}

fn location_taken(conn: &Connection, location: &str) -> Result<bool, ShareError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM catalog_entries WHERE location = ?1",
        params![location],
        |row| row.get(0),
    )?;
    Ok(count > 0 || Path::new(location).exists())
}

/// First `store_<date>_<n>.db` in the identity's namespace that is neither
/// catalogued nor present on disk.
fn next_free_location(
    conn: &Connection,
    store: &Store,
    identity: &Identity,
    now: i64,
) -> Result<String, ShareError> {
    let dir = store.identity_dir(identity);
    let stamp = time::date_stamp(now);
    let mut n = 1u32;
    loop {
        let candidate = dir
            .join(format!("store_{stamp}_{n}.db"))
            .to_string_lossy()
            .to_string();
        if !location_taken(conn, &candidate)? {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// Create the instance file for a new entry. Runs inside the write
/// transaction that inserts the row, so a failure here rolls the row back.
fn materialize(store: &Store, location: &str) -> Result<(), ShareError> {
    if !store.settings.materialize_stores {
        return Ok(());
    }
    db::materialize_instance_store(Path::new(location), store.settings.busy_timeout_secs)
}

enum Resolution {
    Owned(String),
    Default(String),
    Provisioned(String),
}

/// Decide which instance `identity` should open, provisioning one if the
/// catalog has neither an owned instance nor a default instance.
pub fn resolve(store: &Store, identity: &Identity) -> Result<String, ShareError> {
    let broker = DbBroker::new(store);
    let default_name = store.settings.default_instance_name.as_str();

    let fast = broker.read(identity, "catalog.resolve.lookup", |conn| {
        if let Some(loc) = most_recent_owned(conn, identity)? {
            return Ok(Some(Resolution::Owned(loc)));
        }
        Ok(default_location(conn, default_name)?.map(Resolution::Default))
    })?;

    let resolution = match fast {
        Some(found) => found,
        None => broker.write(identity, "catalog.resolve.provision", |conn| {
            // Re-check under the write lock: another process may have won.
            if let Some(loc) = most_recent_owned(conn, identity)? {
                return Ok(Resolution::Owned(loc));
            }
            if let Some(loc) = default_location(conn, default_name)? {
                return Ok(Resolution::Default(loc));
            }
            let now = time::now_epoch_ms();
            let location = next_free_location(conn, store, identity, now)?;
            let new = NewEntry {
                owner: identity,
                display_name: PRIMARY_INSTANCE_NAME,
                objective: "",
                subject_notes: "",
                location: &location,
                now,
            };
            match insert_entry(conn, &new) {
                Ok(entry) => {
                    materialize(store, &entry.location)?;
                    Ok(Resolution::Provisioned(entry.location))
                }
                Err(e) if e.is_constraint_violation() => most_recent_owned(conn, identity)?
                    .map(Resolution::Owned)
                    .ok_or(e),
                Err(e) => Err(e),
            }
        })?,
    };

    match resolution {
        Resolution::Owned(loc) => Ok(loc),
        Resolution::Default(loc) => {
            tracing::debug!(identity = identity.as_str(), location = %loc, "routing to default instance");
            Ok(loc)
        }
        Resolution::Provisioned(loc) => {
            tracing::info!(identity = identity.as_str(), location = %loc, "provisioned instance");
            Ok(loc)
        }
    }
}

/// Insert a catalog entry for `location` owned by `identity`, or bump its
/// `last_access_at` when it is already catalogued.
pub fn register_or_touch(
    store: &Store,
    location: &str,
    identity: &Identity,
    metadata: &EntryMetadata,
) -> Result<CatalogEntry, ShareError> {
    let location = store::validate_location(location)?;
    let display_name = metadata
        .display_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| store::location_file_name(location));
    let broker = DbBroker::new(store);

    broker.write(identity, "catalog.register_or_touch", |conn| {
        let now = time::now_epoch_ms();
        if let Some(mut existing) = entry_by_location(conn, location)? {
            touch(conn, &existing.id, now)?;
            existing.last_access_at = now;
            return Ok(existing);
        }
        let new = NewEntry {
            owner: identity,
            display_name: &display_name,
            objective: &metadata.objective,
            subject_notes: &metadata.subject_notes,
            location,
            now,
        };
        insert_entry(conn, &new).map_err(|e| name_conflict(e, identity, &display_name))
    })
}

fn name_conflict(err: ShareError, identity: &Identity, display_name: &str) -> ShareError {
    if err.is_constraint_violation() {
        ShareError::ValidationError(format!(
            "'{}' already owns an active instance named '{}'",
            identity, display_name
        ))
    } else {
        err
    }
}

/// Create a named instance in the identity's namespace.
pub fn create_named(
    store: &Store,
    identity: &Identity,
    name: &str,
    objective: &str,
    subject_notes: &str,
) -> Result<CatalogEntry, ShareError> {
    let mut file_name = store::sanitize_name(name);
    if file_name.is_empty() {
        return Err(ShareError::ValidationError(
            "instance name must not be empty".to_string(),
        ));
    }
    if !file_name.to_lowercase().ends_with(".db") {
        file_name.push_str(".db");
    }
    let location = store
        .identity_dir(identity)
        .join(&file_name)
        .to_string_lossy()
        .to_string();
    let broker = DbBroker::new(store);

    let entry = broker.write(identity, "catalog.create_named", |conn| {
        if location_taken(conn, &location)? {
            return Err(ShareError::ValidationError(format!(
                "an instance already exists at {}",
                location
            )));
        }
        let new = NewEntry {
            owner: identity,
            display_name: &file_name,
            objective: objective.trim(),
            subject_notes: subject_notes.trim(),
            location: &location,
            now: time::now_epoch_ms(),
        };
        let entry = insert_entry(conn, &new).map_err(|e| name_conflict(e, identity, &file_name))?;
        materialize(store, &entry.location)?;
        Ok(entry)
    })?;

    tracing::info!(identity = identity.as_str(), location = %entry.location, "created named instance");
    Ok(entry)
}

/// Active instances owned by `identity`, most recently used first.
pub fn list_owned(store: &Store, identity: &Identity) -> Result<Vec<CatalogEntry>, ShareError> {
    let broker = DbBroker::new(store);
    broker.read(identity, "catalog.list_owned", |conn| {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM catalog_entries \
             WHERE owner_key = ?1 AND status = 'active' \
             ORDER BY last_access_at DESC, rowid DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![identity.key()], CatalogEntry::from_row)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}

pub fn find_by_location(
    store: &Store,
    actor: &Identity,
    location: &str,
) -> Result<Option<CatalogEntry>, ShareError> {
    let location = store::validate_location(location)?;
    let broker = DbBroker::new(store);
    broker.read(actor, "catalog.find", |conn| entry_by_location(conn, location))
}

/// Mark an active instance as deleted. Only its owner may do so; every other
/// case (unknown location, foreign owner, already deleted) returns `false`.
pub fn soft_delete(store: &Store, location: &str, identity: &Identity) -> Result<bool, ShareError> {
    let location = store::validate_location(location)?;
    let broker = DbBroker::new(store);
    let deleted = broker.write(identity, "catalog.soft_delete", |conn| {
        let Some(entry) = entry_by_location(conn, location)? else {
            return Ok(false);
        };
        if !permissions::owns(&entry, identity) || !entry.is_active() {
            return Ok(false);
        }
        let changed = conn.execute(
            "UPDATE catalog_entries SET status = ?1 WHERE id = ?2 AND status = ?3",
            params![EntryStatus::Deleted, entry.id, EntryStatus::Active],
        )?;
        Ok(changed == 1)
    })?;
    if deleted {
        tracing::info!(identity = identity.as_str(), location, "instance soft-deleted");
    }
    Ok(deleted)
}
