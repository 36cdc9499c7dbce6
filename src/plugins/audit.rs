//! Connection audit log: one append-only row per successful open.
//!
//! The log is descriptive. It records whether the opener was the owner or a
//! guest, and trusts the caller to have checked shared access already.

use crate::core::broker::DbBroker;
use crate::core::error::ShareError;
use crate::core::identity::Identity;
use crate::core::store::{self, Store};
use crate::core::time;
use crate::plugins::catalog;
use crate::plugins::permissions;
use rusqlite::{Row, params};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Owner,
    Shared,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Owner => "owner",
            Origin::Shared => "shared",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(Origin::Owner),
            "shared" => Some(Origin::Shared),
            _ => None,
        }
    }
}

text_enum_sql!(Origin);

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AccessLogEntry {
    pub id: String,
    pub entry_id: String,
    pub opener_identity: String,
    pub location_snapshot: String,
    pub opened_at: i64,
    pub origin: Origin,
}

impl AccessLogEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(AccessLogEntry {
            id: row.get(0)?,
            entry_id: row.get(1)?,
            opener_identity: row.get(2)?,
            location_snapshot: row.get(3)?,
            opened_at: row.get(4)?,
            origin: row.get(5)?,
        })
    }
}

/// Record that `opener` opened the instance at `location` and bump the
/// entry's `last_access_at`. Unregistered locations are not logged.
pub fn log_open(
    store: &Store,
    location: &str,
    opener: &Identity,
) -> Result<AccessLogEntry, ShareError> {
    let location = store::validate_location(location)?;
    let broker = DbBroker::new(store);
    let logged = broker.write(opener, "audit.log_open", |conn| {
        let entry = catalog::entry_by_location(conn, location)?.ok_or_else(|| {
            ShareError::NotFound(format!("no catalog entry for {}", location))
        })?;
        let origin = if permissions::owns(&entry, opener) {
            Origin::Owner
        } else {
            Origin::Shared
        };
        let now = time::now_epoch_ms();
        let row = AccessLogEntry {
            id: time::new_id(),
            entry_id: entry.id.clone(),
            opener_identity: opener.as_str().to_string(),
            location_snapshot: entry.location.clone(),
            opened_at: now,
            origin,
        };
        conn.execute(
            "INSERT INTO access_log(id, entry_id, opener_identity, location_snapshot, opened_at, origin) \
             VALUES(?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                row.id,
                row.entry_id,
                row.opener_identity,
                row.location_snapshot,
                row.opened_at,
                row.origin
            ],
        )?;
        catalog::touch(conn, &entry.id, now)?;
        Ok(row)
    })?;
    tracing::info!(
        opener = opener.as_str(),
        location,
        origin = logged.origin.as_str(),
        "instance opened"
    );
    Ok(logged)
}

/// Open history of the instance at `location`, newest first. Owner only.
pub fn list_opens(
    store: &Store,
    location: &str,
    acting: &Identity,
) -> Result<Vec<AccessLogEntry>, ShareError> {
    let location = store::validate_location(location)?;
    let broker = DbBroker::new(store);
    broker.read(acting, "audit.list_opens", |conn| {
        let entry = catalog::entry_by_location(conn, location)?.ok_or_else(|| {
            ShareError::NotFound(format!("no catalog entry for {}", location))
        })?;
        permissions::require_owner(&entry, acting, "read its open history")?;
        let mut stmt = conn.prepare(
            "SELECT id, entry_id, opener_identity, location_snapshot, opened_at, origin \
             FROM access_log WHERE entry_id = ?1 \
             ORDER BY opened_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map(params![entry.id], AccessLogEntry::from_row)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}
