//! Ownership predicate shared by every catalog mutation and by the audit
//! origin classification.

use crate::core::broker::DbBroker;
use crate::core::error::ShareError;
use crate::core::identity::Identity;
use crate::core::store::{self, Store};
use crate::plugins::catalog::{self, CatalogEntry};
use rusqlite::params;

/// The single ownership predicate. Case-insensitive.
pub fn owns(entry: &CatalogEntry, identity: &Identity) -> bool {
    identity.matches(&entry.owner_identity)
}

pub(crate) fn require_owner(
    entry: &CatalogEntry,
    identity: &Identity,
    action: &str,
) -> Result<(), ShareError> {
    if owns(entry, identity) {
        Ok(())
    } else {
        Err(ShareError::PermissionDenied(format!(
            "'{}' does not own {} and cannot {}",
            identity, entry.location, action
        )))
    }
}

/// Whether `identity` owns the instance at `location`. Unknown locations are
/// owned by nobody.
pub fn is_owner(store: &Store, location: &str, identity: &Identity) -> Result<bool, ShareError> {
    let location = store::validate_location(location)?;
    let broker = DbBroker::new(store);
    broker.read(identity, "permissions.is_owner", |conn| {
        Ok(catalog::entry_by_location(conn, location)?
            .map(|entry| owns(&entry, identity))
            .unwrap_or(false))
    })
}

/// Pending requests on the instance at `location`. Callers other than the
/// owner always see 0; the pending rows are not even counted for them.
pub fn pending_count_for(store: &Store, location: &str, caller: &Identity) -> Result<i64, ShareError> {
    let location = store::validate_location(location)?;
    let broker = DbBroker::new(store);
    broker.read(caller, "permissions.pending_count", |conn| {
        let entry = match catalog::entry_by_location(conn, location)? {
            Some(entry) if owns(&entry, caller) => entry,
            _ => return Ok(0),
        };
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM access_requests \
             WHERE entry_id = ?1 AND status = 'pending' AND requester_key != ?2",
            params![entry.id, caller.key()],
            |row| row.get(0),
        )?;
        Ok(count)
    })
}
