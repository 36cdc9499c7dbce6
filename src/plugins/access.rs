//! Access request workflow.
//!
//! A non-owner asks for access to an instance; the owner approves or
//! rejects. `pending` is the only non-terminal state: a resolved request is
//! never reopened, and retrying after a rejection means filing a new one.
//! The owner can later revoke an approval, which turns it into a rejection.

use crate::core::broker::DbBroker;
use crate::core::error::ShareError;
use crate::core::identity::Identity;
use crate::core::schemas::REQUEST_COLUMNS;
use crate::core::store::Store;
use crate::core::time;
use crate::plugins::catalog::{self, CatalogEntry};
use crate::plugins::permissions;
use clap::ValueEnum;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            RequestStatus::Pending => false,
            RequestStatus::Approved | RequestStatus::Rejected => true,
        }
    }
}

text_enum_sql!(RequestStatus);

/// The owner's answer to a pending request.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn outcome(&self) -> RequestStatus {
        match self {
            Decision::Approve => RequestStatus::Approved,
            Decision::Reject => RequestStatus::Rejected,
        }
    }
}

/// What a prospective requester sees for an instance they do not own.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Pending,
    Approved,
    Rejected,
    Available,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Pending => "pending",
            Availability::Approved => "approved",
            Availability::Rejected => "rejected",
            Availability::Available => "available",
        }
    }

    /// Whether the requester may file a new request from this state.
    pub fn can_request(&self) -> bool {
        match self {
            Availability::Available | Availability::Rejected => true,
            Availability::Pending | Availability::Approved => false,
        }
    }
}

impl From<Option<RequestStatus>> for Availability {
    fn from(latest: Option<RequestStatus>) -> Self {
        match latest {
            None => Availability::Available,
            Some(RequestStatus::Pending) => Availability::Pending,
            Some(RequestStatus::Approved) => Availability::Approved,
            Some(RequestStatus::Rejected) => Availability::Rejected,
        }
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    pub id: String,
    pub entry_id: String,
    pub requester_identity: String,
    pub requested_at: i64,
    pub status: RequestStatus,
    pub resolved_at: Option<i64>,
}

impl AccessRequest {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(AccessRequest {
            id: row.get(0)?,
            entry_id: row.get(1)?,
            requester_identity: row.get(2)?,
            requested_at: row.get(3)?,
            status: row.get(4)?,
            resolved_at: row.get(5)?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AvailableEntry {
    pub entry: CatalogEntry,
    pub status: Availability,
}

/// An approved request on one of the owner's active instances.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SharedGrant {
    pub request_id: String,
    pub entry_id: String,
    pub display_name: String,
    pub location: String,
    pub requester_identity: String,
    pub resolved_at: Option<i64>,
}

fn request_by_id(conn: &Connection, id: &str) -> Result<Option<AccessRequest>, ShareError> {
    let sql = format!("SELECT {REQUEST_COLUMNS} FROM access_requests WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id], AccessRequest::from_row)
        .optional()?)
}

/// Status of the requester's latest request on an entry, if any.
fn latest_status(
    conn: &Connection,
    entry_id: &str,
    requester: &Identity,
) -> Result<Option<RequestStatus>, ShareError> {
    Ok(conn
        .query_row(
            "SELECT status FROM access_requests \
             WHERE entry_id = ?1 AND requester_key = ?2 \
             ORDER BY COALESCE(resolved_at, requested_at) DESC, requested_at DESC, rowid DESC \
             LIMIT 1",
            params![entry_id, requester.key()],
            |row| row.get(0),
        )
        .optional()?)
}

/// File a pending request for `requester` on the entry `entry_id`.
///
/// Only allowed when the requester has no request yet or the latest one was
/// rejected.
pub fn request_access(
    store: &Store,
    entry_id: &str,
    requester: &Identity,
) -> Result<String, ShareError> {
    let broker = DbBroker::new(store);
    let request_id = broker.write(requester, "access.request", |conn| {
        let entry = match catalog::entry_by_id(conn, entry_id)? {
            Some(entry) if entry.is_active() => entry,
            _ => return Err(ShareError::NotFound(format!("catalog entry {}", entry_id))),
        };
        if permissions::owns(&entry, requester) {
            return Err(ShareError::ValidationError(format!(
                "'{}' already owns {}",
                requester, entry.location
            )));
        }
        let duplicate = || ShareError::DuplicateRequest {
            entry_id: entry.id.clone(),
            requester: requester.as_str().to_string(),
        };
        let state = Availability::from(latest_status(conn, &entry.id, requester)?);
        if !state.can_request() {
            return Err(match state {
                Availability::Pending => duplicate(),
                _ => ShareError::ValidationError(format!(
                    "'{}' already has access to {}",
                    requester, entry.location
                )),
            });
        }
        let id = time::new_id();
        let inserted = conn.execute(
            "INSERT INTO access_requests(id, entry_id, requester_identity, requester_key, \
             requested_at, status) VALUES(?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                entry.id,
                requester.as_str(),
                requester.key(),
                time::now_epoch_ms(),
                RequestStatus::Pending
            ],
        );
        match inserted {
            Ok(_) => Ok(id),
            Err(e) => {
                let e = ShareError::from(e);
                if e.is_constraint_violation() { Err(duplicate()) } else { Err(e) }
            }
        }
    })?;
    tracing::info!(requester = requester.as_str(), entry_id, request_id = %request_id, "access requested");
    Ok(request_id)
}

/// Pending requests on instances owned by `owner`, newest first.
pub fn list_pending_for_owner(store: &Store, owner: &Identity) -> Result<Vec<AccessRequest>, ShareError> {
    let broker = DbBroker::new(store);
    broker.read(owner, "access.list_pending", |conn| {
        let mut stmt = conn.prepare(
            "SELECT r.id, r.entry_id, r.requester_identity, r.requested_at, r.status, r.resolved_at \
             FROM access_requests r \
             JOIN catalog_entries e ON r.entry_id = e.id \
             WHERE r.status = 'pending' AND e.owner_key = ?1 AND r.requester_key != ?1 \
             ORDER BY r.requested_at DESC, r.rowid DESC",
        )?;
        let rows = stmt.query_map(params![owner.key()], AccessRequest::from_row)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}

/// Approve or reject a pending request. Only the entry's owner may decide,
/// and only while the request is still pending.
pub fn resolve_request(
    store: &Store,
    request_id: &str,
    decision: Decision,
    acting: &Identity,
) -> Result<(), ShareError> {
    let broker = DbBroker::new(store);
    broker.write(acting, "access.resolve", |conn| {
        let request = request_by_id(conn, request_id)?
            .ok_or_else(|| ShareError::NotFound(format!("access request {}", request_id)))?;
        let entry = catalog::entry_by_id(conn, &request.entry_id)?
            .ok_or_else(|| ShareError::NotFound(format!("catalog entry {}", request.entry_id)))?;
        permissions::require_owner(&entry, acting, "resolve its access requests")?;
        if request.status.is_terminal() {
            return Err(ShareError::AlreadyResolved(request.id));
        }
        let changed = conn.execute(
            "UPDATE access_requests SET status = ?1, resolved_at = ?2 \
             WHERE id = ?3 AND status = ?4",
            params![
                decision.outcome(),
                time::now_epoch_ms(),
                request.id,
                RequestStatus::Pending
            ],
        )?;
        if changed != 1 {
            return Err(ShareError::AlreadyResolved(request.id));
        }
        Ok(())
    })?;
    tracing::info!(acting = acting.as_str(), request_id, decision = decision.outcome().as_str(), "access request resolved");
    Ok(())
}

/// Every active instance not owned by `requester`, with the state of the
/// requester's latest request on it.
pub fn list_available_for_requester(
    store: &Store,
    requester: &Identity,
) -> Result<Vec<AvailableEntry>, ShareError> {
    let broker = DbBroker::new(store);
    broker.read(requester, "access.list_available", |conn| {
        let mut stmt = conn.prepare(
            "SELECT e.id, e.owner_identity, e.display_name, e.objective, e.subject_notes, \
                    e.created_at, e.status, e.location, e.last_access_at, \
                    (SELECT r.status FROM access_requests r \
                     WHERE r.entry_id = e.id AND r.requester_key = ?1 \
                     ORDER BY COALESCE(r.resolved_at, r.requested_at) DESC, \
                              r.requested_at DESC, r.rowid DESC \
                     LIMIT 1) AS latest \
             FROM catalog_entries e \
             WHERE e.status = 'active' AND e.owner_key != ?1 \
             ORDER BY e.display_name COLLATE NOCASE, e.created_at",
        )?;
        let rows = stmt.query_map(params![requester.key()], |row| {
            let entry = CatalogEntry::from_row(row)?;
            let latest: Option<RequestStatus> = row.get(9)?;
            Ok(AvailableEntry {
                entry,
                status: Availability::from(latest),
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}

/// Withdraw `requester`'s approved access to `entry_id`. Returns `false`
/// when the caller is not the owner or there is no approval to withdraw.
pub fn revoke_approval(
    store: &Store,
    entry_id: &str,
    requester: &Identity,
    acting: &Identity,
) -> Result<bool, ShareError> {
    let broker = DbBroker::new(store);
    let revoked = broker.write(acting, "access.revoke", |conn| {
        let Some(entry) = catalog::entry_by_id(conn, entry_id)? else {
            return Ok(false);
        };
        if !permissions::owns(&entry, acting) {
            return Ok(false);
        }
        let changed = conn.execute(
            "UPDATE access_requests SET status = ?1, resolved_at = ?2 \
             WHERE entry_id = ?3 AND requester_key = ?4 AND status = ?5",
            params![
                RequestStatus::Rejected,
                time::now_epoch_ms(),
                entry.id,
                requester.key(),
                RequestStatus::Approved
            ],
        )?;
        Ok(changed > 0)
    })?;
    if revoked {
        tracing::info!(acting = acting.as_str(), requester = requester.as_str(), entry_id, "approval revoked");
    }
    Ok(revoked)
}

/// Approvals currently granted on `owner`'s active instances, most recent first.
pub fn list_shared_by_owner(store: &Store, owner: &Identity) -> Result<Vec<SharedGrant>, ShareError> {
    let broker = DbBroker::new(store);
    broker.read(owner, "access.list_shared", |conn| {
        let mut stmt = conn.prepare(
            "SELECT r.id, e.id, e.display_name, e.location, r.requester_identity, r.resolved_at \
             FROM access_requests r \
             JOIN catalog_entries e ON r.entry_id = e.id \
             WHERE r.status = 'approved' AND e.owner_key = ?1 AND e.status = 'active' \
             ORDER BY r.resolved_at DESC, r.rowid DESC",
        )?;
        let rows = stmt.query_map(params![owner.key()], |row| {
            Ok(SharedGrant {
                request_id: row.get(0)?,
                entry_id: row.get(1)?,
                display_name: row.get(2)?,
                location: row.get(3)?,
                requester_identity: row.get(4)?,
                resolved_at: row.get(5)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}

pub fn get_request(
    store: &Store,
    actor: &Identity,
    request_id: &str,
) -> Result<Option<AccessRequest>, ShareError> {
    let broker = DbBroker::new(store);
    broker.read(actor, "access.get", |conn| request_by_id(conn, request_id))
}
