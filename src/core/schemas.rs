//! Master catalog schema.
//!
//! One SQLite database (`master.db` by default) holds three tables:
//! 1. catalog_entries: every known instance store, its owner and status.
//! 2. access_requests: sharing requests from non-owners and their outcome.
//! 3. access_log: append-only record of every successful open.
//!
//! Identities are stored verbatim next to a lowercase `*_key` column; all
//! comparisons and uniqueness constraints use the key.

pub const MASTER_SCHEMA_VERSION: u32 = 1;

pub const MASTER_DB_SCHEMA_META: &str = "
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
";

pub const MASTER_DB_SCHEMA_ENTRIES: &str = "
    CREATE TABLE IF NOT EXISTS catalog_entries (
        id TEXT PRIMARY KEY,
        owner_identity TEXT NOT NULL CHECK (length(owner_identity) > 0),
        owner_key TEXT NOT NULL CHECK (length(owner_key) > 0),
        display_name TEXT NOT NULL,
        objective TEXT NOT NULL DEFAULT '',
        subject_notes TEXT NOT NULL DEFAULT '',
        created_at INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'deleted')),
        location TEXT NOT NULL UNIQUE,
        last_access_at INTEGER NOT NULL
    )
";

pub const MASTER_DB_SCHEMA_REQUESTS: &str = "
    CREATE TABLE IF NOT EXISTS access_requests (
        id TEXT PRIMARY KEY,
        entry_id TEXT NOT NULL,
        requester_identity TEXT NOT NULL,
        requester_key TEXT NOT NULL,
        requested_at INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'approved', 'rejected')),
        resolved_at INTEGER,
        FOREIGN KEY(entry_id) REFERENCES catalog_entries(id)
    )
";

pub const MASTER_DB_SCHEMA_ACCESS_LOG: &str = "
    CREATE TABLE IF NOT EXISTS access_log (
        id TEXT PRIMARY KEY,
        entry_id TEXT NOT NULL,
        opener_identity TEXT NOT NULL,
        location_snapshot TEXT NOT NULL,
        opened_at INTEGER NOT NULL,
        origin TEXT NOT NULL CHECK (origin IN ('owner', 'shared')),
        FOREIGN KEY(entry_id) REFERENCES catalog_entries(id)
    )
";

pub const MASTER_DB_INDEX_ACTIVE_NAME: &str = "
    CREATE UNIQUE INDEX IF NOT EXISTS idx_entries_active_owner_name
    ON catalog_entries(owner_key, display_name) WHERE status = 'active'
";
pub const MASTER_DB_INDEX_ENTRIES_OWNER: &str =
    "CREATE INDEX IF NOT EXISTS idx_entries_owner ON catalog_entries(owner_key, status)";
pub const MASTER_DB_INDEX_ONE_PENDING: &str = "
    CREATE UNIQUE INDEX IF NOT EXISTS idx_requests_one_pending
    ON access_requests(entry_id, requester_key) WHERE status = 'pending'
";
pub const MASTER_DB_INDEX_REQUESTS_ENTRY: &str =
    "CREATE INDEX IF NOT EXISTS idx_requests_entry ON access_requests(entry_id, status)";
pub const MASTER_DB_INDEX_LOG_ENTRY: &str =
    "CREATE INDEX IF NOT EXISTS idx_access_log_entry ON access_log(entry_id, opened_at)";

/// Every statement needed to bring an empty database to the current schema.
pub const MASTER_DB_STATEMENTS: &[&str] = &[
    MASTER_DB_SCHEMA_META,
    MASTER_DB_SCHEMA_ENTRIES,
    MASTER_DB_SCHEMA_REQUESTS,
    MASTER_DB_SCHEMA_ACCESS_LOG,
    MASTER_DB_INDEX_ACTIVE_NAME,
    MASTER_DB_INDEX_ENTRIES_OWNER,
    MASTER_DB_INDEX_ONE_PENDING,
    MASTER_DB_INDEX_REQUESTS_ENTRY,
    MASTER_DB_INDEX_LOG_ENTRY,
];

/// Column list shared by every `CatalogEntry` query (prefix-free).
pub const ENTRY_COLUMNS: &str = "id, owner_identity, display_name, objective, subject_notes, \
     created_at, status, location, last_access_at";

/// Column list shared by every `AccessRequest` query (prefix-free).
pub const REQUEST_COLUMNS: &str =
    "id, entry_id, requester_identity, requested_at, status, resolved_at";
