use rusqlite;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShareError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(#[from] toml::de::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("A pending request already exists for entry {entry_id} from '{requester}'")]
    DuplicateRequest { entry_id: String, requester: String },
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Request {0} has already been resolved")]
    AlreadyResolved(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Storage unavailable after {attempts} attempts: {detail}")]
    StorageUnavailable { attempts: u32, detail: String },
}

impl ShareError {
    /// True for the terminal transient failure surfaced after retries run out.
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, ShareError::StorageUnavailable { .. })
    }

    /// Process exit code for the CLI (sysexits-style).
    pub fn exit_code(&self) -> u8 {
        match self {
            ShareError::ValidationError(_) | ShareError::ConfigError(_) => 65,
            ShareError::NotFound(_) => 66,
            ShareError::DuplicateRequest { .. } | ShareError::AlreadyResolved(_) => 73,
            ShareError::StorageUnavailable { .. } => 75,
            ShareError::PermissionDenied(_) => 77,
            ShareError::RusqliteError(_) | ShareError::IoError(_) => 74,
        }
    }

    /// True when SQLite rejected a write on a UNIQUE/CHECK/FK constraint.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            ShareError::RusqliteError(rusqlite::Error::SqliteFailure(code, _))
                if code.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}
