//! Store abstraction for the shared catalog root.
//!
//! A store root is the directory every desktop process agrees on by
//! convention. It holds the master catalog database and one namespace
//! directory per identity for the instances provisioned on its behalf.

use crate::core::config::{self, Settings};
use crate::core::error::ShareError;
use crate::core::identity::Identity;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Longest sanitized name accepted for a file or namespace directory.
pub const MAX_NAME_LEN: usize = 30;

/// Store handle representing a shared catalog root.
#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute path to the store root directory
    pub root: PathBuf,
    pub settings: Settings,
}

impl Store {
    /// Open a store root, reading `sharestore.toml` if present.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ShareError> {
        let root = root.into();
        let settings = config::load_settings(&root)?;
        Ok(Self { root, settings })
    }

    pub fn with_settings(root: impl Into<PathBuf>, settings: Settings) -> Self {
        Self {
            root: root.into(),
            settings,
        }
    }

    pub fn master_db_path(&self) -> PathBuf {
        self.root.join(&self.settings.master_db_name)
    }

    /// Per-identity namespace directory for instance stores.
    pub fn identity_dir(&self, identity: &Identity) -> PathBuf {
        self.root.join(sanitize_name(identity.as_str()))
    }
}

/// Replace characters that are invalid in file names, turn spaces into
/// underscores, trim, and cap the length. Leading dots become underscores so
/// the result never names `.`, `..`, or a hidden entry.
pub fn sanitize_name(name: &str) -> String {
    static INVALID: OnceLock<Regex> = OnceLock::new();
    static LEADING_DOTS: OnceLock<Regex> = OnceLock::new();
    let re = INVALID.get_or_init(|| Regex::new(r#"[\\/*?:"<>|]"#).expect("static regex"));
    let dots = LEADING_DOTS.get_or_init(|| Regex::new(r"^\.+").expect("static regex"));
    let cleaned = re.replace_all(name.trim(), "_").replace(' ', "_");
    let cleaned = dots.replace(&cleaned, |caps: &regex::Captures<'_>| "_".repeat(caps[0].len()));
    cleaned.chars().take(MAX_NAME_LEN).collect()
}

/// Validate a caller-supplied location string.
pub fn validate_location(location: &str) -> Result<&str, ShareError> {
    if location.trim().is_empty() {
        return Err(ShareError::ValidationError(
            "location must not be empty".to_string(),
        ));
    }
    if location.contains('\0') {
        return Err(ShareError::ValidationError(format!(
            "location contains a NUL byte: {:?}",
            location
        )));
    }
    if location != location.trim() {
        return Err(ShareError::ValidationError(format!(
            "location has surrounding whitespace: {:?}",
            location
        )));
    }
    Ok(location)
}

/// File-name component of a location, used as the default display name.
pub fn location_file_name(location: &str) -> String {
    Path::new(location)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| location.to_string())
}
