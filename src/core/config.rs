//! Catalog settings loaded from `<root>/sharestore.toml`.
//!
//! Every key is optional; an absent file yields [`Settings::default`].
//!
//! ```toml
//! master_db_name = "master.db"
//! default_instance_name = "Default"
//! materialize_stores = true
//! busy_timeout_secs = 5
//!
//! [retry]
//! max_attempts = 4
//! base_delay_ms = 50
//! max_delay_ms = 2000
//! ```

use crate::core::error::ShareError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "sharestore.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// File name of the master catalog inside the store root.
    pub master_db_name: String,
    /// Display name of the shared fallback instance for identities without one.
    pub default_instance_name: String,
    /// Create the SQLite file for newly provisioned or created instances.
    pub materialize_stores: bool,
    pub busy_timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            master_db_name: "master.db".to_string(),
            default_instance_name: "Default".to_string(),
            materialize_stores: true,
            busy_timeout_secs: 5,
            retry: RetryPolicy::default(),
        }
    }
}

/// Bounded exponential backoff applied to every storage call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 50,
            max_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }
}

/// Load settings for a store root. A missing file is not an error.
pub fn load_settings(root: &Path) -> Result<Settings, ShareError> {
    let path = root.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = fs::read_to_string(&path).map_err(ShareError::IoError)?;
    let settings: Settings = toml::from_str(&content)?;
    if settings.retry.max_attempts == 0 {
        return Err(ShareError::ValidationError(format!(
            "{}: retry.max_attempts must be at least 1",
            path.display()
        )));
    }
    if settings.master_db_name.trim().is_empty() {
        return Err(ShareError::ValidationError(format!(
            "{}: master_db_name must not be empty",
            path.display()
        )));
    }
    Ok(settings)
}
