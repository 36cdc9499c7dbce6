//! Acting identity, passed explicitly into every catalog call.

use crate::core::error::ShareError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Environment variable consulted first by [`Identity::from_session`].
pub const IDENTITY_ENV: &str = "SHARESTORE_IDENTITY";

/// An OS-session user name. Casing is not stable across sessions, so all
/// comparisons go through [`Identity::key`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn parse(raw: &str) -> Result<Self, ShareError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ShareError::ValidationError(
                "identity must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Resolve the session user: `SHARESTORE_IDENTITY`, then `USER`, then `USERNAME`.
    pub fn from_session() -> Result<Self, ShareError> {
        [IDENTITY_ENV, "USER", "USERNAME"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|v| !v.trim().is_empty())
            .map(|v| Self::parse(&v))
            .unwrap_or_else(|| {
                Err(ShareError::ValidationError(
                    "no session identity found (set SHARESTORE_IDENTITY or pass --identity)"
                        .to_string(),
                ))
            })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-folded comparison key.
    pub fn key(&self) -> String {
        self.0.to_lowercase()
    }

    pub fn matches(&self, other: &str) -> bool {
        self.key() == other.to_lowercase()
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Identity {}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = ShareError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.0
    }
}
