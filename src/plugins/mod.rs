//! Catalog subsystems.
//!
//! - `catalog`: master catalog and per-user resolver
//! - `permissions`: the ownership predicate and owner-only counters
//! - `access`: request/approve/reject workflow for sharing an instance
//! - `audit`: append-only log of every successful open

/// Store a closed enum as its lowercase TEXT tag. The type must provide
/// `as_str(&self) -> &'static str` and `parse_str(&str) -> Option<Self>`.
macro_rules! text_enum_sql {
    ($ty:ty) => {
        impl rusqlite::types::ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $ty {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                let raw = value.as_str()?;
                <$ty>::parse_str(raw).ok_or_else(|| {
                    rusqlite::types::FromSqlError::Other(
                        format!("unknown {} tag '{}'", stringify!($ty), raw).into(),
                    )
                })
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub mod access;
pub mod audit;
pub mod catalog;
pub mod permissions;
