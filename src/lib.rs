//! sharestore: per-user store catalog with owner-approved sharing.
//!
//! Every desktop user owns private SQLite instance stores listed in one
//! shared master catalog. Other users gain access through an explicit
//! request/approve workflow, and every open is recorded in an append-only
//! audit log.
//!
//! # Architecture
//!
//! There is no server. Each desktop process opens the master catalog
//! directly, and every operation is one short transaction:
//!
//! - **Catalog** (`plugins::catalog`): which instance an identity opens;
//!   lazy provisioning; soft deletion
//! - **Permissions** (`plugins::permissions`): the ownership predicate
//! - **Access** (`plugins::access`): request/approve/reject/revoke
//! - **Audit** (`plugins::audit`): one row per successful open
//!
//! All storage access routes through `core::broker::DbBroker`, which logs
//! each op and delegates to `core::pool` for the IMMEDIATE write
//! transaction and the bounded retry.
//!
//! The acting identity is always an explicit [`core::identity::Identity`]
//! argument; the library never reads it from the environment.
//!
//! # Examples
//!
//! ```bash
//! export SHARESTORE_ROOT=/srv/share/catalog
//! sharestore resolve
//! sharestore available --format text
//! sharestore request 01J0ZK6M8Q4T5Z7X9C2B3N4V5W
//! sharestore decide 01J0ZK7A1B2C3D4E5F6G7H8J9K approve --identity beto
//! sharestore open /srv/share/catalog/beto/store_20240305_1.db
//! ```

pub mod core;
pub mod plugins;

mod cli;

use clap::Parser;
use cli::{Cli, Command, OutputFormat};
use colored::Colorize;
use crate::core::error::ShareError;
use crate::core::identity::Identity;
use crate::core::store::Store;
use crate::core::time;
use plugins::access::{self, Availability};
use plugins::{audit, catalog, permissions};
use serde_json::json;
use std::path::PathBuf;

/// Environment variable naming the catalog root for the CLI.
pub const ROOT_ENV: &str = "SHARESTORE_ROOT";

fn resolve_root(flag: Option<PathBuf>) -> Result<PathBuf, ShareError> {
    flag.or_else(|| std::env::var_os(ROOT_ENV).map(PathBuf::from))
        .ok_or_else(|| {
            ShareError::ValidationError(format!(
                "no catalog root (pass --root or set {})",
                ROOT_ENV
            ))
        })
}

fn emit(format: OutputFormat, cmd: &str, payload: serde_json::Value, text: impl FnOnce() -> String) {
    match format {
        OutputFormat::Json => {
            let envelope = time::command_envelope(cmd, "ok", payload);
            println!(
                "{}",
                serde_json::to_string_pretty(&envelope).unwrap_or_else(|_| envelope.to_string())
            );
        }
        OutputFormat::Text => println!("{}", text()),
    }
}

fn tag(status: Availability) -> String {
    let label = format!("[{}]", status.as_str());
    match status {
        Availability::Pending => label.yellow().to_string(),
        Availability::Approved => label.green().to_string(),
        Availability::Rejected => label.red().to_string(),
        Availability::Available => label.blue().to_string(),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, ShareError> {
    serde_json::to_value(value).map_err(|e| ShareError::ValidationError(e.to_string()))
}

pub fn run() -> Result<(), ShareError> {
    let cli = Cli::parse();
    let store = Store::open(resolve_root(cli.root)?)?;
    let me = match cli.identity.as_deref() {
        Some(raw) => Identity::parse(raw)?,
        None => Identity::from_session()?,
    };
    let fmt = cli.format;

    match cli.command {
        Command::Resolve => {
            let location = catalog::resolve(&store, &me)?;
            emit(fmt, "resolve", json!({ "location": location }), || location.clone());
        }
        Command::Create {
            name,
            objective,
            notes,
        } => {
            let entry = catalog::create_named(&store, &me, &name, &objective, &notes)?;
            emit(fmt, "create", json!({ "entry": to_json(&entry)? }), || {
                format!("created {} at {}", entry.display_name, entry.location)
            });
        }
        Command::Touch {
            location,
            name,
            objective,
            notes,
        } => {
            let metadata = catalog::EntryMetadata {
                display_name: name,
                objective,
                subject_notes: notes,
            };
            let entry = catalog::register_or_touch(&store, &location, &me, &metadata)?;
            emit(fmt, "touch", json!({ "entry": to_json(&entry)? }), || {
                format!("{} ({})", entry.location, entry.owner_identity)
            });
        }
        Command::Owned => {
            let entries = catalog::list_owned(&store, &me)?;
            emit(fmt, "owned", json!({ "entries": to_json(&entries)? }), || {
                entries
                    .iter()
                    .map(|e| {
                        format!(
                            "{}  {}  last access {}  {}",
                            e.id,
                            e.display_name.bold(),
                            time::format_epoch_ms(e.last_access_at),
                            e.location
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        }
        Command::Delete { location } => {
            let deleted = catalog::soft_delete(&store, &location, &me)?;
            emit(fmt, "delete", json!({ "deleted": deleted }), || {
                if deleted {
                    format!("{} marked as deleted", location)
                } else {
                    format!(
                        "{} was not deleted (unknown, not yours, or already deleted)",
                        location
                    )
                }
            });
        }
        Command::Request { entry_id } => {
            let request_id = access::request_access(&store, &entry_id, &me)?;
            emit(fmt, "request", json!({ "request_id": request_id }), || {
                format!("request {} sent", request_id)
            });
        }
        Command::Pending => {
            let requests = access::list_pending_for_owner(&store, &me)?;
            emit(fmt, "pending", json!({ "requests": to_json(&requests)? }), || {
                requests
                    .iter()
                    .map(|r| {
                        format!(
                            "{}  {}  entry {}  {}",
                            r.id,
                            r.requester_identity.bold(),
                            r.entry_id,
                            time::format_epoch_ms(r.requested_at)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        }
        Command::Decide {
            request_id,
            decision,
        } => {
            access::resolve_request(&store, &request_id, decision, &me)?;
            let outcome = decision.outcome();
            emit(
                fmt,
                "decide",
                json!({ "request_id": request_id, "status": outcome }),
                || format!("request {} {}", request_id, outcome),
            );
        }
        Command::Revoke {
            entry_id,
            requester,
        } => {
            let requester = Identity::parse(&requester)?;
            let revoked = access::revoke_approval(&store, &entry_id, &requester, &me)?;
            emit(fmt, "revoke", json!({ "revoked": revoked }), || {
                if revoked {
                    format!("access for {} revoked", requester)
                } else {
                    format!("no approval for {} to revoke", requester)
                }
            });
        }
        Command::Available => {
            let entries = access::list_available_for_requester(&store, &me)?;
            emit(fmt, "available", json!({ "entries": to_json(&entries)? }), || {
                entries
                    .iter()
                    .map(|a| {
                        format!(
                            "{} {}  {}  owner {}",
                            tag(a.status),
                            a.entry.id,
                            a.entry.display_name.bold(),
                            a.entry.owner_identity
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        }
        Command::Shared => {
            let grants = access::list_shared_by_owner(&store, &me)?;
            emit(fmt, "shared", json!({ "grants": to_json(&grants)? }), || {
                grants
                    .iter()
                    .map(|g| {
                        format!(
                            "{}  {}  approved {}",
                            g.display_name.bold(),
                            g.requester_identity,
                            g.resolved_at
                                .map(time::format_epoch_ms)
                                .unwrap_or_default()
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        }
        Command::Open { location } => {
            let logged = audit::log_open(&store, &location, &me)?;
            emit(fmt, "open", json!({ "log": to_json(&logged)? }), || {
                format!("opened {} as {}", logged.location_snapshot, logged.origin)
            });
        }
        Command::Opens { location } => {
            let opens = audit::list_opens(&store, &location, &me)?;
            emit(fmt, "opens", json!({ "opens": to_json(&opens)? }), || {
                opens
                    .iter()
                    .map(|o| {
                        format!(
                            "{}  {}  {}",
                            time::format_epoch_ms(o.opened_at),
                            o.opener_identity.bold(),
                            o.origin
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        }
        Command::Count { location } => {
            let count = permissions::pending_count_for(&store, &location, &me)?;
            emit(fmt, "count", json!({ "pending": count }), || count.to_string());
        }
        Command::IsOwner { location } => {
            let owner = permissions::is_owner(&store, &location, &me)?;
            emit(fmt, "is-owner", json!({ "owner": owner }), || owner.to_string());
        }
    }
    Ok(())
}
