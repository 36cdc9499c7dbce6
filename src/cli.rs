//! CLI struct definitions for the sharestore command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `lib.rs`.

use crate::plugins::access::Decision;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "sharestore",
    version = env!("CARGO_PKG_VERSION"),
    about = "Per-user store catalog with owner-approved sharing and an open audit trail."
)]
pub(crate) struct Cli {
    /// Catalog root directory (falls back to $SHARESTORE_ROOT).
    #[clap(long, global = true)]
    pub root: Option<PathBuf>,
    /// Acting identity (falls back to $SHARESTORE_IDENTITY, then the session user).
    #[clap(long, global = true)]
    pub identity: Option<String>,
    /// Output format.
    #[clap(long, global = true, value_enum, default_value = "json")]
    pub format: OutputFormat,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Print the location this identity should open (provisions one if needed).
    Resolve,
    /// Create a named instance in this identity's namespace.
    Create {
        #[clap(long)]
        name: String,
        #[clap(long, default_value = "")]
        objective: String,
        #[clap(long, default_value = "")]
        notes: String,
    },
    /// Register a location owned by this identity, or bump its last access.
    Touch {
        location: String,
        #[clap(long)]
        name: Option<String>,
        #[clap(long, default_value = "")]
        objective: String,
        #[clap(long, default_value = "")]
        notes: String,
    },
    /// List active instances owned by this identity.
    Owned,
    /// Soft-delete an owned instance.
    Delete { location: String },
    /// Ask the owner of an entry for access.
    Request { entry_id: String },
    /// List pending requests on this identity's instances.
    Pending,
    /// Approve or reject a pending request.
    Decide {
        request_id: String,
        #[clap(value_enum)]
        decision: Decision,
    },
    /// Withdraw a previously approved access.
    Revoke {
        entry_id: String,
        #[clap(long)]
        requester: String,
    },
    /// List instances owned by others with this identity's request state.
    Available,
    /// List approvals granted on this identity's instances.
    Shared,
    /// Record an open of a registered location.
    Open { location: String },
    /// Show the open history of an owned instance.
    Opens { location: String },
    /// Pending request count for a location (0 unless you own it).
    Count { location: String },
    /// Whether this identity owns a location.
    IsOwner { location: String },
}
