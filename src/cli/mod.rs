//! Command-line interface definitions for the `weir` binary.
//!
//! The binary is a manual stand-in for a provisioning host: it reads
//! desired and observed state from JSON files, drives one reconciler
//! operation, and prints the resulting state as JSON.

use clap::{Parser, ValueEnum};

/// Top-level CLI for the `weir` binary.
#[derive(Debug, Parser)]
#[command(
    name = "weir",
    about = "Reconcile Webflow sites, redirects, and robots.txt",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Create an object, or preview it with `--dry-run`.
    #[command(name = "create", about = "Create an object from desired state")]
    Create(CreateCommand),
    /// Refresh observed state for a handle.
    #[command(name = "read", about = "Read the current state of an object")]
    Read(ReadCommand),
    /// Patch an object in place, or preview the patch with `--dry-run`.
    #[command(name = "update", about = "Update an object in place")]
    Update(UpdateCommand),
    /// Delete the object behind a handle.
    #[command(name = "delete", about = "Delete an object")]
    Delete(DeleteCommand),
    /// Compare observed state with desired state without contacting Webflow.
    #[command(name = "diff", about = "Show what an update would change")]
    Diff(DiffCommand),
}

impl Cli {
    /// Resource kind the command targets.
    pub(crate) const fn kind(&self) -> KindArg {
        match self {
            Self::Create(cmd) => cmd.kind,
            Self::Read(cmd) => cmd.kind,
            Self::Update(cmd) => cmd.kind,
            Self::Delete(cmd) => cmd.kind,
            Self::Diff(cmd) => cmd.kind,
        }
    }
}

/// Resource kinds accepted on the command line.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum KindArg {
    /// A Webflow site.
    Site,
    /// A URL redirect rule.
    Redirect,
    /// A site's robots.txt.
    RobotsTxt,
}

/// Arguments for `weir create`.
#[derive(Debug, Parser)]
pub(crate) struct CreateCommand {
    /// Resource kind.
    #[arg(value_enum)]
    pub(crate) kind: KindArg,
    /// JSON file holding the desired state.
    #[arg(long, value_name = "PATH")]
    pub(crate) desired: String,
    /// Validate and preview without contacting Webflow.
    #[arg(long)]
    pub(crate) dry_run: bool,
}

/// Arguments for `weir read`.
#[derive(Debug, Parser)]
pub(crate) struct ReadCommand {
    /// Resource kind.
    #[arg(value_enum)]
    pub(crate) kind: KindArg,
    /// Handle returned by a previous create.
    #[arg(long)]
    pub(crate) handle: String,
    /// JSON file holding the last persisted state, for fields Webflow does
    /// not report.
    #[arg(long, value_name = "PATH")]
    pub(crate) prior: Option<String>,
}

/// Arguments for `weir update`.
#[derive(Debug, Parser)]
pub(crate) struct UpdateCommand {
    /// Resource kind.
    #[arg(value_enum)]
    pub(crate) kind: KindArg,
    /// Handle returned by a previous create.
    #[arg(long)]
    pub(crate) handle: String,
    /// JSON file holding the desired state.
    #[arg(long, value_name = "PATH")]
    pub(crate) desired: String,
    /// JSON file holding the last persisted state.
    #[arg(long, value_name = "PATH")]
    pub(crate) observed: String,
    /// Validate and preview without contacting Webflow.
    #[arg(long)]
    pub(crate) dry_run: bool,
}

/// Arguments for `weir delete`.
#[derive(Debug, Parser)]
pub(crate) struct DeleteCommand {
    /// Resource kind.
    #[arg(value_enum)]
    pub(crate) kind: KindArg,
    /// Handle returned by a previous create.
    #[arg(long)]
    pub(crate) handle: String,
}

/// Arguments for `weir diff`.
#[derive(Debug, Parser)]
pub(crate) struct DiffCommand {
    /// Resource kind.
    #[arg(value_enum)]
    pub(crate) kind: KindArg,
    /// JSON file holding the desired state.
    #[arg(long, value_name = "PATH")]
    pub(crate) desired: String,
    /// JSON file holding the last persisted state.
    #[arg(long, value_name = "PATH")]
    pub(crate) observed: String,
}
