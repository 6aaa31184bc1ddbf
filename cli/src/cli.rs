use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use guardian_kernel::catalog::OsType;

/// Guardian hardening CLI
#[derive(Parser, Debug)]
#[command(name = "guardian")]
#[command(about = "Security policy management with a revertible commit history", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the policy commit ledger
    #[arg(long, global = true, env = "GUARDIAN_LEDGER", default_value = "policy_stack.json")]
    pub ledger: PathBuf,

    /// Path to the policy catalog CSV
    #[arg(long, global = true, env = "GUARDIAN_CATALOG", default_value = "feature_map.csv")]
    pub catalog: PathBuf,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OsArg {
    Linux,
    Windows,
}

impl From<OsArg> for OsType {
    fn from(arg: OsArg) -> Self {
        match arg {
            OsArg::Linux => OsType::Linux,
            OsArg::Windows => OsType::Windows,
        }
    }
}

#[derive(Args, Debug)]
pub struct OsTypeArg {
    /// Operating system type
    #[arg(long = "os-type", value_enum, ignore_case = true, default_value_t = OsArg::Linux)]
    pub os_type: OsArg,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply a single security policy
    Apply(ApplyArgs),
    /// Apply every policy of a category under one commit
    ApplyBaseline(ApplyBaselineArgs),
    /// Show the full policy commit history
    History,
    /// Roll back policy commits
    #[command(subcommand)]
    Revert(RevertCommand),
    /// Show which policy groups have been applied
    AppliedGroups,
    /// List policy categories in the catalog
    Groups(OsTypeArg),
    /// Show the policies of one category
    GroupDetails(GroupDetailsArgs),
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    pub policy_id: String,
    #[command(flatten)]
    pub os: OsTypeArg,
}

#[derive(Args, Debug)]
pub struct ApplyBaselineArgs {
    pub category: String,
    #[command(flatten)]
    pub os: OsTypeArg,
}

#[derive(Args, Debug)]
pub struct GroupDetailsArgs {
    pub category: String,
    #[command(flatten)]
    pub os: OsTypeArg,
    /// Limit number of policies to display
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum RevertCommand {
    /// Remove one commit from history, leaving newer commits in place
    Commit { hash: String },
    /// Discard every commit newer than the given one
    To {
        hash: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Show the current state and recent commits
    Status,
}
