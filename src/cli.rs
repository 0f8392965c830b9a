//! Command-line argument definitions.
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Top-level CLI entry point.
#[derive(Parser, Debug)]
#[command(
    name = "bootconf",
    about = "Declarative boot-time host configuration",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one stage from configuration sources
    Run(RunOpts),
    /// Manage passwd, group, shadow and gshadow entries
    #[command(subcommand)]
    Identity(IdentityCommand),
    /// Print a shell completion script
    Completions(CompletionsOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Name used for the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Run(_) => "run",
            Self::Identity(_) => "identity",
            Self::Completions(_) => "completions",
            Self::Version => "version",
        }
    }
}

/// Options for the `run` subcommand.
#[derive(Args, Debug, Clone)]
pub struct RunOpts {
    /// Stage to run
    #[arg(short, long, default_value = "default")]
    pub stage: String,

    /// Parse every source as dot-notation text
    #[arg(short, long)]
    pub dot_notation: bool,

    /// Apply below this directory instead of `/`
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Files, directories, URLs, literal documents, or `-` for stdin
    #[arg(required = true)]
    pub sources: Vec<String>,
}

/// `identity` subcommands.
#[derive(Subcommand, Debug)]
pub enum IdentityCommand {
    /// Create or update one entry
    Apply(EntityOpts),
    /// Remove one entry
    Delete(EntityOpts),
    /// Compare entity documents against the live databases
    Compare(CompareOpts),
}

/// Options shared by `identity apply` and `identity delete`.
#[derive(Args, Debug, Clone)]
pub struct EntityOpts {
    /// Entity document: a path, or inline YAML
    pub entity: String,

    /// Database to modify (default: the kind's system file)
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Refuse to reuse a uid or gid owned by another entry
    #[arg(long)]
    pub safe: bool,
}

/// Options for `identity compare`.
#[derive(Args, Debug, Clone)]
pub struct CompareOpts {
    /// Directories of entity documents describing the desired state
    #[arg(short = 's', long = "specs", required = true)]
    pub specs: Vec<PathBuf>,

    /// passwd file to compare against
    #[arg(long)]
    pub users_file: Option<PathBuf>,

    /// group file to compare against
    #[arg(long)]
    pub groups_file: Option<PathBuf>,

    /// shadow file to compare against
    #[arg(long)]
    pub shadow_file: Option<PathBuf>,

    /// gshadow file to compare against
    #[arg(long)]
    pub gshadow_file: Option<PathBuf>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Options for the `completions` subcommand.
#[derive(Args, Debug, Clone)]
pub struct CompletionsOpts {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}
