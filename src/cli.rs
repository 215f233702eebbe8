use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use lifecycle::Visibility;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ghm")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(
    about = "Back up, archive, delete and restore your GitHub repositories from signed plans",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Select repositories and write a signed plan
    Plan(PlanArgs),

    /// Show a plan, its signature verdict and an optional manifest
    Inspect(InspectArgs),

    /// Back up and delete every repository in a plan
    Execute(ExecuteArgs),

    /// Back up every repository in a plan and publish bundles to the archive repository
    Backup(BackupArgs),

    /// Restore a repository from a backup root
    Restore(RestoreArgs),

    /// Delete a single repository after typing its name
    Delete(DeleteArgs),

    /// Check that gh and git are installed and authenticated
    Doctor,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Plan
// ============================================================================

#[derive(Args)]
pub struct PlanArgs {
    /// Owner whose repositories are listed (defaults to the authenticated user)
    #[arg(long)]
    pub owner: Option<String>,

    /// Output file (default: ./deletion-plan-YYYYMMDD-HHMMSS.json)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Select a repository by full name (repeatable)
    #[arg(long = "repo", value_name = "OWNER/NAME")]
    pub repos: Vec<String>,

    /// Select every listed repository
    #[arg(long, conflicts_with = "repos")]
    pub all: bool,

    /// Only consider repositories whose full name matches this regex
    #[arg(long = "match", value_name = "REGEX")]
    pub pattern: Option<String>,

    /// Leave forks out
    #[arg(long)]
    pub skip_forks: bool,

    /// Leave archived repositories out
    #[arg(long)]
    pub skip_archived: bool,
}

// ============================================================================
// Inspect
// ============================================================================

#[derive(Args)]
pub struct InspectArgs {
    /// Plan file
    #[arg(short, long)]
    pub plan: PathBuf,

    /// Execution manifest to summarize
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,
}

// ============================================================================
// Execute / Backup
// ============================================================================

#[derive(Args)]
pub struct RunArgs {
    /// Plan file
    #[arg(short, long)]
    pub plan: PathBuf,

    /// Directory to use as the backup root (overrides config and lookup)
    #[arg(long, value_name = "DIR")]
    pub backup_location: Option<PathBuf>,

    /// Always start a fresh backup root
    #[arg(long)]
    pub no_resume: bool,

    /// Print what would happen without touching anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct ExecuteArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Delete attempts per repository
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,
}

#[derive(Args)]
pub struct BackupArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Archive repository (default: <you>/ghm-archive)
    #[arg(long, value_name = "OWNER/NAME")]
    pub archive_repo: Option<String>,

    /// Archive branch
    #[arg(long, value_name = "BRANCH")]
    pub archive_branch: Option<String>,

    /// Visibility used when the archive repository has to be created
    #[arg(long, value_enum)]
    pub archive_visibility: Option<VisibilityArg>,

    /// Keep bundles local, publish nothing
    #[arg(long)]
    pub no_archive: bool,
}

// ============================================================================
// Restore / Delete
// ============================================================================

#[derive(Args)]
pub struct RestoreArgs {
    /// Backup root to restore from
    #[arg(long, value_name = "DIR")]
    pub archive_root: PathBuf,

    /// List restorable repositories
    #[arg(long, conflicts_with = "repo")]
    pub list: bool,

    /// Repository to restore, as recorded in the backup root
    #[arg(long, value_name = "OWNER/NAME", required_unless_present = "list")]
    pub repo: Option<String>,

    /// Owner of the new repository (default: original owner)
    #[arg(long)]
    pub target_owner: Option<String>,

    /// Name of the new repository (default: original name)
    #[arg(long)]
    pub target_name: Option<String>,

    /// Visibility of the new repository
    #[arg(long, value_enum, default_value = "private")]
    pub visibility: VisibilityArg,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Repository to delete
    #[arg(long, value_name = "OWNER/NAME")]
    pub repo: String,

    /// Skip the typed confirmation
    #[arg(long)]
    pub force: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum VisibilityArg {
    Private,
    Public,
}

impl From<VisibilityArg> for Visibility {
    fn from(arg: VisibilityArg) -> Self {
        match arg {
            VisibilityArg::Private => Self::Private,
            VisibilityArg::Public => Self::Public,
        }
    }
}
