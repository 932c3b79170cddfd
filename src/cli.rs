use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "homestead")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative environment manager for packages and dotfiles", long_about = None)]
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
    /// Show desired vs actual state for packages and dotfiles
    Status(StatusArgs),

    /// Install missing packages and deploy missing or drifted dotfiles
    Apply(ApplyArgs),

    /// Install packages and record them in the lock file
    Install(InstallArgs),

    /// Uninstall packages and remove them from the lock file
    Uninstall(UninstallArgs),

    /// Upgrade locked packages
    Upgrade(UpgradeArgs),

    /// Show details about a package
    Info(InfoArgs),

    /// Search package managers for a package
    Search(SearchArgs),

    /// Run health checks on configuration and package managers
    Doctor,

    /// List known package managers
    Managers,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Default)]
pub struct ScopeArgs {
    /// Only packages
    #[arg(long, conflicts_with = "dotfiles")]
    pub packages: bool,

    /// Only dotfiles
    #[arg(long)]
    pub dotfiles: bool,
}

#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Only show missing items
    #[arg(long, conflicts_with = "untracked")]
    pub missing: bool,

    /// Only show untracked items
    #[arg(long)]
    pub untracked: bool,

    /// Print reconciliation results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Default)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Show what would change without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Default)]
pub struct InstallArgs {
    /// Packages as `[manager:]name` (e.g. `brew:ripgrep`, `npm:@angular/cli`)
    #[arg(required = true)]
    pub packages: Vec<String>,

    /// Show what would be installed
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Default)]
pub struct UninstallArgs {
    /// Packages as `[manager:]name`
    #[arg(required = true)]
    pub packages: Vec<String>,

    /// Show what would be uninstalled
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Default)]
pub struct UpgradeArgs {
    /// Packages as `[manager:]name`, or `manager:` for all of a manager's
    /// locked packages. Empty means every locked package.
    pub packages: Vec<String>,

    /// Use each manager's upgrade-everything command instead of upgrading
    /// locked packages one by one
    #[arg(long)]
    pub all: bool,

    /// Show what would be upgraded
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Default)]
pub struct InfoArgs {
    /// Package as `[manager:]name`
    pub package: String,
}

#[derive(Args, Debug, Default)]
pub struct SearchArgs {
    /// Search query
    pub query: String,

    /// Only search this manager
    #[arg(short, long)]
    pub manager: Option<String>,
}
