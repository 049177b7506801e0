use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crate::logic::backup::BackupStrategy;
use crate::logic::restore::RestoreStrategy;

/// herdpress - local WordPress sites on Laravel Herd
#[derive(Parser, Debug)]
#[command(name = "herdpress")]
#[command(about = "Create, delete, back up and restore local WordPress sites served by Laravel Herd")]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Dry-run mode: print the commands instead of running them.
    ///
    /// Available for `delete` and `backup`. File removals are skipped too;
    /// `create` and `restore` refuse to run.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// More log output (-v for debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Without a command an interactive menu is shown
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new site
    Create {
        /// Site name (asked for when missing)
        #[arg(long)]
        name: Option<String>,
        /// Theme slug to install; the first is activated (repeatable)
        #[arg(long = "theme")]
        themes: Vec<String>,
        /// Plugin slug to install and activate (repeatable)
        #[arg(long = "plugin")]
        plugins: Vec<String>,
        /// Apply the baseline commands
        #[arg(long, conflicts_with = "no_baseline")]
        baseline: bool,
        /// Skip the baseline commands
        #[arg(long)]
        no_baseline: bool,
    },
    /// Delete sites (database and directory)
    Delete {
        /// Site directory names
        sites: Vec<String>,
        /// Selection over `herdpress list` numbering, e.g. "1-3,5" or "0" for all
        #[arg(long)]
        select: Option<String>,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Back up sites
    Backup {
        /// full or plugin (asked for when missing)
        #[arg(long)]
        strategy: Option<BackupStrategy>,
        /// Site directory names
        sites: Vec<String>,
        /// Selection over `herdpress list` numbering
        #[arg(long)]
        select: Option<String>,
    },
    /// Restore a backup into a new site
    Restore {
        /// full, content, plugin or installer (asked for when missing)
        strategy: Option<RestoreStrategy>,
        /// Name of the new site
        #[arg(long)]
        name: Option<String>,
        /// Archive, container file or wp-content folder
        #[arg(long)]
        source: Option<PathBuf>,
        /// SQL file (content strategy)
        #[arg(long)]
        sql: Option<PathBuf>,
        #[arg(long)]
        admin_user: Option<String>,
        #[arg(long)]
        admin_password: Option<String>,
        #[arg(long)]
        admin_email: Option<String>,
    },
    /// List installed sites with their selection numbers
    List,
    /// Show WordPress version, theme and plugins of a site
    Info {
        site: String,
    },
    /// Write a default configuration file
    InitConfig {
        /// Target path (defaults to the platform config directory)
        path: Option<PathBuf>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
