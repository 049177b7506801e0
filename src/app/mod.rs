//! Application module
//!
//! Wires the configuration, platform, tools and package resolver together
//! once per run and dispatches one command. Missing command arguments are
//! asked for interactively; with no command at all the main menu picks one.
//!
//! # Module Structure
//! - `state` - Menu entries and run outcomes
//! - Main module - wiring and the dispatcher

mod state;

pub use state::{MenuAction, Outcome};

use std::path::{Path, PathBuf};

use anyhow::Context;
use strum::IntoEnumIterator;
use tracing::{debug, info};

use crate::cli::{Cli, Commands};
use crate::command_runner::{CommandRunner, RecordingRunner, SystemRunner};
use crate::config::{Config, PackageRef};
use crate::error::{BatchReport, HerdpressError, Result};
use crate::logic::Toolbox;
use crate::logic::backup::{BackupStrategy, backup_websites};
use crate::logic::delete::delete_websites;
use crate::logic::provision::{ProvisionPlan, create_website};
use crate::logic::restore::{
    RestoreJob, RestoreStrategy, restore_website, validate_content_dir,
};
use crate::packages::PackageResolver;
use crate::packages::cache::DownloadCache;
use crate::packages::catalog::{HttpCatalog, HttpDownloader};
use crate::platform::{self, Layout, ToolPaths};
use crate::prompt::{Prompter, TerminalPrompter, ask_optional_selection, ask_selection, ask_until};
use crate::sanity::run_preflight_checks;
use crate::site::AdminCredentials;
use crate::tools::wp::PackageKind;

/// Tools each command drives.
const CREATE_TOOLS: &[&str] = &["wp", "mysql", "7z", "herd"];
const DELETE_TOOLS: &[&str] = &["mysql"];
const BACKUP_TOOLS: &[&str] = &["wp", "mysql", "mysqldump", "7z"];
const RESTORE_TOOLS: &[&str] = &["wp", "mysql", "7z", "herd"];
const INFO_TOOLS: &[&str] = &["wp"];

/// Load everything, run one command.
pub fn run(cli: Cli) -> anyhow::Result<Outcome> {
    let config_path = cli.config.clone().unwrap_or_else(platform::default_config_path);
    if let Some(Commands::InitConfig { path }) = cli.command {
        init_config(&path.unwrap_or(config_path))?;
        return Ok(Outcome::Done);
    }

    let config = Config::load_or_default(&config_path)?;
    config.validate().context("Invalid configuration")?;

    let platform = platform::detect();
    let layout = Layout::resolve(&config, platform.as_ref())?;
    let tools = ToolPaths::discover(&layout.herd_bin, platform.as_ref());
    info!(
        "herdpress {} on {}, sites in {}",
        env!("CARGO_PKG_VERSION"),
        platform.name(),
        layout.sites.display()
    );

    let runner: Box<dyn CommandRunner> = if cli.dry_run {
        println!("Dry-run mode: commands are printed, not executed");
        Box::new(RecordingRunner::dry_run())
    } else {
        Box::new(SystemRunner)
    };
    let prompter = TerminalPrompter;
    let catalog = HttpCatalog::new(config.catalog.clone())?;
    let downloader = HttpDownloader::new()?;
    let cache = DownloadCache::open(&layout.cache)?;

    let mut tb = Toolbox::new(&config, &layout, &tools, runner.as_ref(), &prompter);
    tb.dry_run = cli.dry_run;
    let mut app = App {
        tb,
        resolver: PackageResolver::new(&catalog, &downloader, cache),
        tools: &tools,
    };

    let command = match cli.command {
        Some(command) => command,
        None => match app.menu()? {
            Some(command) => command,
            None => return Ok(Outcome::Done),
        },
    };
    Ok(app.dispatch(command)?)
}

/// Write the default configuration, refusing to overwrite.
fn init_config(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    Config::default().save_to_file(path)?;
    println!("✓ Default configuration written to {}", path.display());
    Ok(())
}

/// One run: the toolbox, the package resolver and the resolved tools.
pub struct App<'a> {
    pub tb: Toolbox<'a>,
    pub resolver: PackageResolver<'a>,
    pub tools: &'a ToolPaths,
}

impl<'a> App<'a> {
    fn preflight(&self, labels: &[&str]) -> Result<()> {
        if self.tb.dry_run {
            debug!("Dry run: skipping pre-flight checks");
            return Ok(());
        }
        run_preflight_checks(self.tools, labels)
    }

    fn prompter(&self) -> &'a dyn Prompter {
        self.tb.prompter
    }

    /// Main menu; `None` means quit.
    pub fn menu(&self) -> Result<Option<Commands>> {
        let actions: Vec<MenuAction> = MenuAction::iter().collect();
        let labels: Vec<String> = actions.iter().map(|a| a.to_string()).collect();
        let index = self.prompter().select("What do you want to do?", &labels)?;

        let command = match actions.get(index).copied().unwrap_or(MenuAction::Quit) {
            MenuAction::Create => Commands::Create {
                name: None,
                themes: Vec::new(),
                plugins: Vec::new(),
                baseline: false,
                no_baseline: false,
            },
            MenuAction::Delete => Commands::Delete {
                sites: Vec::new(),
                select: None,
                yes: false,
            },
            MenuAction::Backup => Commands::Backup {
                strategy: None,
                sites: Vec::new(),
                select: None,
            },
            MenuAction::Restore => Commands::Restore {
                strategy: None,
                name: None,
                source: None,
                sql: None,
                admin_user: None,
                admin_password: None,
                admin_email: None,
            },
            MenuAction::List => Commands::List,
            MenuAction::Quit => return Ok(None),
        };
        Ok(Some(command))
    }

    pub fn dispatch(&mut self, command: Commands) -> Result<Outcome> {
        match command {
            Commands::Create {
                name,
                themes,
                plugins,
                baseline,
                no_baseline,
            } => {
                self.preflight(CREATE_TOOLS)?;
                self.create(name, themes, plugins, baseline, no_baseline)?;
                Ok(Outcome::Done)
            }
            Commands::Delete { sites, select, yes } => {
                self.preflight(DELETE_TOOLS)?;
                self.delete(sites, select, yes)
            }
            Commands::Backup {
                strategy,
                sites,
                select,
            } => {
                self.preflight(BACKUP_TOOLS)?;
                self.backup(strategy, sites, select)
            }
            Commands::Restore {
                strategy,
                name,
                source,
                sql,
                admin_user,
                admin_password,
                admin_email,
            } => {
                self.preflight(RESTORE_TOOLS)?;
                let admin = AdminCredentials {
                    username: admin_user.unwrap_or_else(|| self.tb.config.admin.username.clone()),
                    password: admin_password
                        .unwrap_or_else(|| self.tb.config.admin.password.clone()),
                    email: admin_email.unwrap_or_else(|| self.tb.config.admin.email.clone()),
                };
                self.restore(strategy, name, source, sql, admin)?;
                Ok(Outcome::Done)
            }
            Commands::List => {
                self.list()?;
                Ok(Outcome::Done)
            }
            Commands::Info { site } => {
                self.preflight(INFO_TOOLS)?;
                self.info(&site)?;
                Ok(Outcome::Done)
            }
            Commands::InitConfig { path } => {
                let path = path.unwrap_or_else(platform::default_config_path);
                init_config(&path).map_err(|e| HerdpressError::config(e.to_string()))?;
                Ok(Outcome::Done)
            }
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    fn create(
        &mut self,
        name: Option<String>,
        themes: Vec<String>,
        plugins: Vec<String>,
        baseline: bool,
        no_baseline: bool,
    ) -> Result<()> {
        self.tb.refuse_dry_run("create")?;
        self.tb.check_services()?;

        let tb = &self.tb;
        let admin = tb.config.admin.clone();
        let interactive = name.is_none();
        let site = match name {
            Some(name) => tb.claim_site(&name, admin)?,
            None => ask_until(tb.prompter, "Site name", None, |raw| {
                tb.claim_site(raw, admin.clone())
            })?,
        };

        let themes = if interactive && themes.is_empty() {
            choose_packages(
                tb.prompter,
                "Themes (empty for the default theme):",
                &tb.config.themes,
            )?
        } else {
            themes
        };
        let plugins = if interactive && plugins.is_empty() {
            choose_packages(tb.prompter, "Plugins:", &tb.config.plugins)?
        } else {
            plugins
        };
        let default_baseline = tb.config.apply_baseline_by_default;
        let apply_baseline = if baseline {
            true
        } else if no_baseline {
            false
        } else if interactive {
            tb.prompter
                .confirm("Apply the baseline settings?", default_baseline)?
        } else {
            default_baseline
        };

        let plan = ProvisionPlan {
            themes,
            plugins,
            apply_baseline,
        };
        create_website(&self.tb, &mut self.resolver, site, &plan)?;
        Ok(())
    }

    fn delete(&mut self, sites: Vec<String>, select: Option<String>, yes: bool) -> Result<Outcome> {
        let names = self.pick_sites(sites, select, "Sites to delete:")?;
        if names.is_empty() {
            println!("No sites selected");
            return Ok(Outcome::Done);
        }

        if !yes && !self.tb.dry_run {
            let question = format!(
                "Delete {} ({} site(s))? Databases and files are removed for good",
                names.join(", "),
                names.len()
            );
            if !self.prompter().confirm(&question, false)? {
                println!("Nothing deleted");
                return Ok(Outcome::Done);
            }
        }

        let report = delete_websites(&self.tb, &names)?;
        print_report("Delete", &report);
        Ok(Outcome::Batch(report))
    }

    fn backup(
        &mut self,
        strategy: Option<BackupStrategy>,
        sites: Vec<String>,
        select: Option<String>,
    ) -> Result<Outcome> {
        let strategy = match strategy {
            Some(strategy) => strategy,
            None => self.choose("Backup strategy", BackupStrategy::iter(), |s| {
                match s {
                    BackupStrategy::Full => "Full (files + database dump)".to_string(),
                    BackupStrategy::Plugin => "Backup plugin container".to_string(),
                }
            })?,
        };
        let names = self.pick_sites(sites, select, "Sites to back up:")?;
        if names.is_empty() {
            println!("No sites selected");
            return Ok(Outcome::Done);
        }

        let report = backup_websites(&self.tb, &mut self.resolver, &names, strategy)?;
        print_report("Backup", &report);
        Ok(Outcome::Batch(report))
    }

    fn restore(
        &mut self,
        strategy: Option<RestoreStrategy>,
        name: Option<String>,
        source: Option<PathBuf>,
        sql: Option<PathBuf>,
        admin: AdminCredentials,
    ) -> Result<()> {
        self.tb.refuse_dry_run("restore")?;
        self.tb.check_services()?;

        let strategy = match strategy {
            Some(strategy) => strategy,
            None => self.choose("Restore from", RestoreStrategy::iter(), |s| {
                s.describe().to_string()
            })?,
        };

        let tb = &self.tb;
        let site = match name {
            Some(name) => tb.claim_site(&name, admin)?,
            None => ask_until(tb.prompter, "New site name", None, |raw| {
                tb.claim_site(raw, admin.clone())
            })?,
        };
        let source = match source {
            Some(source) => source,
            None => ask_until(tb.prompter, "Backup to restore (path)", None, |answer| {
                let path = PathBuf::from(answer);
                match strategy {
                    RestoreStrategy::Content => validate_content_dir(&path)?,
                    _ if !path.is_file() => {
                        return Err(HerdpressError::validation(format!(
                            "{} is not a file",
                            path.display()
                        )));
                    }
                    _ => {}
                }
                Ok(path)
            })?,
        };

        let job = RestoreJob {
            site,
            strategy,
            source,
            sql,
        };
        restore_website(&self.tb, &mut self.resolver, job)?;
        Ok(())
    }

    fn list(&self) -> Result<()> {
        let names = self.tb.registry.list_sites()?;
        if names.is_empty() {
            println!("No sites in {}", self.tb.registry.root().display());
            return Ok(());
        }
        for (i, name) in names.iter().enumerate() {
            println!("  {:>3}. {}", i + 1, name);
        }
        Ok(())
    }

    fn info(&self, name: &str) -> Result<()> {
        let tb = &self.tb;
        let site = tb.existing_site(name)?;
        let version = tb.wp.core_version(&site.path)?;
        let themes = tb.wp.list(&site.path, PackageKind::Theme, Some("active"))?;
        let plugins = tb.wp.list(&site.path, PackageKind::Plugin, Some("active"))?;

        println!("{}", site.name);
        println!("  Path:      {}", site.path.display());
        println!("  URL:       {}", site.url(&tb.config.tld));
        println!("  Database:  {}", site.database);
        println!("  WordPress: {}", version);
        println!("  Theme:     {}", themes.join(", "));
        println!("  Plugins:   {}", plugins.join(", "));
        Ok(())
    }

    // ========================================================================
    // Interactive helpers
    // ========================================================================

    /// Sites named on the command line, by selection string, or asked for.
    fn pick_sites(
        &self,
        sites: Vec<String>,
        select: Option<String>,
        title: &str,
    ) -> Result<Vec<String>> {
        if !sites.is_empty() {
            return Ok(sites);
        }
        if let Some(select) = select {
            return self.tb.registry.select(&select);
        }

        let all = self.tb.registry.list_sites()?;
        if all.is_empty() {
            return Ok(Vec::new());
        }
        let picked = ask_selection(self.prompter(), title, &all)?;
        Ok(picked.into_iter().map(|i| all[i - 1].clone()).collect())
    }

    fn choose<T, I, F>(&self, prompt: &str, options: I, label: F) -> Result<T>
    where
        T: Copy,
        I: Iterator<Item = T>,
        F: Fn(T) -> String,
    {
        let options: Vec<T> = options.collect();
        let labels: Vec<String> = options.iter().map(|o| label(*o)).collect();
        let index = self.prompter().select(prompt, &labels)?;
        options
            .get(index)
            .copied()
            .ok_or_else(|| HerdpressError::validation(format!("no option {}", index)))
    }
}

/// Offer the configured packages; returns the chosen slugs.
fn choose_packages(
    prompter: &dyn Prompter,
    title: &str,
    packages: &[PackageRef],
) -> Result<Vec<String>> {
    let items: Vec<String> = packages
        .iter()
        .map(|p| format!("{} ({})", p.name, p.slug))
        .collect();
    let picked = ask_optional_selection(prompter, title, &items)?;
    Ok(picked
        .into_iter()
        .map(|i| packages[i - 1].slug.clone())
        .collect())
}

fn print_report(what: &str, report: &BatchReport) {
    if report.is_clean() {
        println!("✓ {}: {}", what, report);
    } else {
        eprintln!("✗ {}: {}", what, report);
    }
}
