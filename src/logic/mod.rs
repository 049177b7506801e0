//! Lifecycle orchestrations.
//!
//! Each workflow composes the facades in a fixed sequence and stops at the
//! first unrecoverable failure.
//!
//! # Modules
//!
//! - `provision`: create a site end to end
//! - `delete`: drop databases and remove site directories, per site
//! - `backup`: full-source and plugin-assisted backups
//! - `restore`: the four restore strategies
//! - `converge`: steps every restore ends with (prefix, admin, URLs, flush)

pub mod backup;
pub mod converge;
pub mod delete;
pub mod provision;
pub mod restore;

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::thread;

use tracing::{info, warn};

use crate::archive::Archiver;
use crate::command_runner::CommandRunner;
use crate::config::Config;
use crate::database::Database;
use crate::error::{HerdpressError, Result};
use crate::herd::Herd;
use crate::platform::{Layout, ToolPaths};
use crate::prompt::Prompter;
use crate::registry::SiteRegistry;
use crate::site::{AdminCredentials, Site};
use crate::tools::mysql::MysqlConnection;
use crate::wp_cli::WpCli;

// ============================================================================
// Toolbox
// ============================================================================

/// Everything a workflow drives, built once per run.
pub struct Toolbox<'a> {
    pub config: &'a Config,
    pub layout: &'a Layout,
    pub registry: SiteRegistry,
    pub db: Database<'a>,
    pub wp: WpCli<'a>,
    pub archiver: Archiver<'a>,
    pub herd: Herd<'a>,
    pub prompter: &'a dyn Prompter,
    /// Commands are only printed; skip file removals and artifact checks
    pub dry_run: bool,
}

impl<'a> Toolbox<'a> {
    pub fn new(
        config: &'a Config,
        layout: &'a Layout,
        tools: &'a ToolPaths,
        runner: &'a dyn CommandRunner,
        prompter: &'a dyn Prompter,
    ) -> Self {
        Self {
            config,
            layout,
            registry: SiteRegistry::new(layout.sites.clone()),
            db: Database::new(
                runner,
                &tools.mysql,
                &tools.mysqldump,
                MysqlConnection::from(&config.database),
            ),
            wp: WpCli::new(runner, &tools.wp),
            archiver: Archiver::new(runner, &tools.seven_zip, &tools.tar),
            herd: Herd::new(runner, &tools.herd, &tools.opener, &tools.opener_prefix),
            prompter,
            dry_run: false,
        }
    }

    /// Refuse workflows that cannot be previewed.
    pub fn refuse_dry_run(&self, workflow: &str) -> Result<()> {
        if self.dry_run {
            return Err(HerdpressError::validation(format!(
                "{} builds a site from tool output and cannot run with --dry-run",
                workflow
            )));
        }
        Ok(())
    }

    /// Database reachable and Herd running.
    pub fn check_services(&self) -> Result<()> {
        self.db.ping()?;
        self.herd.ensure_running()
    }

    /// A new site whose name is free on disk and in the database server.
    pub fn claim_site(&self, raw_name: &str, admin: AdminCredentials) -> Result<Site> {
        let site = Site::new(raw_name, self.registry.root(), admin)?;
        self.ensure_free(&site)?;
        Ok(site)
    }

    /// Advisory: checked right before acting, not held.
    pub fn ensure_free(&self, site: &Site) -> Result<()> {
        if self.registry.exists(&site.name) || self.db.exists(&site.database)? {
            return Err(HerdpressError::NameCollision {
                name: site.name.clone(),
            });
        }
        Ok(())
    }

    /// An installed site, by directory name.
    ///
    /// Only entries of the registry listing qualify; paths that would leave
    /// the sites root are rejected before anything is touched.
    pub fn existing_site(&self, dir_name: &str) -> Result<Site> {
        let mut components = Path::new(dir_name).components();
        let single = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single {
            return Err(HerdpressError::validation(format!(
                "'{}' is not a site directory name",
                dir_name
            )));
        }
        if !self.registry.list_sites()?.iter().any(|name| name == dir_name) {
            return Err(HerdpressError::validation(format!(
                "no site named '{}' under {}",
                dir_name,
                self.registry.root().display()
            )));
        }
        Ok(Site::existing(
            dir_name,
            self.registry.root(),
            self.config.admin.clone(),
        ))
    }
}

// ============================================================================
// Rollback
// ============================================================================

/// What a workflow created so far, undone when a later step fails.
#[derive(Debug, Default)]
pub struct Rollback {
    enabled: bool,
    dir: Option<PathBuf>,
    database: Option<String>,
}

impl Rollback {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    /// Create `path` and remember it for removal.
    pub fn create_dir(&mut self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.dir = Some(path.to_path_buf());
        Ok(())
    }

    /// Create `name` and remember it for dropping.
    pub fn create_database(&mut self, db: &Database<'_>, name: &str) -> Result<()> {
        db.create(name)?;
        self.database = Some(name.to_string());
        Ok(())
    }

    /// Keep everything from here on, whatever happens next.
    pub fn disarm(&mut self) {
        self.enabled = false;
    }

    /// Best effort: failures are logged and never replace the original error.
    fn undo(&self, db: &Database<'_>, cause: &HerdpressError) {
        if !self.enabled {
            return;
        }
        warn!("Rolling back after failure: {}", cause);
        if let Some(ref name) = self.database {
            if let Err(e) = db.drop(name) {
                warn!("Rollback could not drop database {}: {}", name, e);
            }
        }
        if let Some(ref dir) = self.dir {
            if dir.exists() {
                match fs::remove_dir_all(dir) {
                    Ok(()) => info!("Removed {}", dir.display()),
                    Err(e) => warn!("Rollback could not remove {}: {}", dir.display(), e),
                }
            }
        }
    }
}

/// Run `body`, rolling back what it created if it fails.
pub fn guarded<T, F>(tb: &Toolbox<'_>, body: F) -> Result<T>
where
    F: FnOnce(&mut Rollback) -> Result<T>,
{
    let mut rollback = Rollback::new(tb.config.rollback_on_failure);
    let result = body(&mut rollback);
    if let Err(ref e) = result {
        rollback.undo(&tb.db, e);
    }
    result
}

// ============================================================================
// Fan-out
// ============================================================================

/// An independent update in a fan-out.
pub type Task<'s> = Box<dyn FnOnce() -> Result<()> + Send + 's>;

/// Run independent updates concurrently and wait for all of them.
///
/// Every task runs to completion; the first error (in task order) is
/// returned and later ones are logged.
pub fn fan_out(tasks: Vec<Task<'_>>) -> Result<()> {
    thread::scope(|scope| {
        let handles: Vec<_> = tasks.into_iter().map(|task| scope.spawn(task)).collect();

        let mut first = None;
        for handle in handles {
            let result = handle
                .join()
                .unwrap_or_else(|_| Err(HerdpressError::partial_state("update thread panicked")));
            if let Err(e) = result {
                if first.is_none() {
                    first = Some(e);
                } else {
                    warn!("Concurrent update also failed: {}", e);
                }
            }
        }
        first.map_or(Ok(()), Err)
    })
}
