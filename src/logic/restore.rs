//! Restore a backup into a new site.
//!
//! # Strategies
//!
//! - `full`: an archive of a whole site tree with a database dump inside
//! - `content`: a `wp-content` folder plus a separate SQL file
//! - `plugin`: the backup plugin's container file (or a zip holding one)
//! - `installer`: a package with a web installer, finished in the browser
//!
//! The first three end with [`converge`]. The installer strategy hands the
//! site to the browser and waits for the operator before resetting the admin
//! and the URLs. Everything created before a failure is rolled back, except
//! after the installer hand-off: from then on the site belongs to the
//! installer.

use std::fs;
use std::path::{Path, PathBuf};

use strum::{Display, EnumIter, EnumString};
use tracing::info;

use crate::archive::{copy_dir, find_most_recent, reroot};
use crate::error::{HerdpressError, Result};
use crate::logic::backup::ensure_backup_plugin;
use crate::logic::converge::{converge, correct_table_prefix, finish, reset_admin, rewrite_urls};
use crate::logic::provision::{fresh_install, write_config};
use crate::logic::{Toolbox, guarded};
use crate::packages::PackageResolver;
use crate::prompt::ask_until;
use crate::site::Site;
use crate::tools::wp::PackageKind;

/// Entry point present at the root of every WordPress tree.
pub const LOGIN_MARKER: &str = "wp-login.php";

/// Web installer shipped by installer-based packages.
pub const INSTALLER_MARKER: &str = "installer.php";

/// Sub-folders that make a directory a `wp-content` folder.
const CONTENT_DIRS: [&str; 2] = ["plugins", "themes"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum RestoreStrategy {
    Full,
    Content,
    Plugin,
    Installer,
}

impl RestoreStrategy {
    pub fn describe(self) -> &'static str {
        match self {
            RestoreStrategy::Full => "Full-source archive (files + SQL dump)",
            RestoreStrategy::Content => "wp-content folder + SQL file",
            RestoreStrategy::Plugin => "Backup plugin container (.wpress or zip)",
            RestoreStrategy::Installer => "Installer package (installer.php)",
        }
    }
}

/// One restore run.
#[derive(Debug, Clone)]
pub struct RestoreJob {
    /// Target site, claimed with [`Toolbox::claim_site`]
    pub site: Site,
    pub strategy: RestoreStrategy,
    /// Archive, container file or content folder
    pub source: PathBuf,
    /// SQL file for the content strategy
    pub sql: Option<PathBuf>,
}

/// A `wp-content` folder holds `plugins/` and `themes/`.
pub fn validate_content_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        return Err(HerdpressError::validation(format!(
            "{} is not a directory",
            path.display()
        )));
    }
    for sub in CONTENT_DIRS {
        if !path.join(sub).is_dir() {
            return Err(HerdpressError::validation(format!(
                "{} has no {}/ folder; expected a wp-content folder",
                path.display(),
                sub
            )));
        }
    }
    Ok(())
}

/// An existing file with extension `.sql`.
pub fn validate_sql_file(path: &Path) -> Result<PathBuf> {
    let is_sql = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("sql"));
    if !path.is_file() || !is_sql {
        return Err(HerdpressError::validation(format!(
            "{} is not an .sql file",
            path.display()
        )));
    }
    Ok(path.to_path_buf())
}

fn validate_source_file(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(HerdpressError::validation(format!(
            "{} is not a file",
            path.display()
        )));
    }
    Ok(())
}

fn ask_sql_file(tb: &Toolbox<'_>, prompt: &str) -> Result<PathBuf> {
    ask_until(tb.prompter, prompt, None, |answer| {
        validate_sql_file(Path::new(answer))
    })
}

/// Run `job` and return the restored site.
pub fn restore_website(
    tb: &Toolbox<'_>,
    resolver: &mut PackageResolver<'_>,
    job: RestoreJob,
) -> Result<Site> {
    tb.refuse_dry_run("restore")?;
    tb.check_services()?;
    tb.ensure_free(&job.site)?;

    let RestoreJob {
        mut site,
        strategy,
        source,
        sql,
    } = job;
    println!(
        "🚀 Restoring {} into {} ({})",
        source.display(),
        site.name,
        strategy
    );

    match strategy {
        RestoreStrategy::Full => {
            validate_source_file(&source)?;
            restore_full(tb, &mut site, &source)?;
        }
        RestoreStrategy::Content => {
            validate_content_dir(&source)?;
            let sql = match sql {
                Some(path) => validate_sql_file(&path)?,
                None => ask_sql_file(tb, "SQL file for this wp-content folder")?,
            };
            restore_content(tb, resolver, &mut site, &source, &sql)?;
        }
        RestoreStrategy::Plugin => {
            validate_source_file(&source)?;
            restore_with_plugin(tb, resolver, &mut site, &source)?;
        }
        RestoreStrategy::Installer => {
            validate_source_file(&source)?;
            restore_with_installer(tb, &mut site, &source)?;
        }
    }
    Ok(site)
}

/// Extract, re-root, regenerate wp-config.php, import the newest dump.
fn restore_full(tb: &Toolbox<'_>, site: &mut Site, archive: &Path) -> Result<()> {
    guarded(tb, |rb| {
        rb.create_dir(&site.path)?;
        tb.archiver.extract(archive, &site.path)?;
        reroot(&site.path, LOGIN_MARKER)?;

        let config = site.config_file();
        if config.exists() {
            fs::remove_file(&config)?;
        }
        write_config(tb, site)?;
        rb.create_database(&tb.db, &site.database)?;

        let sql = match find_most_recent(&site.path, "sql")? {
            Some(path) => path,
            None => ask_sql_file(tb, "No .sql file in the archive. Path to the SQL dump")?,
        };
        info!("Importing {}", sql.display());
        tb.db.import(&site.database, &sql)?;

        converge(tb, site)
    })
}

/// Fresh core, the supplied wp-content on top, the supplied dump.
fn restore_content(
    tb: &Toolbox<'_>,
    resolver: &mut PackageResolver<'_>,
    site: &mut Site,
    content: &Path,
    sql: &Path,
) -> Result<()> {
    guarded(tb, |rb| {
        rb.create_dir(&site.path)?;
        fresh_install(tb, resolver, site, rb)?;

        let copied = copy_dir(content, &site.path.join("wp-content"))?;
        println!("✓ {} files copied into wp-content", copied);

        tb.db.recreate(&site.database)?;
        tb.db.import(&site.database, sql)?;

        converge(tb, site)
    })
}

/// Fresh core, backup plugin, container in its storage folder, plugin restore.
fn restore_with_plugin(
    tb: &Toolbox<'_>,
    resolver: &mut PackageResolver<'_>,
    site: &mut Site,
    source: &Path,
) -> Result<()> {
    let plugin = &tb.config.backup_plugin;
    guarded(tb, |rb| {
        rb.create_dir(&site.path)?;
        fresh_install(tb, resolver, site, rb)?;
        ensure_backup_plugin(tb, resolver, site)?;

        let storage = site.path.join(&plugin.storage_dir);
        fs::create_dir_all(&storage)?;
        let is_container = source
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&plugin.file_extension));
        match source.file_name() {
            Some(name) if is_container => {
                fs::copy(source, storage.join(name))?;
            }
            _ => tb.archiver.extract(source, &storage)?,
        }

        let container = find_most_recent(&storage, &plugin.file_extension)?.ok_or_else(|| {
            HerdpressError::partial_state(format!(
                "no .{} file in {}",
                plugin.file_extension,
                source.display()
            ))
        })?;
        let file_name = container
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| HerdpressError::partial_state("container file has no name"))?;
        // The plugin only looks at the top of its storage folder
        if container.parent() != Some(storage.as_path()) {
            fs::rename(&container, storage.join(&file_name))?;
        }

        tb.wp.plugin_restore(&site.path, &plugin.command, &file_name)?;
        println!("✓ {} restored by {}", file_name, plugin.command);

        let reactivate: Vec<String> = tb
            .wp
            .list(&site.path, PackageKind::Plugin, None)?
            .into_iter()
            .filter(|p| !tb.config.restore_plugin_excludes.contains(p))
            .collect();
        tb.wp.activate(&site.path, PackageKind::Plugin, &reactivate)?;

        converge(tb, site)
    })
}

/// Extract, bind TLS, open the installer and wait for the operator.
fn restore_with_installer(tb: &Toolbox<'_>, site: &mut Site, package: &Path) -> Result<()> {
    guarded(tb, |rb| {
        rb.create_dir(&site.path)?;
        tb.archiver.extract(package, &site.path)?;
        reroot(&site.path, INSTALLER_MARKER)?;
        rb.create_database(&tb.db, &site.database)?;
        tb.herd.secure(&site.path)?;

        let conn = tb.db.connection();
        println!("Database for the installer:");
        println!("  Host:     {}", conn.wp_db_host());
        println!("  Name:     {}", site.database);
        println!("  User:     {}", conn.user);
        println!("  Password: {}", conn.password);
        rb.disarm();
        tb.herd
            .open(&format!("{}/{}", site.url(&tb.config.tld), INSTALLER_MARKER));

        if !tb
            .prompter
            .confirm("Has the installer finished in the browser?", true)?
        {
            return Err(HerdpressError::Cancelled(format!(
                "{} is left as the installer made it",
                site.name
            )));
        }

        correct_table_prefix(tb, site)?;
        reset_admin(tb, site)?;
        rewrite_urls(tb, site)?;
        tb.wp.flush_all(&site.path)?;
        finish(tb, site)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_dir_needs_plugins_and_themes() {
        let dir = tempfile::tempdir().unwrap();
        let content = dir.path().join("wp-content");
        fs::create_dir_all(content.join("plugins")).unwrap();
        assert!(validate_content_dir(&content).unwrap_err().is_recoverable());

        fs::create_dir_all(content.join("themes")).unwrap();
        assert!(validate_content_dir(&content).is_ok());
    }

    #[test]
    fn test_sql_file_validation() {
        let dir = tempfile::tempdir().unwrap();
        let dump = dir.path().join("shop.SQL");
        fs::write(&dump, "-- dump").unwrap();
        assert_eq!(validate_sql_file(&dump).unwrap(), dump);

        let other = dir.path().join("shop.txt");
        fs::write(&other, "").unwrap();
        assert!(validate_sql_file(&other).is_err());
        assert!(validate_sql_file(&dir.path().join("missing.sql")).is_err());
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(RestoreStrategy::Installer.to_string(), "installer");
        assert_eq!(
            "content".parse::<RestoreStrategy>().unwrap(),
            RestoreStrategy::Content
        );
    }
}
