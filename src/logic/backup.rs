//! Backups, one site at a time.
//!
//! Both strategies end with one zip in the backups directory named
//! `{site}_{strategy}_backup_{YYYYmmdd_HHMMSS}.zip`. A failing site is
//! recorded in the [`BatchReport`] and the batch continues.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use strum::{Display, EnumIter, EnumString};
use tracing::{debug, info, warn};

use crate::archive::remove_files_with_extension;
use crate::error::{BatchReport, HerdpressError, Result};
use crate::logic::Toolbox;
use crate::logic::provision::install_packages;
use crate::output;
use crate::packages::PackageResolver;
use crate::site::Site;
use crate::tools::wp::PackageKind;

/// How a backup is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum BackupStrategy {
    /// Database dump plus the whole site tree
    #[default]
    Full,
    /// The backup plugin's own container file
    Plugin,
}

/// `{site}_{strategy}_backup_{timestamp}.zip`
pub fn archive_name(site: &str, strategy: BackupStrategy, at: DateTime<Local>) -> String {
    format!(
        "{}_{}_backup_{}.zip",
        site,
        strategy,
        at.format("%Y%m%d_%H%M%S")
    )
}

fn archive_path(tb: &Toolbox<'_>, site: &Site, strategy: BackupStrategy) -> PathBuf {
    tb.layout
        .backups
        .join(archive_name(&site.name, strategy, Local::now()))
}

/// Dump the database into the site and zip the tree.
pub fn backup_full(tb: &Toolbox<'_>, site: &Site) -> Result<PathBuf> {
    let plugin = &tb.config.backup_plugin;
    if tb.dry_run {
        println!("  [dry-run] remove stray .sql and .{} files", plugin.file_extension);
    } else {
        let sql = remove_files_with_extension(&site.path, "sql", 1)?;
        let containers = remove_files_with_extension(
            &site.path.join(&plugin.storage_dir),
            &plugin.file_extension,
            1,
        )?;
        debug!("Removed {} stray dumps and {} stray containers", sql, containers);
    }

    tb.wp.flush_all(&site.path)?;
    let dump = site.path.join(format!("{}.sql", site.database));
    tb.db.export(&site.database, &dump)?;

    let archive = archive_path(tb, site, BackupStrategy::Full);
    tb.archiver
        .compress_dir(&site.path, &archive, &tb.config.backup_excludes)?;
    println!("✓ {} backed up to {}", site.name, archive.display());
    Ok(archive)
}

/// Install (when missing) and activate the backup plugin and its extension.
pub(crate) fn ensure_backup_plugin(
    tb: &Toolbox<'_>,
    resolver: &mut PackageResolver<'_>,
    site: &Site,
) -> Result<()> {
    let plugin = &tb.config.backup_plugin;
    let slugs = [plugin.slug.clone(), plugin.extension_slug.clone()];
    for slug in &slugs {
        if !tb.wp.is_installed(&site.path, PackageKind::Plugin, slug)? {
            info!("{} is missing from {}; installing", slug, site.name);
            install_packages(
                tb,
                resolver,
                site,
                PackageKind::Plugin,
                std::slice::from_ref(slug),
                false,
            )?;
        }
    }
    tb.wp.activate(&site.path, PackageKind::Plugin, &slugs)
}

/// Let the backup plugin produce its container file and zip it.
///
/// Every other plugin is deactivated for the run and the previously active
/// set is restored afterwards, whether or not the backup worked.
pub fn backup_with_plugin(
    tb: &Toolbox<'_>,
    resolver: &mut PackageResolver<'_>,
    site: &Site,
) -> Result<PathBuf> {
    let plugin = &tb.config.backup_plugin;
    tb.wp.flush_all(&site.path)?;

    let active = tb.wp.list(&site.path, PackageKind::Plugin, Some("active"))?;
    debug!("Active plugins on {}: {:?}", site.name, active);
    tb.wp.deactivate_all_plugins(
        &site.path,
        &[plugin.slug.clone(), plugin.extension_slug.clone()],
    )?;

    let result = run_plugin_backup(tb, resolver, site);

    match (result, tb.wp.activate(&site.path, PackageKind::Plugin, &active)) {
        (Ok(archive), Ok(())) => Ok(archive),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(reactivate)) => {
            warn!("Could not reactivate plugins on {}: {}", site.name, reactivate);
            Err(e)
        }
    }
}

fn run_plugin_backup(
    tb: &Toolbox<'_>,
    resolver: &mut PackageResolver<'_>,
    site: &Site,
) -> Result<PathBuf> {
    let plugin = &tb.config.backup_plugin;
    ensure_backup_plugin(tb, resolver, site)?;
    let stdout = tb.wp.plugin_backup(&site.path, &plugin.command)?;

    let archive = archive_path(tb, site, BackupStrategy::Plugin);
    if tb.dry_run {
        println!("  [dry-run] zip the reported backup into {}", archive.display());
        return Ok(archive);
    }

    let reported = output::backup_location(&stdout).ok_or_else(|| {
        HerdpressError::partial_state(format!(
            "{} backup printed no '{}' line",
            plugin.command,
            output::BACKUP_LOCATION_MARKER
        ))
    })?;
    let artifact = if reported.is_absolute() {
        reported
    } else {
        site.path.join(reported)
    };
    if !artifact.is_file() {
        return Err(HerdpressError::partial_state(format!(
            "reported backup {} does not exist",
            artifact.display()
        )));
    }

    tb.archiver.compress_file(&artifact, &archive)?;
    println!("✓ {} backed up to {}", site.name, archive.display());
    Ok(archive)
}

/// Back up every named site with `strategy`, continuing past failures.
pub fn backup_websites(
    tb: &Toolbox<'_>,
    resolver: &mut PackageResolver<'_>,
    names: &[String],
    strategy: BackupStrategy,
) -> Result<BatchReport> {
    tb.db.ping()?;

    let mut report = BatchReport::default();
    for name in names {
        let result = tb.existing_site(name).and_then(|site| match strategy {
            BackupStrategy::Full => backup_full(tb, &site),
            BackupStrategy::Plugin => backup_with_plugin(tb, resolver, &site),
        });
        report.record(name, result.map(|_| ()));
    }
    Ok(report)
}
