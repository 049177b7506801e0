//! Create a site end to end.
//!
//! # Sequence
//!
//! Directory, core package, wp-config.php, database, `wp core install`,
//! themes, plugins, baseline, TLS binding. Anything that fails after the
//! directory exists is rolled back when `rollback_on_failure` is set.
//!
//! # Packages
//!
//! Themes and plugins go through the [`PackageResolver`] so premium packages
//! come from the catalog and are cached. A slug the catalog cannot resolve
//! is handed to WP-CLI as is, which installs it from the public directory.

use tracing::{info, warn};

use crate::archive::reroot;
use crate::error::Result;
use crate::logic::{Rollback, Toolbox, guarded};
use crate::packages::{CORE_SLUG, PackageResolver};
use crate::site::{DEFAULT_TABLE_PREFIX, Site};
use crate::tools::mysql::MysqlConnection;
use crate::tools::wp::{ConfigCreate, CoreInstall, PackageKind};

/// File that marks the root of a WordPress core tree.
pub const CORE_MARKER: &str = "wp-load.php";

/// Operator choices for one new site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionPlan {
    /// Theme slugs; the first is activated. Empty means the default theme.
    pub themes: Vec<String>,
    pub plugins: Vec<String>,
    pub apply_baseline: bool,
}

/// Create `site`, which must have been claimed with [`Toolbox::claim_site`].
pub fn create_website(
    tb: &Toolbox<'_>,
    resolver: &mut PackageResolver<'_>,
    site: Site,
    plan: &ProvisionPlan,
) -> Result<Site> {
    tb.refuse_dry_run("create")?;
    tb.check_services()?;
    tb.ensure_free(&site)?;
    println!("🚀 Creating {} in {}", site.name, site.path.display());

    guarded(tb, |rb| {
        rb.create_dir(&site.path)?;
        fresh_install(tb, resolver, &site, rb)?;

        install_themes(tb, resolver, &site, &plan.themes)?;
        install_packages(tb, resolver, &site, PackageKind::Plugin, &plan.plugins, true)?;

        if plan.apply_baseline {
            apply_baseline(tb, &site)?;
        }
        tb.herd.secure(&site.path)?;
        Ok(())
    })?;

    crate::logic::converge::finish(tb, &site)?;
    Ok(site)
}

/// Core files, wp-config.php, database and `wp core install` in an existing
/// empty site directory.
pub(crate) fn fresh_install(
    tb: &Toolbox<'_>,
    resolver: &mut PackageResolver<'_>,
    site: &Site,
    rb: &mut Rollback,
) -> Result<()> {
    place_core(tb, resolver, site)?;
    write_config(tb, site)?;
    rb.create_database(&tb.db, &site.database)?;

    tb.wp.core_install(
        &site.path,
        CoreInstall {
            url: site.url(&tb.config.tld),
            title: site.title(),
            admin_user: site.admin.username.clone(),
            admin_password: site.admin.password.clone(),
            admin_email: site.admin.email.clone(),
        },
    )?;
    println!("✓ WordPress installed for {}", site.name);
    Ok(())
}

/// Extract the cached core package, or let WP-CLI download it when the
/// catalog and the cache both come up empty.
fn place_core(tb: &Toolbox<'_>, resolver: &mut PackageResolver<'_>, site: &Site) -> Result<()> {
    match resolver.resolve(CORE_SLUG) {
        Ok(core) => {
            info!("Using WordPress {} from {}", core.version, core.file.display());
            tb.archiver.extract(&core.file, &site.path)?;
            reroot(&site.path, CORE_MARKER)
        }
        Err(e) => {
            warn!("Core package unavailable ({}); downloading with WP-CLI", e);
            tb.wp.core_download(&site.path, None)
        }
    }
}

/// wp-config.php bound to the site's database and the default prefix.
pub(crate) fn write_config(tb: &Toolbox<'_>, site: &Site) -> Result<()> {
    let conn: &MysqlConnection = tb.db.connection();
    tb.wp.config_create(
        &site.path,
        ConfigCreate {
            dbname: site.database.clone(),
            dbuser: conn.user.clone(),
            dbpass: conn.password.clone(),
            dbhost: conn.wp_db_host(),
            dbprefix: DEFAULT_TABLE_PREFIX.to_string(),
        },
    )
}

fn install_themes(
    tb: &Toolbox<'_>,
    resolver: &mut PackageResolver<'_>,
    site: &Site,
    themes: &[String],
) -> Result<()> {
    if themes.is_empty() {
        info!("No theme chosen; installing {}", tb.config.default_theme);
        let default = [tb.config.default_theme.clone()];
        return install_packages(tb, resolver, site, PackageKind::Theme, &default, true);
    }

    install_packages(tb, resolver, site, PackageKind::Theme, themes, false)?;
    tb.wp.activate(&site.path, PackageKind::Theme, &themes[..1])
}

/// Install `slugs` in selection order.
pub(crate) fn install_packages(
    tb: &Toolbox<'_>,
    resolver: &mut PackageResolver<'_>,
    site: &Site,
    kind: PackageKind,
    slugs: &[String],
    activate: bool,
) -> Result<()> {
    if slugs.is_empty() {
        return Ok(());
    }
    let resolution = resolver.resolve_many(slugs);
    for (slug, e) in &resolution.failures {
        warn!("{} {} not in the catalog ({}); installing from the directory", kind, slug, e);
    }
    let sources: Vec<String> = slugs.iter().map(|slug| resolution.source_for(slug)).collect();

    tb.wp.install(&site.path, kind, &sources, activate)?;
    for slug in slugs {
        println!("✓ {} {} installed", kind, tb.config.package_name(slug));
    }
    Ok(())
}

/// Configured WP-CLI argument vectors, in declared order.
pub fn apply_baseline(tb: &Toolbox<'_>, site: &Site) -> Result<()> {
    for args in &tb.config.baseline_commands {
        tb.wp.raw(&site.path, args)?;
    }
    println!(
        "✓ Baseline applied ({} commands)",
        tb.config.baseline_commands.len()
    );
    Ok(())
}
