//! Convergence steps shared by the restore strategies.
//!
//! A restored site may come from another machine with another table prefix,
//! another admin account and another URL. These steps bring it in line with
//! the local site it now is.

use std::fs;
use std::sync::OnceLock;

use regex::{NoExpand, Regex};
use tracing::{info, warn};

use crate::error::{HerdpressError, Result};
use crate::logic::{Task, Toolbox, fan_out};
use crate::site::{DEFAULT_TABLE_PREFIX, Site};

fn prefix_assignment() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\$table_prefix\s*=\s*['"][^'"]*['"]\s*;"#).ok())
        .as_ref()
}

/// Point the `$table_prefix` assignment of a wp-config.php at `prefix`.
///
/// The first assignment is replaced and every other byte kept. Without an
/// assignment, one line is appended.
pub fn rewrite_table_prefix(content: &str, prefix: &str) -> String {
    let line = format!("$table_prefix = '{}';", prefix);

    if let Some(re) = prefix_assignment() {
        if re.is_match(content) {
            return re.replacen(content, 1, NoExpand(&line)).into_owned();
        }
    }

    let mut out = content.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&line);
    out.push('\n');
    out
}

/// Discover the prefix of the imported tables and make wp-config.php agree.
///
/// Without an options table the default prefix is kept.
pub fn correct_table_prefix(tb: &Toolbox<'_>, site: &mut Site) -> Result<()> {
    let Some(prefix) = tb.db.table_prefix(&site.database)? else {
        warn!(
            "No options table in {}; keeping prefix {}",
            site.database, DEFAULT_TABLE_PREFIX
        );
        site.table_prefix = DEFAULT_TABLE_PREFIX.to_string();
        return Ok(());
    };

    if prefix != DEFAULT_TABLE_PREFIX {
        let path = site.config_file();
        let content = fs::read_to_string(&path)?;
        fs::write(&path, rewrite_table_prefix(&content, &prefix))?;
        info!("Table prefix of {} set to {}", site.name, prefix);
    }
    site.table_prefix = prefix;
    Ok(())
}

/// Give the first administrator the configured login, password and e-mail.
pub fn reset_admin(tb: &Toolbox<'_>, site: &Site) -> Result<()> {
    let admins = tb.wp.administrators(&site.path)?;
    let Some(first) = admins.first() else {
        return Err(HerdpressError::partial_state(format!(
            "{} has no administrator account",
            site.name
        )));
    };
    let id = first.id;
    info!(
        "Resetting administrator #{} ({}) to {}",
        id, first.login, site.admin.username
    );

    let (db, wp) = (&tb.db, &tb.wp);
    let admin = &site.admin;
    let tasks: Vec<Task<'_>> = vec![
        Box::new(move || db.update_user_login(&site.database, &site.table_prefix, id, &admin.username)),
        Box::new(move || wp.update_user(&site.path, id, &admin.password, &admin.email)),
        Box::new(move || wp.option_update(&site.path, "admin_email", &admin.email)),
    ];
    fan_out(tasks)
}

/// Point `siteurl` and `home` at the local URL.
pub fn rewrite_urls(tb: &Toolbox<'_>, site: &Site) -> Result<()> {
    let url = site.url(&tb.config.tld);
    info!("Site URL of {} set to {}", site.name, url);

    let wp = &tb.wp;
    let (url, path) = (url.as_str(), site.path.as_path());
    let tasks: Vec<Task<'_>> = vec![
        Box::new(move || wp.option_update(path, "siteurl", url)),
        Box::new(move || wp.option_update(path, "home", url)),
    ];
    fan_out(tasks)
}

/// Prefix, admin, URLs, caches, TLS binding, then hand the site to the browser.
pub fn converge(tb: &Toolbox<'_>, site: &mut Site) -> Result<()> {
    correct_table_prefix(tb, site)?;
    reset_admin(tb, site)?;
    rewrite_urls(tb, site)?;
    tb.wp.flush_all(&site.path)?;
    tb.herd.secure(&site.path)?;
    finish(tb, site)
}

/// Credentials file and browser hand-off.
pub(crate) fn finish(tb: &Toolbox<'_>, site: &Site) -> Result<()> {
    if tb.config.write_credentials_file {
        let path = site.write_credentials(&tb.config.tld)?;
        info!("Credentials written to {}", path.display());
    }
    println!("✓ {} is ready at {}", site.name, site.url(&tb.config.tld));
    tb.herd.open(&format!("{}/wp-admin", site.url(&tb.config.tld)));
    Ok(())
}
