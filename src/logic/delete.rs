//! Delete sites, one at a time.
//!
//! The database is dropped first. If that fails the directory is left in
//! place, so the site still shows up in the registry and the delete can be
//! retried; the failure is recorded and the batch moves on.

use std::fs;

use tracing::debug;

use crate::error::{BatchReport, Result};
use crate::logic::Toolbox;
use crate::site::Site;

/// Drop the database, remove the directory, release the TLS binding.
pub fn delete_site(tb: &Toolbox<'_>, site: &Site) -> Result<()> {
    tb.db.drop(&site.database)?;

    if tb.dry_run {
        println!("  [dry-run] remove {}", site.path.display());
    } else {
        fs::remove_dir_all(&site.path)?;
    }

    // Sites that were never secured make this fail; nothing to undo then
    if let Err(e) = tb.herd.unsecure(&site.name) {
        debug!("herd unsecure {}: {}", site.name, e);
    }
    println!("✓ {} deleted", site.name);
    Ok(())
}

/// Delete every named site, continuing past failures.
pub fn delete_websites(tb: &Toolbox<'_>, names: &[String]) -> Result<BatchReport> {
    tb.db.ping()?;

    let mut report = BatchReport::default();
    for name in names {
        let result = tb
            .existing_site(name)
            .and_then(|site| delete_site(tb, &site));
        report.record(name, result);
    }
    Ok(report)
}
