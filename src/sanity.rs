//! Pre-flight sanity checks for the runtime environment
//!
//! Verifies that the external tools a workflow is about to drive can be
//! found before anything touches the sites directory. Service checks
//! (database connectivity, Herd running) are preconditions of the
//! individual workflows and live with them.

use std::path::Path;

use tracing::{debug, info};

use crate::error::{HerdpressError, Result};
use crate::platform::ToolPaths;

/// Result of environment verification
#[derive(Debug, Default)]
pub struct SanityCheckResult {
    pub missing_binaries: Vec<String>,
}

impl SanityCheckResult {
    /// Returns true if all checks passed
    pub fn is_ok(&self) -> bool {
        self.missing_binaries.is_empty()
    }
}

/// Check if a resolved program can be executed
fn binary_exists(program: &str) -> bool {
    let path = Path::new(program);
    if path.is_absolute() {
        return path.is_file();
    }
    which::which(program).is_ok()
}

/// Check the tools named in `labels` (`wp`, `mysql`, `mysqldump`, `7z`, `herd`)
pub fn verify_environment(tools: &ToolPaths, labels: &[&str]) -> SanityCheckResult {
    let missing_binaries = tools
        .required()
        .into_iter()
        .filter(|(label, _)| labels.contains(label))
        .filter(|(label, program)| {
            let found = binary_exists(program);
            debug!("{} -> {} (found: {})", label, program, found);
            !found
        })
        .map(|(label, _)| label.to_string())
        .collect();

    SanityCheckResult { missing_binaries }
}

/// Where to get a missing tool
fn install_hint(binary: &str) -> &'static str {
    match binary {
        "wp" | "herd" => "bundled with Laravel Herd (https://herd.laravel.com)",
        "mysql" | "mysqldump" => "Herd Pro services, DBngin or `brew install mysql-client`",
        "7z" => "`brew install sevenzip` or `winget install 7zip.7zip`",
        _ => "install it and make sure it is on PATH",
    }
}

/// Print a readable report of failed checks to stderr
pub fn print_report(result: &SanityCheckResult) {
    eprintln!();
    eprintln!("╔══════════════════════════════════════════════════════════════════╗");
    eprintln!("║                herdpress - Pre-flight Check Failed               ║");
    eprintln!("╚══════════════════════════════════════════════════════════════════╝");
    eprintln!();
    eprintln!("❌ ERROR: Missing required binaries");
    eprintln!();
    for binary in &result.missing_binaries {
        eprintln!("   • {} ({})", binary, install_hint(binary));
    }
    eprintln!();
    eprintln!("   Set `herd_bin_path` in the configuration if Herd lives elsewhere.");
    eprintln!();
}

/// Verify the tools a workflow needs, reporting and failing if any is missing
pub fn run_preflight_checks(tools: &ToolPaths, labels: &[&str]) -> Result<()> {
    debug!("Running pre-flight sanity checks for {:?}...", labels);

    let result = verify_environment(tools, labels);
    if !result.is_ok() {
        print_report(&result);
        return Err(HerdpressError::MissingBinary(
            result.missing_binaries.join(", "),
        ));
    }

    info!("Pre-flight checks passed: {}", labels.join(", "));
    Ok(())
}
