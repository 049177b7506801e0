//! Site-manager facade: Herd service probe, TLS binding and browser hand-off.

use std::path::Path;

use tracing::{info, warn};

use crate::command_runner::CommandRunner;
use crate::error::{HerdpressError, Result};
use crate::tool_args::Invocation;
use crate::tools::herd::{HerdProbe, HerdSecure, HerdUnsecure, OpenUrl};

/// Notice Herd prints on every command while its desktop app is closed.
const NOT_RUNNING_NOTICE: &str = "not running";

pub struct Herd<'a> {
    runner: &'a dyn CommandRunner,
    program: &'a str,
    opener: &'a str,
    opener_prefix: &'a [String],
}

impl<'a> Herd<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        program: &'a str,
        opener: &'a str,
        opener_prefix: &'a [String],
    ) -> Self {
        Self {
            runner,
            program,
            opener,
            opener_prefix,
        }
    }

    pub fn ensure_running(&self) -> Result<()> {
        let out = self.runner.run(&Invocation::new(self.program, &HerdProbe))?;
        let text = format!("{}\n{}", out.stdout, out.stderr).to_lowercase();
        if !out.success || text.contains(NOT_RUNNING_NOTICE) {
            return Err(HerdpressError::ServiceNotRunning(
                "Herd is not running; start the Herd app and try again".to_string(),
            ));
        }
        Ok(())
    }

    /// Bind `https://<site>.<tld>` with a local certificate.
    pub fn secure(&self, site_dir: &Path) -> Result<()> {
        info!("Securing {}", site_dir.display());
        let args = HerdSecure {
            site_dir: site_dir.to_path_buf(),
        };
        self.runner
            .run(&Invocation::new(self.program, &args))?
            .ensure_success("herd")?;
        Ok(())
    }

    pub fn unsecure(&self, name: &str) -> Result<()> {
        let args = HerdUnsecure {
            name: name.to_string(),
        };
        self.runner
            .run(&Invocation::new(self.program, &args))?
            .ensure_success("herd")?;
        Ok(())
    }

    /// Open `url` in the default browser. Failure is only logged: the URL is
    /// printed for the operator anyway.
    pub fn open(&self, url: &str) {
        println!("  → {}", url);
        let args = OpenUrl {
            prefix: self.opener_prefix.to_vec(),
            url: url.to_string(),
        };
        match self.runner.run(&Invocation::new(self.opener, &args)) {
            Ok(out) if out.success => {}
            Ok(out) => warn!("Browser launcher failed: {}", out.stderr.trim()),
            Err(e) => warn!("Browser launcher failed: {}", e),
        }
    }
}
