//! WP-CLI facade.
//!
//! One method per verb the workflows need. Every call is bound to a site
//! directory and fails with [`HerdpressError::Command`] on a non-zero exit,
//! except [`WpCli::is_installed`] whose exit code is the answer.

use std::path::Path;

use tracing::debug;

use crate::command_runner::{CommandOutput, CommandRunner};
use crate::error::{HerdpressError, Result};
use crate::output::{self, USER_LIST};
use crate::tool_args::Invocation;
use crate::tools::wp::{ConfigCreate, CoreInstall, FlushTarget, PackageKind, WpArgs, WpVerb};

/// A WordPress account as listed by `wp user list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WpUser {
    pub id: u64,
    pub login: String,
}

pub struct WpCli<'a> {
    runner: &'a dyn CommandRunner,
    program: &'a str,
}

impl<'a> WpCli<'a> {
    pub fn new(runner: &'a dyn CommandRunner, program: &'a str) -> Self {
        Self { runner, program }
    }

    fn exec(&self, site: &Path, verb: WpVerb) -> Result<CommandOutput> {
        self.runner
            .run(&Invocation::new(self.program, &WpArgs::new(site, verb)))
    }

    fn run(&self, site: &Path, verb: WpVerb) -> Result<CommandOutput> {
        self.exec(site, verb)?.ensure_success("wp")
    }

    pub fn core_download(&self, site: &Path, locale: Option<&str>) -> Result<()> {
        self.run(
            site,
            WpVerb::CoreDownload {
                locale: locale.map(str::to_string),
            },
        )?;
        Ok(())
    }

    pub fn core_version(&self, site: &Path) -> Result<String> {
        Ok(self.run(site, WpVerb::CoreVersion)?.stdout.trim().to_string())
    }

    pub fn config_create(&self, site: &Path, config: ConfigCreate) -> Result<()> {
        self.run(site, WpVerb::ConfigCreate(config))?;
        Ok(())
    }

    pub fn core_install(&self, site: &Path, install: CoreInstall) -> Result<()> {
        self.run(site, WpVerb::CoreInstall(install))?;
        Ok(())
    }

    pub fn option_update(&self, site: &Path, key: &str, value: &str) -> Result<()> {
        self.run(
            site,
            WpVerb::OptionUpdate {
                key: key.to_string(),
                value: value.to_string(),
            },
        )?;
        Ok(())
    }

    pub fn option_get(&self, site: &Path, key: &str) -> Result<String> {
        let out = self.run(
            site,
            WpVerb::OptionGet {
                key: key.to_string(),
            },
        )?;
        Ok(out.stdout.trim().to_string())
    }

    /// Administrator accounts, lowest ID first.
    pub fn administrators(&self, site: &Path) -> Result<Vec<WpUser>> {
        let out = self.run(
            site,
            WpVerb::UserList {
                role: "administrator".to_string(),
            },
        )?;
        let mut users = USER_LIST
            .rows(&out.stdout)?
            .into_iter()
            .map(|row| {
                let id = row[0].parse::<u64>().map_err(|_| {
                    HerdpressError::partial_state(format!("user list: bad ID {:?}", row[0]))
                })?;
                Ok(WpUser {
                    id,
                    login: row[1].clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    /// Set an account's password and e-mail through WordPress itself.
    pub fn update_user(&self, site: &Path, user_id: u64, password: &str, email: &str) -> Result<()> {
        self.run(
            site,
            WpVerb::UserUpdate {
                user: user_id.to_string(),
                password: Some(password.to_string()),
                email: Some(email.to_string()),
            },
        )?;
        Ok(())
    }

    pub fn install(
        &self,
        site: &Path,
        kind: PackageKind,
        sources: &[String],
        activate: bool,
    ) -> Result<()> {
        if sources.is_empty() {
            return Ok(());
        }
        self.run(
            site,
            WpVerb::Install {
                kind,
                sources: sources.to_vec(),
                activate,
            },
        )?;
        Ok(())
    }

    pub fn activate(&self, site: &Path, kind: PackageKind, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        self.run(
            site,
            WpVerb::Activate {
                kind,
                names: names.to_vec(),
            },
        )?;
        Ok(())
    }

    pub fn deactivate_all_plugins(&self, site: &Path, except: &[String]) -> Result<()> {
        self.run(
            site,
            WpVerb::DeactivateAllPlugins {
                except: except.to_vec(),
            },
        )?;
        Ok(())
    }

    /// Installed package names, optionally filtered by status (`active`).
    pub fn list(&self, site: &Path, kind: PackageKind, status: Option<&str>) -> Result<Vec<String>> {
        let out = self.run(
            site,
            WpVerb::List {
                kind,
                status: status.map(str::to_string),
            },
        )?;
        Ok(output::names(&out.stdout))
    }

    pub fn is_installed(&self, site: &Path, kind: PackageKind, name: &str) -> Result<bool> {
        let out = self.exec(
            site,
            WpVerb::IsInstalled {
                kind,
                name: name.to_string(),
            },
        )?;
        debug!("{} {} installed: {}", kind, name, out.success);
        Ok(out.success)
    }

    /// Object cache, transients and rewrite rules, in that order.
    pub fn flush_all(&self, site: &Path) -> Result<()> {
        for target in [
            FlushTarget::Cache,
            FlushTarget::Transients,
            FlushTarget::Rewrite,
        ] {
            self.run(site, WpVerb::Flush(target))?;
        }
        Ok(())
    }

    /// Run the backup plugin's backup command and return its stdout.
    pub fn plugin_backup(&self, site: &Path, command: &str) -> Result<String> {
        Ok(self
            .run(
                site,
                WpVerb::PluginBackup {
                    command: command.to_string(),
                },
            )?
            .stdout)
    }

    pub fn plugin_restore(&self, site: &Path, command: &str, file: &str) -> Result<()> {
        self.run(
            site,
            WpVerb::PluginRestore {
                command: command.to_string(),
                file: file.to_string(),
            },
        )?;
        Ok(())
    }

    /// Run one configured argument vector (`option update blogdescription ""`).
    pub fn raw(&self, site: &Path, args: &[String]) -> Result<()> {
        self.run(site, WpVerb::Raw(args.to_vec()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::RecordingRunner;

    const SITE: &str = "/herd/blog";

    #[test]
    fn test_administrators_parses_csv_and_sorts() {
        let runner = RecordingRunner::new().respond(
            "wp",
            &["--path=/herd/blog", "user", "list"],
            CommandOutput::ok("ID,user_login\n9,late\n1,admin\n"),
        );
        let wp = WpCli::new(&runner, "wp");
        let users = wp.administrators(Path::new(SITE)).unwrap();
        assert_eq!(
            users,
            vec![
                WpUser {
                    id: 1,
                    login: "admin".into()
                },
                WpUser {
                    id: 9,
                    login: "late".into()
                },
            ]
        );
    }

    #[test]
    fn test_bad_user_id_fails_closed() {
        let runner = RecordingRunner::new().respond(
            "wp",
            &["--path=/herd/blog", "user", "list"],
            CommandOutput::ok("ID,user_login\nabc,admin\n"),
        );
        let wp = WpCli::new(&runner, "wp");
        assert!(matches!(
            wp.administrators(Path::new(SITE)).unwrap_err(),
            HerdpressError::PartialState(_)
        ));
    }

    #[test]
    fn test_is_installed_uses_exit_code() {
        let runner = RecordingRunner::new().respond(
            "wp",
            &["--path=/herd/blog", "plugin", "is-installed", "missing"],
            CommandOutput::failed(1, ""),
        );
        let wp = WpCli::new(&runner, "wp");
        let site = Path::new(SITE);
        assert!(!wp.is_installed(site, PackageKind::Plugin, "missing").unwrap());
        assert!(wp.is_installed(site, PackageKind::Plugin, "present").unwrap());
    }

    #[test]
    fn test_flush_all_order() {
        let runner = RecordingRunner::new();
        let wp = WpCli::new(&runner, "wp");
        wp.flush_all(Path::new(SITE)).unwrap();
        assert_eq!(
            runner.calls_to("wp"),
            vec![
                "--path=/herd/blog cache flush",
                "--path=/herd/blog transient delete --all",
                "--path=/herd/blog rewrite flush",
            ]
        );
    }

    #[test]
    fn test_failure_carries_stderr() {
        let runner = RecordingRunner::new().respond(
            "wp",
            &["--path=/herd/blog", "core", "version"],
            CommandOutput::failed(1, "Error: This does not seem to be a WordPress installation."),
        );
        let wp = WpCli::new(&runner, "wp");
        let err = wp.core_version(Path::new(SITE)).unwrap_err();
        assert!(err.to_string().contains("does not seem to be a WordPress"));
    }

    #[test]
    fn test_empty_install_is_noop() {
        let runner = RecordingRunner::new();
        let wp = WpCli::new(&runner, "wp");
        wp.install(Path::new(SITE), PackageKind::Plugin, &[], true)
            .unwrap();
        wp.activate(Path::new(SITE), PackageKind::Plugin, &[]).unwrap();
        assert!(runner.invocations().is_empty());
    }
}
