//! Type-safe arguments for WP-CLI.
//!
//! Every WP-CLI call is bound to one site directory: [`WpArgs`] pairs the site
//! path with a [`WpVerb`] and always emits `--path=<site>` first, and also runs
//! the tool with the site as its working directory. Verbs that take a secret
//! use the `--flag=value` form so it is redacted in logs.

use std::path::{Path, PathBuf};

use strum::{Display, EnumString};

use crate::tool_args::ToolArgs;

/// Theme or plugin, the two package kinds WP-CLI manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PackageKind {
    Plugin,
    Theme,
}

/// Site-wide caches flushed before backups and after restores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum FlushTarget {
    /// Object cache
    Cache,
    /// Every transient in the options table
    Transients,
    /// Rewrite rules
    Rewrite,
}

impl FlushTarget {
    fn words(self) -> &'static [&'static str] {
        match self {
            FlushTarget::Cache => &["cache", "flush"],
            FlushTarget::Transients => &["transient", "delete", "--all"],
            FlushTarget::Rewrite => &["rewrite", "flush"],
        }
    }
}

/// Database settings written into wp-config.php.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigCreate {
    pub dbname: String,
    pub dbuser: String,
    pub dbpass: String,
    pub dbhost: String,
    pub dbprefix: String,
}

/// Values for `wp core install`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreInstall {
    pub url: String,
    pub title: String,
    pub admin_user: String,
    pub admin_password: String,
    pub admin_email: String,
}

/// One WP-CLI verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WpVerb {
    /// `core download`, used when no cached core package is available
    CoreDownload { locale: Option<String> },
    CoreVersion,
    ConfigCreate(ConfigCreate),
    CoreInstall(CoreInstall),
    OptionUpdate { key: String, value: String },
    OptionGet { key: String },
    /// `user list --role=<role> --fields=ID,user_login --format=csv`
    UserList { role: String },
    /// Password goes through WordPress' own hashing
    UserUpdate {
        user: String,
        password: Option<String>,
        email: Option<String>,
    },
    /// Install from a slug, zip path or URL
    Install {
        kind: PackageKind,
        sources: Vec<String>,
        activate: bool,
    },
    Activate { kind: PackageKind, names: Vec<String> },
    /// Deactivate every plugin except the listed ones
    DeactivateAllPlugins { except: Vec<String> },
    /// `plugin list --status=<status> --field=name`, one name per line
    List {
        kind: PackageKind,
        status: Option<String>,
    },
    IsInstalled { kind: PackageKind, name: String },
    Flush(FlushTarget),
    /// Backup plugin's own `backup` command
    PluginBackup { command: String },
    /// Backup plugin's own `restore` command, confirmed non-interactively
    PluginRestore { command: String, file: String },
    /// Arbitrary argument vector from the baseline configuration
    Raw(Vec<String>),
}

/// A WP-CLI verb bound to a site directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WpArgs {
    pub site: PathBuf,
    pub verb: WpVerb,
}

impl WpArgs {
    pub fn new(site: &Path, verb: WpVerb) -> Self {
        Self {
            site: site.to_path_buf(),
            verb,
        }
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl ToolArgs for WpArgs {
    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec![format!("--path={}", self.site.display())];

        match &self.verb {
            WpVerb::CoreDownload { locale } => {
                args.extend(words(&["core", "download", "--force"]));
                if let Some(locale) = locale {
                    args.push(format!("--locale={}", locale));
                }
            }
            WpVerb::CoreVersion => args.extend(words(&["core", "version"])),
            WpVerb::ConfigCreate(c) => {
                args.extend(words(&["config", "create"]));
                args.push(format!("--dbname={}", c.dbname));
                args.push(format!("--dbuser={}", c.dbuser));
                args.push(format!("--dbpass={}", c.dbpass));
                args.push(format!("--dbhost={}", c.dbhost));
                args.push(format!("--dbprefix={}", c.dbprefix));
                // The database is created after the config file
                args.push("--skip-check".to_string());
                args.push("--force".to_string());
            }
            WpVerb::CoreInstall(c) => {
                args.extend(words(&["core", "install"]));
                args.push(format!("--url={}", c.url));
                args.push(format!("--title={}", c.title));
                args.push(format!("--admin_user={}", c.admin_user));
                args.push(format!("--admin_password={}", c.admin_password));
                args.push(format!("--admin_email={}", c.admin_email));
                args.push("--skip-email".to_string());
            }
            WpVerb::OptionUpdate { key, value } => {
                args.extend(words(&["option", "update"]));
                args.push(key.clone());
                args.push(value.clone());
            }
            WpVerb::OptionGet { key } => {
                args.extend(words(&["option", "get"]));
                args.push(key.clone());
            }
            WpVerb::UserList { role } => {
                args.extend(words(&["user", "list"]));
                args.push(format!("--role={}", role));
                args.push("--fields=ID,user_login".to_string());
                args.push("--format=csv".to_string());
            }
            WpVerb::UserUpdate {
                user,
                password,
                email,
            } => {
                args.extend(words(&["user", "update"]));
                args.push(user.clone());
                if let Some(password) = password {
                    args.push(format!("--user_pass={}", password));
                }
                if let Some(email) = email {
                    args.push(format!("--user_email={}", email));
                }
                args.push("--skip-email".to_string());
            }
            WpVerb::Install {
                kind,
                sources,
                activate,
            } => {
                args.push(kind.to_string());
                args.push("install".to_string());
                args.extend(sources.iter().cloned());
                args.push("--force".to_string());
                if *activate {
                    args.push("--activate".to_string());
                }
            }
            WpVerb::Activate { kind, names } => {
                args.push(kind.to_string());
                args.push("activate".to_string());
                args.extend(names.iter().cloned());
            }
            WpVerb::DeactivateAllPlugins { except } => {
                args.extend(words(&["plugin", "deactivate", "--all"]));
                if !except.is_empty() {
                    args.push(format!("--exclude={}", except.join(",")));
                }
            }
            WpVerb::List { kind, status } => {
                args.push(kind.to_string());
                args.push("list".to_string());
                if let Some(status) = status {
                    args.push(format!("--status={}", status));
                }
                args.push("--field=name".to_string());
            }
            WpVerb::IsInstalled { kind, name } => {
                args.push(kind.to_string());
                args.push("is-installed".to_string());
                args.push(name.clone());
            }
            WpVerb::Flush(target) => args.extend(words(target.words())),
            WpVerb::PluginBackup { command } => {
                args.push(command.clone());
                args.push("backup".to_string());
            }
            WpVerb::PluginRestore { command, file } => {
                args.push(command.clone());
                args.push("restore".to_string());
                args.push(file.clone());
                args.push("--yes".to_string());
            }
            WpVerb::Raw(raw) => args.extend(raw.iter().cloned()),
        }

        args
    }

    fn working_dir(&self) -> Option<&Path> {
        Some(&self.site)
    }

    fn verb(&self) -> &'static str {
        match self.verb {
            WpVerb::CoreDownload { .. } => "core download",
            WpVerb::CoreVersion => "core version",
            WpVerb::ConfigCreate(_) => "config create",
            WpVerb::CoreInstall(_) => "core install",
            WpVerb::OptionUpdate { .. } => "option update",
            WpVerb::OptionGet { .. } => "option get",
            WpVerb::UserList { .. } => "user list",
            WpVerb::UserUpdate { .. } => "user update",
            WpVerb::Install { .. } => "install",
            WpVerb::Activate { .. } => "activate",
            WpVerb::DeactivateAllPlugins { .. } => "plugin deactivate",
            WpVerb::List { .. } => "list",
            WpVerb::IsInstalled { .. } => "is-installed",
            WpVerb::Flush(_) => "flush",
            WpVerb::PluginBackup { .. } => "plugin backup",
            WpVerb::PluginRestore { .. } => "plugin restore",
            WpVerb::Raw(_) => "baseline",
        }
    }
}
