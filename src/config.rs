//! Configuration file handling.
//!
//! The whole tool is driven by one JSON file. Every field has a default, so a
//! file only needs the values that differ on a given workstation. The loaded
//! [`Config`] is constructed once in `main` and passed by reference into every
//! workflow; nothing reads configuration from global state.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::site::AdminCredentials;

/// File name looked up in the platform config directory when `--config` is absent
pub const CONFIG_FILE_NAME: &str = "herdpress.json";

/// MySQL connection parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Local socket path (macOS Herd ships MySQL on a socket)
    pub socket: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            socket: None,
        }
    }
}

/// Premium package catalog and core version endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
    pub api_key: String,
    pub core_version_url: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            core_version_url: "https://api.wordpress.org/core/version-check/1.7/".to_string(),
        }
    }
}

impl CatalogConfig {
    /// Metadata endpoint for one package slug
    pub fn package_url(&self, slug: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{}/packages/{}/metadata/license/{}", base, slug, self.api_key)
    }
}

/// The backup plugin driven by plugin-assisted backup and restore
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupPluginConfig {
    pub slug: String,
    /// Paid companion that lifts the import size limit
    pub extension_slug: String,
    /// WP-CLI command namespace registered by the plugin
    pub command: String,
    /// Native container file extension, without the dot
    pub file_extension: String,
    /// Storage folder relative to the site root
    pub storage_dir: String,
}

impl Default for BackupPluginConfig {
    fn default() -> Self {
        Self {
            slug: "all-in-one-wp-migration".to_string(),
            extension_slug: "all-in-one-wp-migration-unlimited-extension".to_string(),
            command: "ai1wm".to_string(),
            file_extension: "wpress".to_string(),
            storage_dir: "wp-content/ai1wm-backups".to_string(),
        }
    }
}

/// A theme or plugin offered in selection menus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    pub slug: String,
    pub name: String,
}

/// herdpress configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding one sub-directory per site (platform default when unset)
    pub sites_path: Option<PathBuf>,
    pub backup_path: Option<PathBuf>,
    /// Package download cache (platform default when unset)
    pub cache_path: Option<PathBuf>,
    /// Directory with the Herd-bundled `wp` and `herd` binaries
    pub herd_bin_path: Option<PathBuf>,
    /// Local domain suffix served by Herd
    pub tld: String,

    pub admin: AdminCredentials,
    pub database: DatabaseConfig,
    pub catalog: CatalogConfig,
    pub backup_plugin: BackupPluginConfig,

    pub default_theme: String,
    pub themes: Vec<PackageRef>,
    pub plugins: Vec<PackageRef>,

    /// WP-CLI argument vectors applied in order to normalize a site
    pub baseline_commands: Vec<Vec<String>>,
    /// Apply the baseline after `create` unless told otherwise
    pub apply_baseline_by_default: bool,

    /// Glob patterns skipped when archiving a full-source backup
    pub backup_excludes: Vec<String>,
    /// Plugins left inactive after a plugin-assisted restore
    pub restore_plugin_excludes: Vec<String>,

    /// Remove the half-created site when a create/restore step fails
    pub rollback_on_failure: bool,
    pub write_credentials_file: bool,
}

fn args(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sites_path: None,
            backup_path: None,
            cache_path: None,
            herd_bin_path: None,
            tld: "test".to_string(),
            admin: AdminCredentials::default(),
            database: DatabaseConfig::default(),
            catalog: CatalogConfig::default(),
            backup_plugin: BackupPluginConfig::default(),
            default_theme: "twentytwentyfour".to_string(),
            themes: Vec::new(),
            plugins: Vec::new(),
            baseline_commands: vec![
                args(&["option", "update", "blogdescription", ""]),
                args(&["option", "update", "timezone_string", "UTC"]),
                args(&["option", "update", "default_comment_status", "closed"]),
                args(&["rewrite", "structure", "/%postname%/", "--hard"]),
                args(&["plugin", "delete", "hello", "akismet"]),
            ],
            apply_baseline_by_default: true,
            backup_excludes: [
                ".git",
                ".svn",
                ".idea",
                ".vscode",
                "node_modules",
                "wp-content/cache",
                "wp-content/upgrade",
                "wp-content/upgrade-temp-backup",
                "wp-content/ai1wm-backups",
                "wp-content/updraft",
                "*.log",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            restore_plugin_excludes: [
                "updraftplus",
                "duplicator",
                "duplicator-pro",
                "backwpup",
                "wpvivid-backuprestore",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            rollback_on_failure: true,
            write_credentials_file: true,
        }
    }
}

impl Config {
    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration to JSON")?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        fs::write(&path, json)
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load_from_file(path)
        } else {
            tracing::warn!(
                "No configuration at {:?}, using defaults (run `herdpress init-config` to create one)",
                path.as_ref()
            );
            Ok(Self::default())
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.admin.username.trim().is_empty() {
            anyhow::bail!("admin.username must be specified");
        }
        if self.admin.password.is_empty() {
            anyhow::bail!("admin.password must be specified");
        }
        if !self.admin.email.contains('@') {
            anyhow::bail!("admin.email must be an e-mail address");
        }

        if self.database.port == 0 {
            anyhow::bail!("database.port must be non-zero");
        }
        if self.database.user.trim().is_empty() {
            anyhow::bail!("database.user must be specified");
        }

        for url in [&self.catalog.base_url, &self.catalog.core_version_url] {
            if !url.is_empty() && !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("Catalog URL must start with http:// or https://: {}", url);
            }
        }

        if self.tld.trim().is_empty() || self.tld.contains('.') {
            anyhow::bail!("tld must be a single label such as \"test\"");
        }

        if let Some(index) = self.baseline_commands.iter().position(|c| c.is_empty()) {
            anyhow::bail!("baseline_commands[{}] is empty", index);
        }

        Ok(())
    }

    /// Display name for a catalog slug, falling back to the slug itself
    pub fn package_name<'a>(&'a self, slug: &'a str) -> &'a str {
        self.themes
            .iter()
            .chain(self.plugins.iter())
            .find(|p| p.slug == slug)
            .map(|p| p.name.as_str())
            .unwrap_or(slug)
    }
}
