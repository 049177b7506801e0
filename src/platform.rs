//! Platform capabilities.
//!
//! OS-specific locations (Herd's sites folder, its bundled binaries, the
//! browser launcher) live behind [`PlatformPaths`]. One implementation is
//! chosen by [`detect`] at startup and the resolved [`Layout`] and
//! [`ToolPaths`] are handed to the facades; nothing re-detects the OS later.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::Config;
use crate::error::{HerdpressError, Result};

/// Where things live on one operating system.
pub trait PlatformPaths: Send + Sync {
    fn name(&self) -> &'static str;

    /// Herd's default parked directory
    fn sites_dir(&self, home: &Path) -> PathBuf {
        home.join("Herd")
    }

    /// Directory holding Herd's bundled `wp`, `herd` and `php` shims
    fn herd_bin_dir(&self, home: &Path) -> PathBuf;

    fn backup_dir(&self, home: &Path) -> PathBuf {
        home.join("herdpress-backups")
    }

    /// Extra directories searched for tools that are rarely on PATH
    fn extra_search_dirs(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Browser launcher program and its leading arguments
    fn browser_launcher(&self) -> (String, Vec<String>);
}

#[derive(Debug, Clone, Copy)]
pub struct MacPaths;

impl PlatformPaths for MacPaths {
    fn name(&self) -> &'static str {
        "macos"
    }

    fn herd_bin_dir(&self, home: &Path) -> PathBuf {
        home.join("Library/Application Support/Herd/bin")
    }

    fn extra_search_dirs(&self) -> Vec<PathBuf> {
        vec![PathBuf::from("/opt/homebrew/bin"), PathBuf::from("/usr/local/bin")]
    }

    fn browser_launcher(&self) -> (String, Vec<String>) {
        ("open".to_string(), Vec::new())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WindowsPaths;

impl PlatformPaths for WindowsPaths {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn herd_bin_dir(&self, home: &Path) -> PathBuf {
        home.join(".config").join("herd").join("bin")
    }

    fn extra_search_dirs(&self) -> Vec<PathBuf> {
        vec![PathBuf::from(r"C:\Program Files\7-Zip")]
    }

    fn browser_launcher(&self) -> (String, Vec<String>) {
        // `start` treats its first quoted argument as a window title
        (
            "cmd".to_string(),
            vec!["/C".to_string(), "start".to_string(), String::new()],
        )
    }
}

/// Linux has no Herd build; the layout mirrors the Windows one so a
/// Valet-style setup with shims in `~/.config/herd/bin` works.
#[derive(Debug, Clone, Copy)]
pub struct LinuxPaths;

impl PlatformPaths for LinuxPaths {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn herd_bin_dir(&self, home: &Path) -> PathBuf {
        home.join(".config").join("herd").join("bin")
    }

    fn browser_launcher(&self) -> (String, Vec<String>) {
        ("xdg-open".to_string(), Vec::new())
    }
}

/// Pick the implementation for the running OS.
pub fn detect() -> Box<dyn PlatformPaths> {
    if cfg!(target_os = "macos") {
        Box::new(MacPaths)
    } else if cfg!(windows) {
        Box::new(WindowsPaths)
    } else {
        Box::new(LinuxPaths)
    }
}

/// Directories a run works in, configuration first, platform defaults second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub sites: PathBuf,
    pub backups: PathBuf,
    pub cache: PathBuf,
    pub herd_bin: PathBuf,
}

impl Layout {
    pub fn resolve(config: &Config, platform: &dyn PlatformPaths) -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| HerdpressError::config("cannot determine the home directory"))?;
        let cache = match config.cache_path {
            Some(ref path) => path.clone(),
            None => dirs::cache_dir()
                .unwrap_or_else(|| home.join(".cache"))
                .join("herdpress"),
        };

        Ok(Self {
            sites: config
                .sites_path
                .clone()
                .unwrap_or_else(|| platform.sites_dir(&home)),
            backups: config
                .backup_path
                .clone()
                .unwrap_or_else(|| platform.backup_dir(&home)),
            cache,
            herd_bin: config
                .herd_bin_path
                .clone()
                .unwrap_or_else(|| platform.herd_bin_dir(&home)),
        })
    }
}

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("herdpress")
        .join(crate::config::CONFIG_FILE_NAME)
}

/// Resolved executables for every external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub wp: String,
    pub mysql: String,
    pub mysqldump: String,
    pub seven_zip: String,
    pub tar: String,
    pub herd: String,
    pub opener: String,
    pub opener_prefix: Vec<String>,
}

impl ToolPaths {
    /// Bare program names, resolved by the OS at spawn time.
    pub fn bare(platform: &dyn PlatformPaths) -> Self {
        let (opener, opener_prefix) = platform.browser_launcher();
        Self {
            wp: "wp".to_string(),
            mysql: "mysql".to_string(),
            mysqldump: "mysqldump".to_string(),
            seven_zip: "7z".to_string(),
            tar: "tar".to_string(),
            herd: "herd".to_string(),
            opener,
            opener_prefix,
        }
    }

    /// Prefer Herd's bundled binaries, then PATH, then the platform's extra
    /// directories; fall back to the bare name so a missing tool fails
    /// loudly at spawn time.
    pub fn discover(herd_bin: &Path, platform: &dyn PlatformPaths) -> Self {
        let mut searched = vec![herd_bin.to_path_buf()];
        let extra = platform.extra_search_dirs();
        let locate = |candidates: &[&str]| -> String {
            for name in candidates {
                if let Ok(path) = which::which_in(name, Some(herd_bin), herd_bin) {
                    return path.display().to_string();
                }
                if let Ok(path) = which::which(name) {
                    return path.display().to_string();
                }
                for dir in &extra {
                    if let Ok(path) = which::which_in(name, Some(dir), dir) {
                        return path.display().to_string();
                    }
                }
            }
            candidates[0].to_string()
        };

        let bare = Self::bare(platform);
        let paths = Self {
            wp: locate(&["wp"]),
            mysql: locate(&["mysql"]),
            mysqldump: locate(&["mysqldump"]),
            seven_zip: locate(&["7z", "7zz", "7za"]),
            tar: locate(&["tar"]),
            herd: locate(&["herd"]),
            ..bare
        };
        searched.extend(extra);
        debug!("Tool search path {:?} resolved to {:?}", searched, paths);
        paths
    }

    /// `(label, program)` pairs checked by the pre-flight checks.
    pub fn required(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("wp", self.wp.as_str()),
            ("mysql", self.mysql.as_str()),
            ("mysqldump", self.mysqldump.as_str()),
            ("7z", self.seven_zip.as_str()),
            ("herd", self.herd.as_str()),
        ]
    }
}
