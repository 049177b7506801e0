//! Type-safe arguments for Laravel Herd and the desktop browser launcher.

use std::path::{Path, PathBuf};

use crate::tool_args::ToolArgs;

/// `herd secure`, run inside the site directory to bind `https://<site>.<tld>`.
#[derive(Debug, Clone)]
pub struct HerdSecure {
    pub site_dir: PathBuf,
}

impl ToolArgs for HerdSecure {
    fn to_cli_args(&self) -> Vec<String> {
        vec!["secure".to_string()]
    }

    fn working_dir(&self) -> Option<&Path> {
        Some(&self.site_dir)
    }

    fn verb(&self) -> &'static str {
        "secure"
    }
}

/// `herd unsecure <name>`, removing the certificate of a deleted site.
#[derive(Debug, Clone)]
pub struct HerdUnsecure {
    pub name: String,
}

impl ToolArgs for HerdUnsecure {
    fn to_cli_args(&self) -> Vec<String> {
        vec!["unsecure".to_string(), self.name.clone()]
    }

    fn verb(&self) -> &'static str {
        "unsecure"
    }
}

/// `herd help`, whose output carries a notice while the desktop app is down.
#[derive(Debug, Clone, Copy)]
pub struct HerdProbe;

impl ToolArgs for HerdProbe {
    fn to_cli_args(&self) -> Vec<String> {
        vec!["help".to_string()]
    }

    fn verb(&self) -> &'static str {
        "probe"
    }
}

/// Open a URL in the default browser.
///
/// `prefix` holds the launcher's leading arguments (`/C start ""` for
/// `cmd` on Windows, nothing for `open`/`xdg-open`).
#[derive(Debug, Clone)]
pub struct OpenUrl {
    pub prefix: Vec<String>,
    pub url: String,
}

impl ToolArgs for OpenUrl {
    fn to_cli_args(&self) -> Vec<String> {
        let mut args = self.prefix.clone();
        args.push(self.url.clone());
        args
    }

    fn verb(&self) -> &'static str {
        "open"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_runs_in_site_dir() {
        let args = HerdSecure {
            site_dir: PathBuf::from("/herd/my-blog"),
        };
        assert_eq!(args.to_cli_args(), vec!["secure"]);
        assert_eq!(args.working_dir(), Some(Path::new("/herd/my-blog")));
    }

    #[test]
    fn test_open_url_keeps_prefix() {
        let args = OpenUrl {
            prefix: vec!["/C".into(), "start".into(), String::new()],
            url: "https://blog.test/installer.php".into(),
        };
        assert_eq!(
            args.to_cli_args(),
            vec!["/C", "start", "", "https://blog.test/installer.php"]
        );
    }
}
