//! Site entity and name normalization.
//!
//! A site's directory name and database name are derived from the operator's
//! input by [`normalize_name`] and [`database_name`]. Every workflow goes
//! through [`Site::new`] or [`Site::existing`], so the two derivations cannot
//! drift apart between call sites.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HerdpressError, Result};

/// Table prefix used for fresh installs and when discovery finds nothing.
pub const DEFAULT_TABLE_PREFIX: &str = "wp_";

/// Credentials file written into the site root.
pub const CREDENTIALS_FILE: &str = "wp_credentials.txt";

/// MySQL identifiers are limited to 64 characters.
const MAX_NAME_LEN: usize = 64;

/// WordPress administrator identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl Default for AdminCredentials {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "admin".to_string(),
            email: "admin@example.com".to_string(),
        }
    }
}

/// Normalize operator input into the directory/URL form of a site name.
///
/// Lowercases, turns whitespace, underscores and dots into hyphens, drops any
/// other character outside `[a-z0-9-]`, collapses hyphen runs and trims
/// hyphens from both ends. `normalize_name(normalize_name(x)) == normalize_name(x)`.
pub fn normalize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars().flat_map(char::to_lowercase) {
        let mapped = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else if c.is_whitespace() || matches!(c, '-' | '_' | '.') {
            '-'
        } else {
            continue;
        };
        if mapped == '-' && (out.is_empty() || out.ends_with('-')) {
            continue;
        }
        out.push(mapped);
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Database name for a site name: the normalized name with underscores.
pub fn database_name(name: &str) -> String {
    normalize_name(name).replace('-', "_")
}

/// Normalize and validate a site name typed by the operator.
pub fn validate_name(raw: &str) -> Result<String> {
    let name = normalize_name(raw);
    if name.is_empty() {
        return Err(HerdpressError::validation(format!(
            "'{}' does not contain any usable characters",
            raw.trim()
        )));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(HerdpressError::validation(format!(
            "site name is longer than {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name)
}

/// One local WordPress site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub name: String,
    pub path: PathBuf,
    pub database: String,
    pub table_prefix: String,
    pub admin: AdminCredentials,
}

impl Site {
    /// A new site from operator input; the name is normalized and validated.
    pub fn new(raw_name: &str, sites_root: &Path, admin: AdminCredentials) -> Result<Self> {
        let name = validate_name(raw_name)?;
        Ok(Self {
            path: sites_root.join(&name),
            database: database_name(&name),
            name,
            table_prefix: DEFAULT_TABLE_PREFIX.to_string(),
            admin,
        })
    }

    /// A site that already exists on disk under `dir_name`.
    ///
    /// The directory is kept as found (it may predate normalization); the
    /// database name is still derived from it.
    pub fn existing(dir_name: &str, sites_root: &Path, admin: AdminCredentials) -> Self {
        Self {
            name: dir_name.to_string(),
            path: sites_root.join(dir_name),
            database: database_name(dir_name),
            table_prefix: DEFAULT_TABLE_PREFIX.to_string(),
            admin,
        }
    }

    /// Host name served by Herd (`my-blog.test`).
    pub fn host(&self, tld: &str) -> String {
        format!("{}.{}", normalize_name(&self.name), tld)
    }

    pub fn url(&self, tld: &str) -> String {
        format!("https://{}", self.host(tld))
    }

    pub fn config_file(&self) -> PathBuf {
        self.path.join("wp-config.php")
    }

    /// Human title used by `wp core install` (`my-blog` → `My Blog`).
    pub fn title(&self) -> String {
        normalize_name(&self.name)
            .split('-')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Write login URL and admin credentials to [`CREDENTIALS_FILE`].
    pub fn write_credentials(&self, tld: &str) -> Result<PathBuf> {
        let path = self.path.join(CREDENTIALS_FILE);
        let body = format!(
            "Login URL: {}/wp-admin\nUsername: {}\nPassword: {}\nEmail: {}\n",
            self.url(tld),
            self.admin.username,
            self.admin.password,
            self.admin.email
        );
        fs::write(&path, body)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_my_blog() {
        let site = Site::new("My Blog", Path::new("/herd"), AdminCredentials::default()).unwrap();
        assert_eq!(site.name, "my-blog");
        assert_eq!(site.path, PathBuf::from("/herd/my-blog"));
        assert_eq!(site.database, "my_blog");
        assert_eq!(site.table_prefix, "wp_");
        assert_eq!(site.url("test"), "https://my-blog.test");
        assert_eq!(site.title(), "My Blog");
    }

    #[test]
    fn test_normalize_collapses_and_trims() {
        assert_eq!(normalize_name("  Shop__Front  -- End "), "shop-front-end");
        assert_eq!(normalize_name("client.site"), "client-site");
        assert_eq!(normalize_name("Café Ünï"), "caf-n");
        assert_eq!(database_name("shop-front"), "shop_front");
    }

    #[test]
    fn test_validate_rejects_empty_and_long() {
        assert!(validate_name("   ").is_err());
        assert!(validate_name("!!!").is_err());
        assert!(validate_name(&"a".repeat(65)).is_err());
        assert_eq!(validate_name("Blog 2").unwrap(), "blog-2");
    }

    #[test]
    fn test_existing_keeps_directory_name() {
        let site = Site::existing("Old_Site", Path::new("/herd"), AdminCredentials::default());
        assert_eq!(site.path, PathBuf::from("/herd/Old_Site"));
        assert_eq!(site.database, "old_site");
        assert_eq!(site.host("test"), "old-site.test");
    }

    #[test]
    fn test_write_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let site = Site::new("blog", dir.path(), AdminCredentials::default()).unwrap();
        fs::create_dir_all(&site.path).unwrap();

        let path = site.write_credentials("test").unwrap();
        let body = fs::read_to_string(path).unwrap();
        assert!(body.starts_with("Login URL: https://blog.test/wp-admin\n"));
        assert!(body.contains("Username: admin\n"));
        assert!(body.contains("Email: admin@example.com\n"));
    }
}
