//! Remote package catalog and HTTP downloads.
//!
//! Premium themes and plugins come from a license-keyed catalog; the core
//! package comes from the public version-check endpoint. Both sit behind the
//! [`Catalog`] trait, downloads behind [`Downloader`], so the resolver can be
//! exercised without a network.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_DISPOSITION;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::CatalogConfig;
use crate::error::{HerdpressError, Result};
use crate::packages::CORE_SLUG;

const USER_AGENT: &str = concat!("herdpress/", env!("CARGO_PKG_VERSION"));

/// File name used when neither the response nor the URL carries one.
pub const FALLBACK_FILE_NAME: &str = "download.zip";

/// Latest release of one slug as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub slug: String,
    pub version: String,
    pub download_url: String,
}

/// Source of the latest version and download URL for a slug.
pub trait Catalog {
    fn latest(&self, slug: &str) -> Result<Release>;
}

/// Fetches a URL into a directory and returns the written file.
///
/// Implementations must never leave a partially written file under the
/// final name.
pub trait Downloader {
    fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf>;
}

#[derive(Debug, Deserialize)]
struct PackageMetadata {
    version: String,
    download_url: String,
}

#[derive(Debug, Deserialize)]
struct CoreVersionCheck {
    offers: Vec<CoreOffer>,
}

#[derive(Debug, Deserialize)]
struct CoreOffer {
    version: String,
    download: String,
}

/// Catalog client over HTTPS.
pub struct HttpCatalog {
    client: Client,
    config: CatalogConfig,
}

impl HttpCatalog {
    pub fn new(config: CatalogConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, config })
    }

    fn core_release(&self) -> Result<Release> {
        let check: CoreVersionCheck = self
            .client
            .get(&self.config.core_version_url)
            .send()?
            .error_for_status()?
            .json()?;
        let offer = check
            .offers
            .into_iter()
            .next()
            .ok_or_else(|| HerdpressError::catalog(CORE_SLUG, "version check returned no offers"))?;
        Ok(Release {
            slug: CORE_SLUG.to_string(),
            version: offer.version,
            download_url: offer.download,
        })
    }
}

impl Catalog for HttpCatalog {
    fn latest(&self, slug: &str) -> Result<Release> {
        if slug == CORE_SLUG {
            return self.core_release();
        }
        if self.config.base_url.is_empty() {
            return Err(HerdpressError::catalog(slug, "no catalog base_url configured"));
        }

        let url = self.config.package_url(slug);
        debug!("Querying catalog for {}", slug);
        let response = self.client.get(&url).send()?;
        if !response.status().is_success() {
            return Err(HerdpressError::catalog(
                slug,
                format!("catalog answered {}", response.status()),
            ));
        }
        let meta: PackageMetadata = response.json()?;
        Ok(Release {
            slug: slug.to_string(),
            version: meta.version,
            download_url: meta.download_url,
        })
    }
}

/// Streaming downloader over HTTPS.
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
        let mut response = self.client.get(url).send()?.error_for_status()?;

        let name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .or_else(|| filename_from_url(url))
            .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string());

        fs::create_dir_all(dest_dir)?;
        let target = dest_dir.join(&name);
        let partial = dest_dir.join(format!("{}.part", name));

        info!("Downloading {}", name);
        let written = (|| -> io::Result<u64> {
            let mut file = File::create(&partial)?;
            let n = io::copy(&mut response, &mut file)?;
            file.sync_all()?;
            Ok(n)
        })();
        match written {
            Ok(bytes) => {
                fs::rename(&partial, &target)?;
                debug!("Wrote {} bytes to {}", bytes, target.display());
                Ok(target)
            }
            Err(e) => {
                let _ = fs::remove_file(&partial);
                Err(e.into())
            }
        }
    }
}

/// Only the final path component survives, so a hostile header cannot
/// write outside the cache directory.
fn sanitize(name: &str) -> Option<String> {
    let name = name.trim().rsplit(['/', '\\']).next()?.trim();
    (!name.is_empty() && name != "." && name != "..").then(|| name.to_string())
}

/// File name from a `Content-Disposition` header value.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = RE
        .get_or_init(|| Regex::new(r#"(?i)filename\*?=(?:UTF-8'')?"?([^";]+)"?"#).ok())
        .as_ref()?;
    let captured = re.captures(value)?.get(1)?.as_str();
    sanitize(captured)
}

/// Last path segment of a URL, ignoring the query string.
pub fn filename_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let path = path.split_once("://").map(|(_, rest)| rest).unwrap_or(path);
    let (_, segment) = path.rsplit_once('/')?;
    sanitize(segment).filter(|s| s.contains('.'))
}
