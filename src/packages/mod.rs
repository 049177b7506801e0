//! Package resolution: catalog lookup plus the cache-checked download.
//!
//! A slug resolves to a local file. The download happens only when the cache
//! has no entry, the cached file is gone, or the catalog reports a newer
//! version; the cache index is updated only after the file has been fully
//! written under its final name.

pub mod cache;
pub mod catalog;

use std::fs;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::error::{HerdpressError, Result};

pub use cache::{CacheEntry, DownloadCache};
pub use catalog::{Catalog, Downloader, HttpCatalog, HttpDownloader, Release};

/// Reserved slug for the WordPress core package.
pub const CORE_SLUG: &str = "wordpress";

/// A resolved theme, plugin or core package available on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub slug: String,
    pub version: String,
    pub file: PathBuf,
    /// Whether this run downloaded the file
    pub downloaded: bool,
}

/// Outcome of resolving several slugs; one slug's failure never hides the others.
#[derive(Debug, Default)]
pub struct Resolution {
    pub packages: Vec<Package>,
    pub failures: Vec<(String, HerdpressError)>,
}

impl Resolution {
    /// What to hand `wp ... install` for `slug`: the cached file when it
    /// resolved, otherwise the slug itself for the public directory.
    pub fn source_for(&self, slug: &str) -> String {
        self.packages
            .iter()
            .find(|p| p.slug == slug)
            .map(|p| p.file.display().to_string())
            .unwrap_or_else(|| slug.to_string())
    }
}

pub struct PackageResolver<'a> {
    catalog: &'a dyn Catalog,
    downloader: &'a dyn Downloader,
    cache: DownloadCache,
}

impl<'a> PackageResolver<'a> {
    pub fn new(catalog: &'a dyn Catalog, downloader: &'a dyn Downloader, cache: DownloadCache) -> Self {
        Self {
            catalog,
            downloader,
            cache,
        }
    }

    pub fn cache(&self) -> &DownloadCache {
        &self.cache
    }

    /// Resolve one slug to a file in the cache directory.
    ///
    /// When the catalog cannot be reached but a cached file exists, the
    /// cached file is used with a warning.
    pub fn resolve(&mut self, slug: &str) -> Result<Package> {
        let release = match self.catalog.latest(slug) {
            Ok(release) => release,
            Err(e) => {
                if let (Some(entry), Some(file)) =
                    (self.cache.get(slug).cloned(), self.cache.cached_file(slug))
                {
                    warn!("{}: catalog unavailable ({}), using cached {}", slug, e, entry.version);
                    return Ok(Package {
                        slug: slug.to_string(),
                        version: entry.version,
                        file,
                        downloaded: false,
                    });
                }
                return Err(e);
            }
        };

        if !self.cache.needs_download(slug, &release.version) {
            if let Some(file) = self.cache.cached_file(slug) {
                info!("{} {} is up to date in the cache", slug, release.version);
                return Ok(Package {
                    slug: slug.to_string(),
                    version: release.version,
                    file,
                    downloaded: false,
                });
            }
        }

        if release.download_url.is_empty() {
            return Err(HerdpressError::catalog(slug, "catalog returned no download URL"));
        }
        let dest = self.cache.slug_dir(slug);
        fs::create_dir_all(&dest)?;
        let file = self.downloader.download(&release.download_url, &dest)?;
        let file_name = file
            .strip_prefix(self.cache.dir())
            .ok()
            .and_then(|relative| relative.to_str())
            .map(|relative| relative.replace('\\', "/"))
            .ok_or_else(|| HerdpressError::catalog(slug, "download landed outside the cache"))?;
        self.cache.record(slug, &release.version, &file_name)?;
        info!("{} {} downloaded", slug, release.version);

        Ok(Package {
            slug: slug.to_string(),
            version: release.version,
            file,
            downloaded: true,
        })
    }

    /// Resolve every slug in order, collecting failures instead of stopping.
    pub fn resolve_many(&mut self, slugs: &[String]) -> Resolution {
        let mut resolution = Resolution::default();
        for slug in slugs {
            match self.resolve(slug) {
                Ok(package) => resolution.packages.push(package),
                Err(e) => {
                    warn!("Could not resolve {}: {}", slug, e);
                    resolution.failures.push((slug.clone(), e));
                }
            }
        }
        resolution
    }
}
