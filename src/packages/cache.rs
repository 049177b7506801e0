//! Persistent download cache.
//!
//! The cache directory holds the downloaded package files plus one JSON index
//! mapping `slug -> {version, file_name}`. The index is the only state herdpress
//! keeps between runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Index file name inside the cache directory.
pub const INDEX_FILE: &str = "packages.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub version: String,
    pub file_name: String,
}

#[derive(Debug)]
pub struct DownloadCache {
    dir: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
}

/// Parse loosely versioned strings (`6.5`, `v3.21.0`, `2.1.4.1`) as semver.
///
/// Missing components are zero-filled; a fourth numeric component is kept as
/// build metadata so it is at least parseable.
pub fn parse_version(raw: &str) -> Option<Version> {
    let raw = raw.trim().trim_start_matches(['v', 'V']);
    if let Ok(v) = Version::parse(raw) {
        return Some(v);
    }
    let (core, rest) = match raw.find(['-', '+']) {
        Some(i) => raw.split_at(i),
        None => (raw, ""),
    };
    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.iter().any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }
    let extra = if parts.len() > 3 {
        parts.split_off(3).join(".")
    } else {
        String::new()
    };
    while parts.len() < 3 {
        parts.push("0");
    }
    let mut text = parts.join(".");
    text.push_str(rest);
    if !extra.is_empty() && !rest.contains('+') {
        text.push('+');
        text.push_str(&extra);
    }
    Version::parse(&text).ok()
}

/// Whether `cached` is older than `latest`.
///
/// Semantic ordering when both parse, otherwise any difference counts as
/// stale. For four-component versions the fourth part breaks ties.
pub fn is_older(cached: &str, latest: &str) -> bool {
    match (parse_version(cached), parse_version(latest)) {
        (Some(c), Some(l)) => match c.cmp_precedence(&l) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => {
                build_number(&c) < build_number(&l)
            }
        },
        _ => cached.trim() != latest.trim(),
    }
}

fn build_number(v: &Version) -> Vec<u64> {
    v.build
        .as_str()
        .split('.')
        .filter_map(|p| p.parse().ok())
        .collect()
}

impl DownloadCache {
    /// Open (or create) the cache in `dir`. An unreadable index starts empty.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let index = dir.join(INDEX_FILE);
        let entries = match fs::read_to_string(&index) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Ignoring unreadable cache index {}: {}", index.display(), e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };

        Ok(Self { dir, entries })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn get(&self, slug: &str) -> Option<&CacheEntry> {
        self.entries.get(slug)
    }

    /// Directory a download of `slug` is written to.
    ///
    /// Each slug gets its own folder so two packages served under the same
    /// file name never overwrite each other.
    pub fn slug_dir(&self, slug: &str) -> PathBuf {
        let folder: String = slug
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(folder)
    }

    /// Path of the cached file for `slug`, if it is recorded and on disk.
    pub fn cached_file(&self, slug: &str) -> Option<PathBuf> {
        let entry = self.entries.get(slug)?;
        let path = self.dir.join(&entry.file_name);
        path.is_file().then_some(path)
    }

    /// Download iff there is no entry, the file is gone, or the cached
    /// version is older than `latest`.
    pub fn needs_download(&self, slug: &str, latest: &str) -> bool {
        let Some(entry) = self.entries.get(slug) else {
            debug!("{}: not cached", slug);
            return true;
        };
        if !self.dir.join(&entry.file_name).is_file() {
            debug!("{}: cached file {} is missing", slug, entry.file_name);
            return true;
        }
        let stale = is_older(&entry.version, latest);
        debug!(
            "{}: cached {} vs latest {} (stale: {})",
            slug, entry.version, latest, stale
        );
        stale
    }

    /// Record a completed download and persist the index.
    ///
    /// `file_name` is relative to the cache directory.
    pub fn record(&mut self, slug: &str, version: &str, file_name: &str) -> Result<()> {
        self.entries.insert(
            slug.to_string(),
            CacheEntry {
                version: version.to_string(),
                file_name: file_name.to_string(),
            },
        );
        self.save()
    }

    fn save(&self) -> Result<()> {
        let index = self.dir.join(INDEX_FILE);
        let tmp = self.dir.join(format!("{}.tmp", INDEX_FILE));
        fs::write(&tmp, serde_json::to_string_pretty(&self.entries)?)?;
        fs::rename(&tmp, &index)?;
        Ok(())
    }
}
