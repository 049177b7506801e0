//! Archive facade and the filesystem helpers that go with it.
//!
//! [`Archiver`] drives 7-Zip/tar. The free functions handle what happens
//! around an extraction: re-rooting a payload wrapped in an extra folder,
//! finding the newest file of a kind, copying a tree and clearing stray
//! artifacts before a new backup.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::command_runner::CommandRunner;
use crate::error::{HerdpressError, Result};
use crate::tool_args::Invocation;
use crate::tools::archive::{ArchiveFormat, SevenZipCompress, SevenZipExtract, TarExtract};

/// How deep re-rooting looks for a wrapped payload.
const REROOT_MAX_DEPTH: usize = 4;

pub struct Archiver<'a> {
    runner: &'a dyn CommandRunner,
    seven_zip: &'a str,
    tar: &'a str,
}

impl<'a> Archiver<'a> {
    pub fn new(runner: &'a dyn CommandRunner, seven_zip: &'a str, tar: &'a str) -> Self {
        Self {
            runner,
            seven_zip,
            tar,
        }
    }

    /// Extract `archive` into `dest`, creating `dest` if needed.
    pub fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        if !archive.is_file() {
            return Err(HerdpressError::validation(format!(
                "{} is not a file",
                archive.display()
            )));
        }
        let format = ArchiveFormat::detect(archive).ok_or_else(|| {
            HerdpressError::validation(format!(
                "{} is not a .zip, .7z, .tar or .tar.gz archive",
                archive.display()
            ))
        })?;
        fs::create_dir_all(dest)?;
        info!("Extracting {} into {}", archive.display(), dest.display());

        let output = if format.is_tarball() {
            let args = TarExtract {
                archive: archive.to_path_buf(),
                dest: dest.to_path_buf(),
                gzip: format == ArchiveFormat::TarGz,
            };
            self.runner
                .run(&Invocation::new(self.tar, &args))?
                .ensure_success("tar")?
        } else {
            let args = SevenZipExtract {
                archive: archive.to_path_buf(),
                dest: dest.to_path_buf(),
            };
            self.runner
                .run(&Invocation::new(self.seven_zip, &args))?
                .ensure_success("7z")?
        };
        debug!("extract output: {}", output.stdout.trim());
        Ok(())
    }

    /// Zip the contents of `source_dir` (not the directory itself).
    pub fn compress_dir(&self, source_dir: &Path, archive: &Path, excludes: &[String]) -> Result<()> {
        self.compress(source_dir, vec!["*".to_string()], archive, excludes)
    }

    /// Zip a single file.
    pub fn compress_file(&self, file: &Path, archive: &Path) -> Result<()> {
        let (Some(dir), Some(name)) = (file.parent(), file.file_name()) else {
            return Err(HerdpressError::validation(format!(
                "{} is not a file path",
                file.display()
            )));
        };
        self.compress(dir, vec![name.to_string_lossy().to_string()], archive, &[])
    }

    fn compress(
        &self,
        source_dir: &Path,
        entries: Vec<String>,
        archive: &Path,
        excludes: &[String],
    ) -> Result<()> {
        if let Some(parent) = archive.parent() {
            fs::create_dir_all(parent)?;
        }
        info!("Compressing {} into {}", source_dir.display(), archive.display());
        let args = SevenZipCompress {
            archive: archive.to_path_buf(),
            source_dir: source_dir.to_path_buf(),
            entries,
            excludes: excludes.to_vec(),
        };
        self.runner
            .run(&Invocation::new(self.seven_zip, &args))?
            .ensure_success("7z")?;
        Ok(())
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// Make `marker` sit directly under `root`.
///
/// When the marker is already there nothing happens. Otherwise the shallowest
/// directory below `root` holding the marker is flattened into `root` and the
/// emptied wrapper directories are removed. Fails closed when no marker is
/// found or when two candidates sit at the same depth.
pub fn reroot(root: &Path, marker: &str) -> Result<()> {
    if root.join(marker).is_file() {
        return Ok(());
    }

    let mut candidates: Vec<(usize, PathBuf)> = WalkDir::new(root)
        .min_depth(2)
        .max_depth(REROOT_MAX_DEPTH)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == marker)
        .filter_map(|e| Some((e.depth(), e.path().parent()?.to_path_buf())))
        .collect();
    candidates.sort();

    let (depth, wrapper) = match candidates.as_slice() {
        [] => {
            return Err(HerdpressError::partial_state(format!(
                "no {} found under {}",
                marker,
                root.display()
            )));
        }
        [(d1, _), (d2, _), ..] if d1 == d2 => {
            return Err(HerdpressError::partial_state(format!(
                "several directories under {} contain {}",
                root.display(),
                marker
            )));
        }
        [first, ..] => first.clone(),
    };
    info!(
        "Re-rooting {} from {} (depth {})",
        root.display(),
        wrapper.display(),
        depth - 1
    );

    // Park the wrapper under a unique name so a child sharing its name can move up
    let staging = root.join(format!(".herdpress-reroot-{}", std::process::id()));
    fs::rename(&wrapper, &staging)?;

    for entry in fs::read_dir(&staging)? {
        let entry = entry?;
        let target = root.join(entry.file_name());
        if target.exists() {
            return Err(HerdpressError::partial_state(format!(
                "cannot re-root: {} already exists",
                target.display()
            )));
        }
        fs::rename(entry.path(), target)?;
    }
    fs::remove_dir(&staging)?;

    // Remove the now-empty ancestors of the old wrapper, innermost first
    let mut dir = wrapper.parent();
    while let Some(current) = dir {
        if current == root {
            break;
        }
        if fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }

    Ok(())
}

/// Most recently modified file with `extension` anywhere under `root`.
pub fn find_most_recent(root: &Path, extension: &str) -> Result<Option<PathBuf>> {
    let mut best: Option<(SystemTime, PathBuf)> = None;
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() || !has_extension(entry.path(), extension) {
            continue;
        }
        let modified = entry.metadata().map_err(std::io::Error::from)?.modified()?;
        if best.as_ref().is_none_or(|(t, _)| modified > *t) {
            best = Some((modified, entry.into_path()));
        }
    }
    Ok(best.map(|(_, p)| p))
}

/// Recursively copy `src` into `dest`, overwriting files that exist.
pub fn copy_dir(src: &Path, dest: &Path) -> Result<u64> {
    let mut copied = 0;
    for entry in WalkDir::new(src).into_iter() {
        let entry = entry.map_err(std::io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| HerdpressError::partial_state(e.to_string()))?;
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    debug!("Copied {} files from {} to {}", copied, src.display(), dest.display());
    Ok(copied)
}

/// Delete files with `extension` under `dir`, at most `max_depth` levels deep.
///
/// A missing directory has nothing to delete.
pub fn remove_files_with_extension(dir: &Path, extension: &str, max_depth: usize) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.file_type().is_file() && has_extension(entry.path(), extension) {
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Could not remove {}: {}", entry.path().display(), e),
            }
        }
    }
    Ok(removed)
}
