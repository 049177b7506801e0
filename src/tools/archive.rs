//! Type-safe arguments for the archive tools.
//!
//! Zip and 7z archives go through 7-Zip; tarballs go through `tar`, since 7-Zip
//! needs two passes for a `.tar.gz`.

use std::path::{Path, PathBuf};

use crate::tool_args::ToolArgs;

/// Archive container recognised from the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    SevenZip,
    TarGz,
    Tar,
}

impl ArchiveFormat {
    /// Detect the format from a file name, case-insensitively.
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".7z") {
            Some(Self::SevenZip)
        } else {
            None
        }
    }

    /// Whether the archive is handled by `tar` rather than 7-Zip.
    pub fn is_tarball(self) -> bool {
        matches!(self, Self::TarGz | Self::Tar)
    }
}

/// `7z x <archive> -o<dest> -y`
#[derive(Debug, Clone)]
pub struct SevenZipExtract {
    pub archive: PathBuf,
    pub dest: PathBuf,
}

impl ToolArgs for SevenZipExtract {
    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "x".to_string(),
            self.archive.display().to_string(),
            // 7-Zip takes the output directory glued to the switch
            format!("-o{}", self.dest.display()),
            "-y".to_string(),
        ]
    }

    fn verb(&self) -> &'static str {
        "extract"
    }
}

/// `7z a -tzip <archive> <entries...> -x!<pattern>...`, run inside `source_dir`.
///
/// Exclude patterns containing a `/` are anchored at the archive root;
/// bare names (`.git`, `*.log`) match at any depth.
#[derive(Debug, Clone)]
pub struct SevenZipCompress {
    pub archive: PathBuf,
    pub source_dir: PathBuf,
    /// Entries relative to `source_dir`; `*` archives the whole directory
    pub entries: Vec<String>,
    pub excludes: Vec<String>,
}

impl ToolArgs for SevenZipCompress {
    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec![
            "a".to_string(),
            "-tzip".to_string(),
            "-mx=5".to_string(),
            self.archive.display().to_string(),
        ];
        args.extend(self.entries.iter().cloned());
        for pattern in &self.excludes {
            let pattern = pattern.trim_matches('/');
            if pattern.contains('/') {
                args.push(format!("-x!{}", pattern));
            } else {
                args.push(format!("-xr!{}", pattern));
            }
        }
        args
    }

    fn working_dir(&self) -> Option<&Path> {
        Some(&self.source_dir)
    }

    fn verb(&self) -> &'static str {
        "compress"
    }
}

/// `tar -x[z]f <archive> -C <dest>`
#[derive(Debug, Clone)]
pub struct TarExtract {
    pub archive: PathBuf,
    pub dest: PathBuf,
    pub gzip: bool,
}

impl ToolArgs for TarExtract {
    fn to_cli_args(&self) -> Vec<String> {
        vec![
            if self.gzip { "-xzf" } else { "-xf" }.to_string(),
            self.archive.display().to_string(),
            "-C".to_string(),
            self.dest.display().to_string(),
        ]
    }

    fn verb(&self) -> &'static str {
        "extract"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(
            ArchiveFormat::detect(Path::new("/b/site.tar.gz")),
            Some(ArchiveFormat::TarGz)
        );
        assert_eq!(
            ArchiveFormat::detect(Path::new("SITE.ZIP")),
            Some(ArchiveFormat::Zip)
        );
        assert_eq!(
            ArchiveFormat::detect(Path::new("x.tgz")),
            Some(ArchiveFormat::TarGz)
        );
        assert_eq!(ArchiveFormat::detect(Path::new("x.wpress")), None);
        assert!(ArchiveFormat::Tar.is_tarball());
        assert!(!ArchiveFormat::SevenZip.is_tarball());
    }

    #[test]
    fn test_extract_output_switch_is_glued() {
        let args = SevenZipExtract {
            archive: PathBuf::from("/b/blog.zip"),
            dest: PathBuf::from("/herd/blog"),
        };
        assert_eq!(args.to_cli_args(), vec!["x", "/b/blog.zip", "-o/herd/blog", "-y"]);
    }

    #[test]
    fn test_compress_excludes() {
        let args = SevenZipCompress {
            archive: PathBuf::from("/b/blog.zip"),
            source_dir: PathBuf::from("/herd/blog"),
            entries: vec!["*".into()],
            excludes: vec![".git".into(), "wp-content/cache/".into(), "*.log".into()],
        };
        let cli = args.to_cli_args();
        assert_eq!(&cli[..5], ["a", "-tzip", "-mx=5", "/b/blog.zip", "*"]);
        assert!(cli.contains(&"-xr!.git".to_string()));
        assert!(cli.contains(&"-x!wp-content/cache".to_string()));
        assert!(cli.contains(&"-xr!*.log".to_string()));
        assert_eq!(args.working_dir(), Some(Path::new("/herd/blog")));
    }

    #[test]
    fn test_tar_extract() {
        let args = TarExtract {
            archive: PathBuf::from("a.tgz"),
            dest: PathBuf::from("/d"),
            gzip: true,
        };
        assert_eq!(args.to_cli_args(), vec!["-xzf", "a.tgz", "-C", "/d"]);
    }
}
