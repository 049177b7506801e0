//! Installed-site enumeration and selection parsing.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{HerdpressError, Result};
use crate::site::normalize_name;

/// The directory tree of local sites; one sub-directory per site.
#[derive(Debug, Clone)]
pub struct SiteRegistry {
    root: PathBuf,
}

impl SiteRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Site directory names in lexical order. Hidden directories are skipped
    /// and a missing root is an empty registry.
    pub fn list_sites(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// A site exists iff its directory exists, whatever the database says.
    pub fn exists(&self, name: &str) -> bool {
        self.root.join(name).is_dir() || self.root.join(normalize_name(name)).is_dir()
    }

    /// Resolve a selection string against the current listing.
    pub fn select(&self, input: &str) -> Result<Vec<String>> {
        let names = self.list_sites()?;
        select_from(&names, input)
    }
}

/// Pick entries of `names` by a selection string (see [`parse_selection`]).
pub fn select_from(names: &[String], input: &str) -> Result<Vec<String>> {
    Ok(parse_selection(input, names.len())?
        .into_iter()
        .map(|index| names[index - 1].clone())
        .collect())
}

fn parse_index(token: &str, total: usize) -> Result<usize> {
    let index: usize = token
        .trim()
        .parse()
        .map_err(|_| HerdpressError::validation(format!("'{}' is not a number", token)))?;
    if index < 1 || index > total {
        return Err(HerdpressError::validation(format!(
            "{} is out of range (1-{})",
            index, total
        )));
    }
    Ok(index)
}

/// Parse a free-form selection into 1-based indices.
///
/// Accepts numbers and inclusive ranges (`a-b`, swapped when `a > b`)
/// separated by commas and/or whitespace. `0` selects everything.
/// Duplicates are dropped, keeping the order of first occurrence.
pub fn parse_selection(input: &str, total: usize) -> Result<Vec<usize>> {
    if total == 0 {
        return Err(HerdpressError::validation("there is nothing to select"));
    }

    let tokens: Vec<&str> = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return Err(HerdpressError::validation("no selection entered"));
    }

    let mut selected: Vec<usize> = Vec::new();
    fn push(index: usize, selected: &mut Vec<usize>) {
        if !selected.contains(&index) {
            selected.push(index);
        }
    }

    for token in tokens {
        if token == "0" {
            for index in 1..=total {
                push(index, &mut selected);
            }
            continue;
        }

        match token.split_once('-') {
            Some((start, end)) => {
                let mut start = parse_index(start, total)?;
                let mut end = parse_index(end, total)?;
                if start > end {
                    std::mem::swap(&mut start, &mut end);
                }
                for index in start..=end {
                    push(index, &mut selected);
                }
            }
            None => push(parse_index(token, total)?, &mut selected),
        }
    }

    Ok(selected)
}
