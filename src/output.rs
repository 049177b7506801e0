//! Structured-output adapters for tool stdout.
//!
//! Each tabular verb declares its column layout as a [`Layout`]. Parsing
//! skips the header row and fails closed when a row does not match the
//! declared shape, so a changed tool output surfaces as an error instead of
//! a silently wrong ID.

use std::path::PathBuf;

use crate::error::{HerdpressError, Result};

/// Marker line printed by the backup plugin once its archive is written.
pub const BACKUP_LOCATION_MARKER: &str = "Backup location:";

/// Declared column layout of one verb's tabular output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub name: &'static str,
    pub columns: usize,
    pub delimiter: char,
    /// Fields may be wrapped in double quotes (CSV)
    pub quoted: bool,
}

/// `mysql --batch -e "SHOW TABLES ... LIKE ..."`
pub const SHOW_TABLES: Layout = Layout {
    name: "SHOW TABLES",
    columns: 1,
    delimiter: '\t',
    quoted: false,
};

/// `mysql --batch -e "SHOW DATABASES LIKE ..."`
pub const SHOW_DATABASES: Layout = Layout {
    name: "SHOW DATABASES",
    columns: 1,
    delimiter: '\t',
    quoted: false,
};

/// `wp user list --fields=ID,user_login --format=csv`
pub const USER_LIST: Layout = Layout {
    name: "user list",
    columns: 2,
    delimiter: ',',
    quoted: true,
};

impl Layout {
    /// Data rows of `stdout`, header skipped.
    ///
    /// Empty output is an empty table (mysql prints no header for an empty
    /// result set).
    pub fn rows(&self, stdout: &str) -> Result<Vec<Vec<String>>> {
        let mut lines = stdout.lines().filter(|l| !l.trim().is_empty());

        let Some(header) = lines.next() else {
            return Ok(Vec::new());
        };
        let header_fields = self.split(header).len();
        if header_fields != self.columns {
            return Err(HerdpressError::partial_state(format!(
                "{}: expected {} column(s), header has {}",
                self.name, self.columns, header_fields
            )));
        }

        lines
            .map(|line| {
                let fields = self.split(line);
                if fields.len() == self.columns {
                    Ok(fields)
                } else {
                    Err(HerdpressError::partial_state(format!(
                        "{}: malformed row {:?}",
                        self.name, line
                    )))
                }
            })
            .collect()
    }

    /// Split one line into trimmed fields.
    ///
    /// With `quoted` set, a delimiter inside double quotes belongs to the
    /// field and `""` stands for one quote.
    fn split(&self, line: &str) -> Vec<String> {
        let line = line.trim_end_matches('\r');
        if !self.quoted {
            return line.split(self.delimiter).map(|f| f.trim().to_string()).collect();
        }

        let mut fields = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '"' if in_quotes && chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' if in_quotes => in_quotes = false,
                '"' if field.trim().is_empty() => {
                    field.clear();
                    in_quotes = true;
                }
                c if c == self.delimiter && !in_quotes => {
                    fields.push(field.trim().to_string());
                    field.clear();
                }
                c => field.push(c),
            }
        }
        fields.push(field.trim().to_string());
        fields
    }

    /// First column of every data row.
    pub fn first_column(&self, stdout: &str) -> Result<Vec<String>> {
        Ok(self
            .rows(stdout)?
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .collect())
    }
}

/// Non-empty trimmed lines, for `--field=<name>` style output.
pub fn names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Path printed after the backup plugin's location marker.
pub fn backup_location(stdout: &str) -> Option<PathBuf> {
    stdout.lines().find_map(|line| {
        let (_, rest) = line.split_once(BACKUP_LOCATION_MARKER)?;
        let path = rest.trim();
        (!path.is_empty()).then(|| PathBuf::from(path))
    })
}
