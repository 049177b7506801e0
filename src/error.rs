//! Error handling module for herdpress
//!
//! Provides centralized error handling with proper error types using thiserror.
//! The variants follow the workflow taxonomy: validation errors are recoverable
//! by re-prompting, precondition errors abort the workflow, command errors carry
//! the captured stderr of the failing tool, and partial-state errors mean a tool
//! reported success but the resulting state could not be confirmed.

use std::fmt;

use thiserror::Error;

/// Main error type for herdpress
#[derive(Error, Debug)]
pub enum HerdpressError {
    /// Invalid operator input (site name, selection, file type)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Site directory or database already exists
    #[error("Name collision: a site or database named '{name}' already exists")]
    NameCollision { name: String },

    /// Database server did not answer a trivial query
    #[error("Database unreachable: {0}")]
    DatabaseUnreachable(String),

    /// Site-manager service is not running
    #[error("Service not running: {0}")]
    ServiceNotRunning(String),

    /// Required external binary not found on PATH
    #[error("Missing required binary: {0}")]
    MissingBinary(String),

    /// A wrapped external tool exited non-zero
    #[error("{program} failed (exit code {code}): {stderr}")]
    Command {
        program: String,
        code: i32,
        stderr: String,
    },

    /// Tool succeeded but the expected state could not be confirmed
    #[error("Could not confirm state: {0}")]
    PartialState(String),

    /// Package catalog lookup failed for one slug
    #[error("Catalog lookup for '{slug}' failed: {reason}")]
    Catalog { slug: String, reason: String },

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Operator declined to continue at a confirmation point
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors (file operations, process spawning)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for herdpress operations
pub type Result<T> = std::result::Result<T, HerdpressError>;

impl HerdpressError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a partial-state error
    pub fn partial_state(msg: impl Into<String>) -> Self {
        Self::PartialState(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a catalog error for a slug
    pub fn catalog(slug: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Catalog {
            slug: slug.into(),
            reason: reason.into(),
        }
    }

    /// Whether the operator can fix this by answering the prompt again.
    ///
    /// Name collisions are recoverable inside interactive loops (pick another
    /// name) even though they abort a non-interactive run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NameCollision { .. })
    }
}

/// Per-site outcome of a batch workflow (delete, backup).
///
/// One site's failure never aborts the batch; it is recorded here instead.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, HerdpressError)>,
}

impl BatchReport {
    pub fn record(&mut self, site: &str, result: Result<()>) {
        match result {
            Ok(()) => self.succeeded.push(site.to_string()),
            Err(e) => {
                tracing::error!("{}: {}", site, e);
                self.failed.push((site.to_string(), e));
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed",
            self.succeeded.len(),
            self.failed.len()
        )?;
        for (site, err) in &self.failed {
            write!(f, "\n  ✗ {}: {}", site, err)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HerdpressError::validation("site name is empty");
        assert_eq!(err.to_string(), "Validation error: site name is empty");

        let err = HerdpressError::Command {
            program: "wp".to_string(),
            code: 1,
            stderr: "Error: This does not seem to be a WordPress installation.".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "wp failed (exit code 1): Error: This does not seem to be a WordPress installation."
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: HerdpressError = io_err.into();
        assert!(matches!(err, HerdpressError::Io(_)));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(HerdpressError::validation("bad").is_recoverable());
        assert!(
            HerdpressError::NameCollision {
                name: "blog".into()
            }
            .is_recoverable()
        );
        assert!(!HerdpressError::partial_state("no sql file").is_recoverable());
        assert!(!HerdpressError::DatabaseUnreachable("refused".into()).is_recoverable());
    }

    #[test]
    fn test_batch_report_counts_failures() {
        let mut report = BatchReport::default();
        report.record("a", Ok(()));
        report.record("b", Err(HerdpressError::partial_state("boom")));
        report.record("c", Ok(()));

        assert_eq!(report.succeeded, vec!["a", "c"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "b");
        assert!(!report.is_clean());
        assert!(report.to_string().starts_with("2 succeeded, 1 failed"));
    }
}
