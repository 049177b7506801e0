//! Menu entries and run outcomes.

use strum::{Display, EnumIter};

use crate::error::BatchReport;

/// Entries of the interactive main menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum MenuAction {
    #[strum(serialize = "Create a site")]
    Create,
    #[strum(serialize = "Delete sites")]
    Delete,
    #[strum(serialize = "Back up sites")]
    Backup,
    #[strum(serialize = "Restore a backup")]
    Restore,
    #[strum(serialize = "List sites")]
    List,
    #[strum(serialize = "Quit")]
    Quit,
}

/// How a run ended, for the process exit code.
#[derive(Debug)]
pub enum Outcome {
    Done,
    Batch(BatchReport),
}

impl Outcome {
    /// 0 on success, 2 when a batch finished with failed sites.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Done => 0,
            Outcome::Batch(report) if report.is_clean() => 0,
            Outcome::Batch(_) => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HerdpressError;
    use strum::IntoEnumIterator;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Outcome::Done.exit_code(), 0);

        let mut report = BatchReport::default();
        report.record("a", Ok(()));
        assert_eq!(Outcome::Batch(report).exit_code(), 0);

        let mut report = BatchReport::default();
        report.record("a", Ok(()));
        report.record("b", Err(HerdpressError::validation("gone")));
        assert_eq!(Outcome::Batch(report).exit_code(), 2);
    }

    #[test]
    fn test_menu_labels() {
        let labels: Vec<String> = MenuAction::iter().map(|a| a.to_string()).collect();
        assert_eq!(labels.first().map(String::as_str), Some("Create a site"));
        assert_eq!(labels.last().map(String::as_str), Some("Quit"));
    }
}
