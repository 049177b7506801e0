//! Type-safe external command contracts.
//!
//! Every verb herdpress sends to `wp`, `mysql`, `7z` or `herd` is a struct that
//! implements [`ToolArgs`]. The struct produces an argument vector; nothing is
//! ever interpolated into a shell string, so site names with spaces or quotes
//! cannot break a command line, and command construction can be unit tested
//! without spawning anything.

use std::fmt;
use std::path::{Path, PathBuf};

/// Trait for typed tool arguments.
///
/// # Contract
///
/// - `to_cli_args()`: the argument vector exactly as the tool expects it.
/// - `get_env_vars()`: extra environment variables (rarely needed).
/// - `working_dir()`: directory the tool must run in (`herd secure` binds the cwd).
/// - `stdin_file()`: file streamed to the tool's stdin (`mysql db < dump.sql`).
/// - `verb()`: short human label used in logs and error messages.
pub trait ToolArgs {
    fn to_cli_args(&self) -> Vec<String>;

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![]
    }

    fn working_dir(&self) -> Option<&Path> {
        None
    }

    fn stdin_file(&self) -> Option<&Path> {
        None
    }

    fn verb(&self) -> &'static str;
}

/// Flags whose values must never reach the logs.
const SECRET_FLAGS: &[&str] = &[
    "--password=",
    "--dbpass=",
    "--admin_password=",
    "--user_pass=",
];

/// A fully resolved external command, ready for a [`crate::command_runner::CommandRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub verb: &'static str,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    pub stdin: Option<PathBuf>,
}

impl Invocation {
    /// Bind typed arguments to a concrete executable.
    pub fn new<T: ToolArgs + ?Sized>(program: impl Into<String>, args: &T) -> Self {
        Self {
            program: program.into(),
            verb: args.verb(),
            args: args.to_cli_args(),
            env: args.get_env_vars(),
            cwd: args.working_dir().map(Path::to_path_buf),
            stdin: args.stdin_file().map(Path::to_path_buf),
        }
    }

    /// Whether the argument vector starts with the given words.
    ///
    /// `inv.starts_with(&["plugin", "list"])` matches `wp plugin list --status=active`.
    pub fn starts_with(&self, words: &[&str]) -> bool {
        self.args.len() >= words.len() && self.args.iter().zip(words).all(|(a, w)| a == w)
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// Value of a `--flag=value` argument.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        let prefix = format!("{}=", flag);
        self.args
            .iter()
            .find_map(|a| a.strip_prefix(prefix.as_str()))
    }

    /// Program file name without directory or extension (`wp`, `mysql`, `7z`).
    pub fn program_name(&self) -> &str {
        Path::new(&self.program)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.program)
    }

    /// Argument vector with secrets replaced, for logging.
    pub fn redacted_args(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                SECRET_FLAGS
                    .iter()
                    .find(|flag| arg.starts_with(*flag))
                    .map(|flag| format!("{}***", flag))
                    .unwrap_or_else(|| arg.clone())
            })
            .collect()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program_name())?;
        for arg in self.redacted_args() {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        if let Some(ref stdin) = self.stdin {
            write!(f, " < {}", stdin.display())?;
        }
        Ok(())
    }
}
