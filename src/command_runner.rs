//! External command execution
//!
//! All external tools are executed through a [`CommandRunner`]. The production
//! runner ([`SystemRunner`]) spawns each tool in its own process group, registers
//! the PID with the global [`ChildRegistry`] and blocks until the tool exits.
//! [`RecordingRunner`] executes nothing: it records every invocation and answers
//! from scripted handlers. It backs `--dry-run` and the test suite.

use std::fs::File;
use std::process::{Command, Stdio};
use std::sync::Mutex;

use tracing::{debug, info};

use crate::error::{HerdpressError, Result};
use crate::process_guard::{ChildRegistry, CommandProcessGroup};
use crate::tool_args::Invocation;

/// Executes an external command to completion.
///
/// Implementations must be shareable across the short-lived scoped threads
/// used for independent fan-out updates.
pub trait CommandRunner: Send + Sync {
    /// Run the command and capture its output.
    ///
    /// A non-zero exit is NOT an error at this level; callers decide through
    /// [`CommandOutput::ensure_success`]. `Err` means the process could not be
    /// started at all.
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;
}

/// Output from an external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    pub success: bool,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
            success: true,
        }
    }

    /// Failed output with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(code),
            success: false,
        }
    }

    /// Turn a non-zero exit into a typed command error carrying stderr.
    pub fn ensure_success(self, program: &str) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            let stderr = if self.stderr.trim().is_empty() {
                self.stdout.trim().to_string()
            } else {
                self.stderr.trim().to_string()
            };
            Err(HerdpressError::Command {
                program: program.to_string(),
                code: self.exit_code.unwrap_or(-1),
                stderr,
            })
        }
    }
}

/// Runs commands on the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        info!("exec: {}", invocation);

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .in_new_process_group();

        match invocation.stdin {
            Some(ref path) => {
                cmd.stdin(Stdio::from(File::open(path)?));
            }
            None => {
                // Tools are non-interactive; an inherited stdin would let them hang on a prompt
                cmd.stdin(Stdio::null());
            }
        }
        if let Some(ref dir) = invocation.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HerdpressError::MissingBinary(invocation.program.clone())
            } else {
                HerdpressError::Io(e)
            }
        })?;
        let pid = child.id();
        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.register(pid);
        }

        let output = child.wait_with_output();

        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.unregister(pid);
        }
        let output = output?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
            success: output.status.success(),
        };
        debug!(
            "{} {} exited with {:?}",
            invocation.program_name(),
            invocation.verb,
            result.exit_code
        );
        Ok(result)
    }
}

type Handler = Box<dyn Fn(&Invocation) -> Option<CommandOutput> + Send + Sync>;

/// Records invocations instead of running them.
///
/// Handlers are consulted in registration order; the first one returning
/// `Some` answers. Unanswered invocations succeed with empty output. A handler
/// may also touch the filesystem to simulate a tool's side effects.
pub struct RecordingRunner {
    handlers: Vec<Handler>,
    log: Mutex<Vec<Invocation>>,
    echo: bool,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            log: Mutex::new(Vec::new()),
            echo: false,
        }
    }

    /// Dry-run mode: print each command instead of executing it.
    pub fn dry_run() -> Self {
        Self {
            echo: true,
            ..Self::new()
        }
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Invocation) -> Option<CommandOutput> + Send + Sync + 'static,
    {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Answer every invocation whose arguments start with `words`.
    pub fn respond(self, program: &'static str, words: &[&str], output: CommandOutput) -> Self {
        let words: Vec<String> = words.iter().map(|w| w.to_string()).collect();
        self.with_handler(move |inv| {
            let refs: Vec<&str> = words.iter().map(String::as_str).collect();
            (inv.program_name() == program && inv.starts_with(&refs)).then(|| output.clone())
        })
    }

    /// Every invocation seen so far, in order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Invocations of one program, rendered without the program name.
    pub fn calls_to(&self, program: &str) -> Vec<String> {
        self.invocations()
            .into_iter()
            .filter(|inv| inv.program_name() == program)
            .map(|inv| inv.args.join(" "))
            .collect()
    }
}

impl Default for RecordingRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        if self.echo {
            println!("  [dry-run] {}", invocation);
        }
        if let Ok(mut log) = self.log.lock() {
            log.push(invocation.clone());
        }
        Ok(self
            .handlers
            .iter()
            .find_map(|handler| handler(invocation))
            .unwrap_or_else(|| CommandOutput::ok("")))
    }
}
