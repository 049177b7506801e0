//! Process lifecycle management for external tools
//!
//! Every `wp`, `mysql`, `7z` and `herd` child is tracked so that an operator
//! pressing Ctrl+C in the middle of an import or an archive run does not leave
//! the tool running against a half-restored site.
//!
//! - Children are spawned in their own process group (Unix)
//! - Child PIDs live in a global registry while they run
//! - On SIGINT/SIGTERM/SIGHUP (or Ctrl+C elsewhere) all children are terminated,
//!   SIGTERM first and SIGKILL after a grace period

use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// Registry tracking all spawned child processes
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: HashSet<u32>,
    /// Whether cleanup has already been initiated (prevent double-cleanup)
    cleanup_initiated: bool,
}

impl ChildRegistry {
    /// Get or create the global child registry
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        debug!("Registered child process PID {}", pid);
    }

    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        debug!("Unregistered child process PID {}", pid);
    }

    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// Terminate all tracked child processes.
    /// Sends a polite signal first, waits up to `grace_period`, then kills.
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if self.cleanup_initiated {
            debug!("Cleanup already initiated, skipping");
            return;
        }
        self.cleanup_initiated = true;

        if self.pids.is_empty() {
            debug!("No child processes to terminate");
            return;
        }

        info!("Terminating {} child process(es)...", self.pids.len());

        let pids: Vec<u32> = self.pids.iter().copied().collect();
        for &pid in &pids {
            sys::terminate(pid);
        }

        let start = Instant::now();
        while start.elapsed() < grace_period {
            if pids.iter().all(|&pid| !sys::is_alive(pid)) {
                info!("All child processes terminated gracefully");
                self.pids.clear();
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        for &pid in &pids {
            if sys::is_alive(pid) {
                warn!("Process {} did not terminate, killing", pid);
                sys::kill(pid);
            }
        }

        self.pids.clear();
        info!("Child process cleanup complete");
    }
}

#[cfg(unix)]
mod sys {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;
    use tracing::warn;

    fn signal_group_or_pid(pid: u32, sig: Signal) {
        // Negative PID addresses the whole group, catching mysql under wp db import
        if let Err(e) = signal::kill(Pid::from_raw(-(pid as i32)), sig) {
            warn!("Failed to send {:?} to process group {}: {}", sig, pid, e);
            let _ = signal::kill(Pid::from_raw(pid as i32), sig);
        }
    }

    pub(super) fn terminate(pid: u32) {
        signal_group_or_pid(pid, Signal::SIGTERM);
    }

    pub(super) fn kill(pid: u32) {
        signal_group_or_pid(pid, Signal::SIGKILL);
    }

    pub(super) fn is_alive(pid: u32) -> bool {
        if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
            return false;
        }
        // Zombies still accept signals but are not running
        if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            let fields: Vec<&str> = stat.split_whitespace().collect();
            if fields.len() > 2 {
                return !matches!(fields[2], "Z" | "X");
            }
        }
        true
    }
}

#[cfg(not(unix))]
mod sys {
    use std::process::{Command, Stdio};

    fn taskkill(pid: u32, force: bool) -> bool {
        let pid = pid.to_string();
        let mut args = vec!["/PID", pid.as_str(), "/T"];
        if force {
            args.push("/F");
        }
        Command::new("taskkill")
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    pub(super) fn terminate(pid: u32) {
        taskkill(pid, false);
    }

    pub(super) fn kill(pid: u32) {
        taskkill(pid, true);
    }

    pub(super) fn is_alive(pid: u32) -> bool {
        Command::new("tasklist")
            .args(["/FI", &format!("PID eq {}", pid), "/NH"])
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
            .unwrap_or(false)
    }
}

/// Install handlers that terminate all registered children before exiting.
/// Call this once at program start.
#[cfg(unix)]
pub fn init_signal_handlers() -> std::io::Result<()> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!("Received signal {}, cleaning up...", sig);
            if let Ok(mut registry) = ChildRegistry::global().lock() {
                registry.terminate_all(Duration::from_secs(3));
            }
            // 128 + signal number
            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

/// Install handlers that terminate all registered children before exiting.
/// Call this once at program start.
#[cfg(not(unix))]
pub fn init_signal_handlers() -> std::io::Result<()> {
    ctrlc::set_handler(|| {
        info!("Received Ctrl+C, cleaning up...");
        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.terminate_all(Duration::from_secs(3));
        }
        std::process::exit(130);
    })
    .map_err(std::io::Error::other)
}

/// Extension trait for `std::process::Command` to set up process groups
pub trait CommandProcessGroup {
    /// Run the command in its own process group so the whole tree can be signalled
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for std::process::Command {
    #[cfg(unix)]
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        // PGID = child PID
        self.process_group(0)
    }

    #[cfg(not(unix))]
    fn in_new_process_group(&mut self) -> &mut Self {
        self
    }
}
