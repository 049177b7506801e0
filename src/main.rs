//! herdpress - Main entry point
//!
//! Parses the command line, installs logging and signal handling, then hands
//! over to the library's dispatcher.

use std::process::ExitCode;

use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use herdpress::app;
use herdpress::cli::Cli;
use herdpress::process_guard;

/// Initialize the logger: `info` by default, `debug` with `-v`, `RUST_LOG` wins.
fn init_logger(verbose: u8) {
    let default = if verbose > 0 { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_logger(cli.verbose);
    info!("herdpress starting up");

    // Children are killed with us on SIGINT/SIGTERM
    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }
    debug!("Signal handlers initialized");

    match app::run(cli) {
        Ok(outcome) => ExitCode::from(outcome.exit_code() as u8),
        Err(e) => {
            debug!("{:?}", e);
            eprintln!("✗ {:#}", e);
            ExitCode::FAILURE
        }
    }
}
