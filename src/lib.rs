//! herdpress library
//!
//! Lifecycle orchestration for local WordPress sites served by Laravel Herd:
//! create, delete, back up and restore, driving WP-CLI, the MySQL clients,
//! 7-Zip and Herd as external commands.

pub mod app;
pub mod archive;
pub mod cli;
pub mod command_runner;
pub mod config;
pub mod database;
pub mod error;
pub mod herd;
pub mod logic;
pub mod output;
pub mod packages;
pub mod platform;
pub mod process_guard;
pub mod prompt;
pub mod registry;
pub mod sanity;
pub mod site;
pub mod tool_args;
pub mod tools;
pub mod wp_cli;

// Re-export main types for convenience
pub use command_runner::{CommandOutput, CommandRunner, RecordingRunner, SystemRunner};
pub use config::Config;
pub use error::{BatchReport, HerdpressError, Result};
pub use logic::Toolbox;
pub use process_guard::{ChildRegistry, CommandProcessGroup};
pub use site::{AdminCredentials, Site};
