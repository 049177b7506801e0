//! Typed argument builders for the external tools herdpress drives.
//!
//! Each module maps Rust values to the exact argument vector one tool expects:
//! - [`mysql`]: `mysql` statements, imports and `mysqldump` exports
//! - [`wp`]: WP-CLI verbs, always bound to one site path
//! - [`archive`]: 7-Zip and tar extract/compress
//! - [`herd`]: Herd TLS binding, service probe and the browser launcher

pub mod archive;
pub mod herd;
pub mod mysql;
pub mod wp;
