//! Type-safe arguments for the MySQL client tools.
//!
//! - [`MysqlQuery`] for `mysql --batch -e <sql>`
//! - [`MysqlImport`] for `mysql <db> < dump.sql`
//! - [`MysqlDump`] for `mysqldump --result-file=<file> <db>`
//!
//! Connection flags always use the `--flag=value` form so the password is
//! caught by log redaction.

use std::path::Path;

use crate::config::DatabaseConfig;
use crate::tool_args::ToolArgs;

/// Connection flags shared by `mysql` and `mysqldump`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MysqlConnection {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub socket: Option<String>,
}

impl From<&DatabaseConfig> for MysqlConnection {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            user: config.user.clone(),
            password: config.password.clone(),
            socket: config.socket.clone(),
        }
    }
}

impl MysqlConnection {
    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--user={}", self.user),
            format!("--host={}", self.host),
            format!("--port={}", self.port),
        ];
        // An empty --password= would still make the client skip the prompt,
        // but Herd's default root account has no password at all
        if !self.password.is_empty() {
            args.push(format!("--password={}", self.password));
        }
        if let Some(ref socket) = self.socket {
            args.push(format!("--socket={}", socket));
        }
        args
    }

    /// Host string in the `host:port` / `host:/socket` form wp-config.php accepts.
    pub fn wp_db_host(&self) -> String {
        match self.socket {
            Some(ref socket) => format!("{}:{}", self.host, socket),
            None => format!("{}:{}", self.host, self.port),
        }
    }
}

/// Quote a MySQL identifier with backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a MySQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// One SQL statement run through `mysql --batch`.
///
/// Batch mode prints tab-separated rows preceded by a header row, which the
/// tabular adapter in [`crate::output`] skips.
#[derive(Debug, Clone)]
pub struct MysqlQuery<'a> {
    pub conn: &'a MysqlConnection,
    /// Default database for unqualified table names
    pub database: Option<&'a str>,
    pub sql: String,
}

impl ToolArgs for MysqlQuery<'_> {
    fn to_cli_args(&self) -> Vec<String> {
        let mut args = self.conn.to_cli_args();
        args.push("--batch".to_string());
        if let Some(db) = self.database {
            args.push(format!("--database={}", db));
        }
        args.push("-e".to_string());
        args.push(self.sql.clone());
        args
    }

    fn verb(&self) -> &'static str {
        "query"
    }
}

/// Stream a SQL dump into a database.
#[derive(Debug, Clone)]
pub struct MysqlImport<'a> {
    pub conn: &'a MysqlConnection,
    pub database: &'a str,
    pub file: &'a Path,
}

impl ToolArgs for MysqlImport<'_> {
    fn to_cli_args(&self) -> Vec<String> {
        let mut args = self.conn.to_cli_args();
        args.push(format!("--database={}", self.database));
        args
    }

    fn stdin_file(&self) -> Option<&Path> {
        Some(self.file)
    }

    fn verb(&self) -> &'static str {
        "import"
    }
}

/// Export a database to a SQL file.
#[derive(Debug, Clone)]
pub struct MysqlDump<'a> {
    pub conn: &'a MysqlConnection,
    pub database: &'a str,
    pub output: &'a Path,
}

impl ToolArgs for MysqlDump<'_> {
    fn to_cli_args(&self) -> Vec<String> {
        let mut args = self.conn.to_cli_args();
        args.extend([
            "--single-transaction".to_string(),
            "--quick".to_string(),
            "--skip-lock-tables".to_string(),
            "--default-character-set=utf8mb4".to_string(),
            format!("--result-file={}", self.output.display()),
            self.database.to_string(),
        ]);
        args
    }

    fn verb(&self) -> &'static str {
        "dump"
    }
}
