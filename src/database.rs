//! Database facade over the `mysql` and `mysqldump` clients.
//!
//! Every operation is one synchronous client invocation. Identifiers are
//! backtick-quoted and literals escaped by [`crate::tools::mysql`] helpers;
//! no statement is ever assembled from unquoted operator input.

use std::path::Path;

use tracing::{debug, info};

use crate::command_runner::CommandRunner;
use crate::error::{HerdpressError, Result};
use crate::output::{SHOW_DATABASES, SHOW_TABLES};
use crate::tool_args::Invocation;
use crate::tools::mysql::{
    MysqlConnection, MysqlDump, MysqlImport, MysqlQuery, quote_ident, quote_literal,
};

/// Suffix of the WordPress options table, used to discover the table prefix.
const OPTIONS_TABLE: &str = "options";

/// Escape `_` and `%` for a LIKE pattern.
fn like_escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('_', "\\_")
        .replace('%', "\\%")
}

pub struct Database<'a> {
    runner: &'a dyn CommandRunner,
    mysql: &'a str,
    mysqldump: &'a str,
    conn: MysqlConnection,
}

impl<'a> Database<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        mysql: &'a str,
        mysqldump: &'a str,
        conn: MysqlConnection,
    ) -> Self {
        Self {
            runner,
            mysql,
            mysqldump,
            conn,
        }
    }

    pub fn connection(&self) -> &MysqlConnection {
        &self.conn
    }

    fn query(&self, database: Option<&str>, sql: String) -> Result<String> {
        let args = MysqlQuery {
            conn: &self.conn,
            database,
            sql,
        };
        let output = self
            .runner
            .run(&Invocation::new(self.mysql, &args))?
            .ensure_success("mysql")?;
        Ok(output.stdout)
    }

    /// `SELECT 1`; any failure means the server is unreachable.
    pub fn ping(&self) -> Result<()> {
        match self.query(None, "SELECT 1".to_string()) {
            Ok(_) => Ok(()),
            Err(HerdpressError::Command { stderr, .. }) => {
                Err(HerdpressError::DatabaseUnreachable(stderr))
            }
            Err(e) => Err(e),
        }
    }

    pub fn exists(&self, database: &str) -> Result<bool> {
        let sql = format!(
            "SHOW DATABASES LIKE {}",
            quote_literal(&like_escape(database))
        );
        let names = SHOW_DATABASES.first_column(&self.query(None, sql)?)?;
        Ok(names.iter().any(|n| n == database))
    }

    pub fn create(&self, database: &str) -> Result<()> {
        info!("Creating database {}", database);
        self.query(
            None,
            format!(
                "CREATE DATABASE IF NOT EXISTS {} CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci",
                quote_ident(database)
            ),
        )?;
        Ok(())
    }

    pub fn drop(&self, database: &str) -> Result<()> {
        info!("Dropping database {}", database);
        self.query(
            None,
            format!("DROP DATABASE IF EXISTS {}", quote_ident(database)),
        )?;
        Ok(())
    }

    /// Drop then create, leaving an empty database.
    pub fn recreate(&self, database: &str) -> Result<()> {
        self.drop(database)?;
        self.create(database)
    }

    pub fn export(&self, database: &str, file: &Path) -> Result<()> {
        info!("Exporting {} to {}", database, file.display());
        let args = MysqlDump {
            conn: &self.conn,
            database,
            output: file,
        };
        self.runner
            .run(&Invocation::new(self.mysqldump, &args))?
            .ensure_success("mysqldump")?;
        Ok(())
    }

    pub fn import(&self, database: &str, file: &Path) -> Result<()> {
        if !file.is_file() {
            return Err(HerdpressError::validation(format!(
                "SQL file {} does not exist",
                file.display()
            )));
        }
        info!("Importing {} into {}", file.display(), database);
        let args = MysqlImport {
            conn: &self.conn,
            database,
            file,
        };
        self.runner
            .run(&Invocation::new(self.mysql, &args))?
            .ensure_success("mysql")?;
        Ok(())
    }

    /// Discover the table prefix from the options table.
    ///
    /// Returns `None` when no `%_options` table exists. When several match
    /// (plugins sometimes add `<prefix>foo_options`), the shortest name wins.
    pub fn table_prefix(&self, database: &str) -> Result<Option<String>> {
        let sql = format!(
            "SHOW TABLES FROM {} LIKE {}",
            quote_ident(database),
            quote_literal(&format!("%\\_{}", OPTIONS_TABLE))
        );
        let tables = SHOW_TABLES.first_column(&self.query(None, sql)?)?;
        let prefix = tables
            .iter()
            .filter_map(|t| t.strip_suffix(OPTIONS_TABLE))
            .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
            .map(str::to_string);
        debug!("Table prefix of {}: {:?}", database, prefix);
        Ok(prefix)
    }

    /// Rename an account.
    ///
    /// Only `user_login` is written: WordPress never rewrites that column on
    /// a profile update, so this can run alongside `wp user update`.
    pub fn update_user_login(
        &self,
        database: &str,
        prefix: &str,
        user_id: u64,
        login: &str,
    ) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET user_login = {} WHERE ID = {}",
            quote_ident(&format!("{}users", prefix)),
            quote_literal(login),
            user_id
        );
        self.query(Some(database), sql)?;
        Ok(())
    }
}
