/// SQL Dialects
///
/// Renders the statements whose syntax differs between engines: database
/// creation, upsert, privilege grants and privilege reload.
use super::ident;
use super::query::{doubled, insert_parts, Grant, Statement};
use super::value::{Row, Value};
use crate::core::{ForwardError, Result};
use std::fmt;
use std::path::PathBuf;

pub trait Dialect: fmt::Debug {
    /// Short engine name used in log lines and errors.
    fn name(&self) -> &'static str;

    /// Whether databases are server-side namespaces that tables are qualified with.
    fn has_server_databases(&self) -> bool;

    fn create_database(&self, name: &str) -> Result<Statement>;

    /// Insert `row`, updating every given column when the primary key already exists.
    fn upsert(&self, table: &str, row: &Row) -> Result<Statement>;

    fn grant(&self, grant: &Grant) -> Result<Statement>;

    /// Statement that makes new grants take effect, if the engine needs one.
    fn privilege_reload(&self) -> Option<Statement>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn has_server_databases(&self) -> bool {
        true
    }

    fn create_database(&self, name: &str) -> Result<Statement> {
        ident::identifier(name)?;
        Ok(Statement::raw(format!("CREATE DATABASE {}", name)))
    }

    fn upsert(&self, table: &str, row: &Row) -> Result<Statement> {
        if row.is_empty() {
            ident::qualified(table)?;
            return Ok(Statement::raw(format!("INSERT INTO {} () VALUES ()", table)));
        }
        let (insert, assignments, values) = insert_parts(table, row)?;
        Ok(Statement::new(
            format!("{} ON DUPLICATE KEY UPDATE {}", insert, assignments),
            doubled(values),
        ))
    }

    fn grant(&self, grant: &Grant) -> Result<Statement> {
        let privileges = grant.privilege_list()?;
        let target = ident::grant_target(&grant.target)?;
        let (user, host) = grant.account()?;
        Ok(Statement::new(
            format!(
                "GRANT {} ON {} TO '{}'@'{}' IDENTIFIED BY ?",
                privileges, target, user, host
            ),
            vec![Value::from(grant.password.as_str())],
        )
        .with_inline_params())
    }

    fn privilege_reload(&self) -> Option<Statement> {
        Some(Statement::raw("FLUSH PRIVILEGES"))
    }
}

/// SQLite dialect.
///
/// SQLite has no server-side databases; `create_database` attaches a new
/// database file named after the schema, placed in `attach_dir` (or in memory
/// when the main database is in memory).
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect {
    pub attach_dir: Option<PathBuf>,
}

impl SqliteDialect {
    pub fn new(attach_dir: Option<PathBuf>) -> Self {
        SqliteDialect { attach_dir }
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn has_server_databases(&self) -> bool {
        false
    }

    fn create_database(&self, name: &str) -> Result<Statement> {
        ident::identifier(name)?;
        let location = match &self.attach_dir {
            Some(dir) => dir.join(format!("{}.db", name)).to_string_lossy().into_owned(),
            None => ":memory:".to_string(),
        };
        Ok(Statement::new(
            format!("ATTACH DATABASE ? AS {}", name),
            vec![Value::Text(location)],
        )
        .outside_transaction())
    }

    fn upsert(&self, table: &str, row: &Row) -> Result<Statement> {
        if row.is_empty() {
            ident::qualified(table)?;
            return Ok(Statement::raw(format!("INSERT INTO {} DEFAULT VALUES", table)));
        }
        let (insert, assignments, values) = insert_parts(table, row)?;
        Ok(Statement::new(
            format!("{} ON CONFLICT DO UPDATE SET {}", insert, assignments),
            doubled(values),
        ))
    }

    fn grant(&self, grant: &Grant) -> Result<Statement> {
        Err(ForwardError::Unsupported(format!(
            "sqlite has no database accounts; cannot grant to '{}'",
            grant.user
        )))
    }

    fn privilege_reload(&self) -> Option<Statement> {
        None
    }
}
