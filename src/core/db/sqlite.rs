/// SQLite Driver
///
/// `Driver` implementation over `rusqlite`. SQLite runs in autocommit mode by
/// default, so a transaction is opened lazily before the first transactional
/// statement and ended by `commit`/`rollback`.
use super::connection::Driver;
use super::dialect::{Dialect, SqliteDialect};
use super::query::Statement;
use super::value::{Cursor, Value};
use crate::core::Result;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use std::path::Path;
use tracing::debug;

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Integer(i) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*r)),
            Value::Text(t) => ToSqlOutput::Borrowed(ValueRef::Text(t.as_bytes())),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).to_string()),
            ValueRef::Blob(b) => Value::Text(format!("<BLOB: {} bytes>", b.len())),
        }
    }
}

#[derive(Debug)]
pub struct SqliteDriver {
    conn: Connection,
    dialect: SqliteDialect,
}

impl SqliteDriver {
    /// Opens a SQLite database file, or an in-memory database for `":memory:"`.
    ///
    /// Databases created later with `create_database` are attached from files
    /// in the same directory as the main database.
    pub fn open(path: &str) -> Result<Self> {
        if path == ":memory:" {
            return Self::open_in_memory();
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let attach_dir = Path::new(path)
            .parent()
            .map(|dir| if dir.as_os_str().is_empty() { Path::new(".") } else { dir })
            .map(Path::to_path_buf);
        debug!("Opened SQLite database at {}", path);
        Ok(SqliteDriver {
            conn,
            dialect: SqliteDialect::new(attach_dir),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(SqliteDriver {
            conn,
            dialect: SqliteDialect::new(None),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Driver for SqliteDriver {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn run(&mut self, statement: &Statement) -> Result<Cursor> {
        if statement.transactional && self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }

        let mut prepared = self.conn.prepare(&statement.sql)?;
        let column_count = prepared.column_count();
        if column_count == 0 {
            let affected = prepared.execute(params_from_iter(statement.params.iter()))?;
            return Ok(Cursor::empty(affected as u64));
        }

        let columns: Vec<String> = prepared.column_names().into_iter().map(String::from).collect();
        let rows = prepared
            .query_map(params_from_iter(statement.params.iter()), |row| {
                (0..column_count)
                    .map(|i| row.get_ref(i).map(Value::from))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Cursor::new(columns, rows, 0))
    }

    fn commit(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }
}
