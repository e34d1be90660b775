//! Backends: the CRUD capability interface, its implementation over any
//! `Driver`, connection parameters and the registry mapping backend names to
//! constructors.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::core::db::sqlite::SqliteDriver;
use crate::core::db::{self, Cursor, Database, Driver, Field, Grant, Row};
use crate::core::{ForwardError, Result};
use crate::credentials::Credentials;

/// Host used for every role connection.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Database name when no credential file names one.
pub const DEFAULT_DATABASE: &str = "postfix";

/// Backend used when neither the command line nor the configuration names one.
#[cfg(feature = "mysql")]
pub const DEFAULT_BACKEND: &str = "mysql";
#[cfg(not(feature = "mysql"))]
pub const DEFAULT_BACKEND: &str = "sqlite";

/// Capabilities shared by every database backend.
pub trait Backend {
    fn name(&self) -> &'static str;

    /// Whether `create_database` makes a server-side database that tables are
    /// qualified with. False for file databases such as SQLite.
    fn has_server_databases(&self) -> bool;

    /// Creates a database; fails if it already exists.
    fn create_database(&mut self, name: &str) -> Result<()>;

    fn create_table(&mut self, name: &str, fields: &[Field], primary_keys: &[&str]) -> Result<()>;

    /// Grants `privileges` on `target` to `user`, creating the account with
    /// `password`. Users without an explicit host are bound to `localhost`.
    fn create_user(&mut self, user: &str, password: &str, privileges: &[&str], target: &str) -> Result<()>;

    /// Inserts `row`, or updates every given column if the primary key exists.
    fn insert(&mut self, table: &str, row: &Row) -> Result<()>;

    /// All columns of the rows matching every `filter` equality; an empty filter matches all rows.
    fn select(&mut self, table: &str, filter: &Row) -> Result<Cursor> {
        self.select_columns(table, &[], filter)
    }

    /// Like `select`, restricted to `columns` (all columns when empty).
    fn select_columns(&mut self, table: &str, columns: &[&str], filter: &Row) -> Result<Cursor>;

    /// Deletes the rows matching `filter` and returns how many were removed.
    fn delete(&mut self, table: &str, filter: &Row) -> Result<u64>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Whether a grant was issued since the last commit or rollback.
    fn user_modified(&self) -> bool;
}

impl<D: Driver> Backend for Database<D> {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn has_server_databases(&self) -> bool {
        self.dialect().has_server_databases()
    }

    fn create_database(&mut self, name: &str) -> Result<()> {
        let statement = self.dialect().create_database(name)?;
        self.execute(&statement)?;
        info!("Created database {}", name);
        Ok(())
    }

    fn create_table(&mut self, name: &str, fields: &[Field], primary_keys: &[&str]) -> Result<()> {
        let statement = db::create_table(name, fields, primary_keys)?;
        self.execute(&statement)?;
        info!("Created table {}", name);
        Ok(())
    }

    fn create_user(&mut self, user: &str, password: &str, privileges: &[&str], target: &str) -> Result<()> {
        let grant = Grant::new(user, password, privileges, target);
        let statement = self.dialect().grant(&grant)?;
        self.mark_user_modified();
        self.execute(&statement)?;
        info!("Granted {} on {} to {}", privileges.join(", "), target, user);
        Ok(())
    }

    fn insert(&mut self, table: &str, row: &Row) -> Result<()> {
        let statement = self.dialect().upsert(table, row)?;
        self.execute(&statement)?;
        Ok(())
    }

    fn select_columns(&mut self, table: &str, columns: &[&str], filter: &Row) -> Result<Cursor> {
        let statement = db::select(table, columns, filter)?;
        self.execute(&statement)
    }

    fn delete(&mut self, table: &str, filter: &Row) -> Result<u64> {
        let statement = db::delete(table, filter)?;
        let cursor = self.execute(&statement)?;
        Ok(cursor.affected_rows())
    }

    fn commit(&mut self) -> Result<()> {
        Database::commit(self)
    }

    fn rollback(&mut self) -> Result<()> {
        Database::rollback(self)
    }

    fn user_modified(&self) -> bool {
        Database::user_modified(self)
    }
}

/// Account roles the tool connects as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Read-only account used by postfix lookups.
    Viewer,
    /// Account allowed to change forwards.
    Editor,
}

impl Role {
    pub fn default_user(self) -> &'static str {
        match self {
            Role::Viewer => "postfix",
            Role::Editor => "postfix_editor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Viewer => write!(f, "viewer"),
            Role::Editor => write!(f, "editor"),
        }
    }
}

/// Resolved connection parameters. Immutable once a backend is built from them.
#[derive(Clone, PartialEq)]
pub struct ConnectionParams {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

impl ConnectionParams {
    /// Resolves the parameters for `role`.
    ///
    /// Each field is taken from the explicit argument first, then from the
    /// role's credential file, and the password finally from `prompt`.
    pub fn for_role(
        role: Role,
        credentials: &Credentials,
        host: &str,
        user: Option<&str>,
        password: Option<&str>,
        prompt: &mut dyn FnMut(&str) -> Result<String>,
    ) -> Result<Self> {
        let defaults = credentials.role(role);
        let user = user
            .map(str::to_string)
            .or_else(|| defaults.user.clone())
            .unwrap_or_else(|| role.default_user().to_string());
        let password = match password.map(str::to_string).or_else(|| defaults.password.clone()) {
            Some(password) => password,
            None => prompt(&format!("Enter mysql password for {}:", user))?,
        };
        debug!(role = %role, user = %user, "Resolved connection parameters");
        Ok(ConnectionParams {
            host: host.to_string(),
            user,
            password,
            database: Some(credentials.database().to_string()),
        })
    }
}

/// Constructs a backend from resolved parameters and the loaded configuration.
pub type Constructor = fn(&ConnectionParams, &Config) -> Result<Box<dyn Backend>>;

/// Registry mapping backend identifiers to their constructors.
pub struct BackendRegistry {
    constructors: BTreeMap<&'static str, Constructor>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.names())
            .finish()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        BackendRegistry {
            constructors: BTreeMap::new(),
        }
    }

    /// Registry holding every backend compiled into this build.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("sqlite", open_sqlite);
        #[cfg(feature = "mysql")]
        registry.register("mysql", open_mysql);
        registry
    }

    /// Registers `constructor` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: &'static str, constructor: Constructor) {
        if self.constructors.insert(name, constructor).is_some() {
            warn!(backend = name, "Backend constructor replaced");
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.constructors.keys().copied().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Builds the backend registered under `name`.
    pub fn create(&self, name: &str, params: &ConnectionParams, config: &Config) -> Result<Box<dyn Backend>> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| ForwardError::UnknownBackend(name.to_string()))?;
        debug!(backend = name, user = %params.user, "Opening backend");
        constructor(params, config)
    }
}

fn open_sqlite(_params: &ConnectionParams, config: &Config) -> Result<Box<dyn Backend>> {
    let driver = match &config.sqlite.path {
        Some(path) => SqliteDriver::open(&path.to_string_lossy())?,
        None => {
            warn!("No [sqlite] path configured; using an in-memory database");
            SqliteDriver::open_in_memory()?
        }
    };
    Ok(Box::new(Database::new(driver)))
}

#[cfg(feature = "mysql")]
fn open_mysql(params: &ConnectionParams, _config: &Config) -> Result<Box<dyn Backend>> {
    let driver = crate::core::db::mysql_driver::MySqlDriver::connect(
        &params.host,
        &params.user,
        &params.password,
        params.database.as_deref(),
    )?;
    Ok(Box::new(Database::new(driver)))
}
