//! Mail forwards stored in the database, and the one-time setup that creates
//! the schema, the role accounts and the postfix lookup files.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::backend::{Backend, ConnectionParams};
use crate::core::db::{Field, Row, Value};
use crate::core::{ForwardError, Result};
use crate::credentials::{EDITOR_FILE, VIEWER_FILE};
use crate::postfix::{is_email, write_private, LookupConfig, Postconf};

/// Table holding one row per forwarded address.
pub const FORWARDS_TABLE: &str = "forwards";

/// Privileges of the read-only lookup account.
pub const VIEWER_PRIVILEGES: &[&str] = &["SELECT"];
/// Privileges of the editing account.
pub const EDITOR_PRIVILEGES: &[&str] = &["SELECT", "INSERT", "UPDATE", "DELETE"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Forward {
    pub source: String,
    pub destination: String,
}

/// Name of the forwards table as seen from `backend`.
///
/// Backends with server-side databases qualify it with the database name; a
/// file database is itself the database, so the name stays bare.
pub fn forwards_table(backend: &dyn Backend, database: &str) -> String {
    if backend.has_server_databases() {
        format!("{}.{}", database, FORWARDS_TABLE)
    } else {
        FORWARDS_TABLE.to_string()
    }
}

/// Forward management on top of any backend.
pub struct ForwardStore<'a> {
    backend: &'a mut dyn Backend,
    table: String,
}

impl<'a> ForwardStore<'a> {
    pub fn new(backend: &'a mut dyn Backend, table: impl Into<String>) -> Self {
        ForwardStore {
            backend,
            table: table.into(),
        }
    }

    pub fn create_table(&mut self) -> Result<()> {
        self.backend.create_table(
            &self.table,
            &[Field::email("source"), Field::email("destination")],
            &["source"],
        )
    }

    /// Forwards `source` to `destination`, replacing any existing forward for `source`.
    pub fn add(&mut self, source: &str, destination: &str) -> Result<()> {
        for address in [source, destination] {
            if !is_email(address) {
                return Err(ForwardError::Query(format!("'{}' is not an e-mail address", address)));
            }
        }
        let row = Row::new().with("source", source).with("destination", destination);
        self.backend.insert(&self.table, &row)?;
        info!("Forwarding {} to {}", source, destination);
        Ok(())
    }

    /// Removes the forward for `source`; returns whether one existed.
    pub fn remove(&mut self, source: &str) -> Result<bool> {
        let removed = self
            .backend
            .delete(&self.table, &Row::new().with("source", source))?;
        Ok(removed > 0)
    }

    /// All forwards, or only the one for `source`.
    pub fn list(&mut self, source: Option<&str>) -> Result<Vec<Forward>> {
        let mut filter = Row::new();
        if let Some(source) = source {
            filter.set("source", source);
        }
        let cursor = self
            .backend
            .select_columns(&self.table, &["source", "destination"], &filter)?;
        Ok(cursor
            .map(|record| Forward {
                source: text(record.get("source")),
                destination: text(record.get("destination")),
            })
            .collect())
    }
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::Null) | None => String::new(),
        Some(value) => value.to_string(),
    }
}

/// Everything needed to provision a fresh installation.
#[derive(Debug, Clone)]
pub struct Setup {
    pub database: String,
    pub viewer: ConnectionParams,
    pub editor: ConnectionParams,
    pub conf_dir: PathBuf,
}

impl Setup {
    pub fn viewer_lookup(&self, table: &str) -> LookupConfig {
        LookupConfig {
            hosts: self.viewer.host.clone(),
            user: self.viewer.user.clone(),
            password: self.viewer.password.clone(),
            dbname: self.database.clone(),
            result_column: "destination".to_string(),
            table: table.to_string(),
            match_column: "source".to_string(),
        }
    }

    pub fn lookup_path(&self) -> PathBuf {
        self.conf_dir.join(VIEWER_FILE)
    }

    pub fn editor_credentials_path(&self) -> PathBuf {
        self.conf_dir.join(EDITOR_FILE)
    }

    /// Creates the database, table and accounts, then writes the lookup and
    /// credential files and points postfix at the lookup table.
    pub fn run(&self, backend: &mut dyn Backend, postconf: Option<&Postconf>) -> Result<()> {
        let table = forwards_table(backend, &self.database);
        if backend.has_server_databases() {
            backend.create_database(&self.database)?;
        }
        ForwardStore::new(backend, table.as_str()).create_table()?;

        let target = format!("{}.*", self.database);
        for (params, privileges) in [
            (&self.viewer, VIEWER_PRIVILEGES),
            (&self.editor, EDITOR_PRIVILEGES),
        ] {
            match backend.create_user(&params.user, &params.password, privileges, &target) {
                Ok(()) => {}
                Err(ForwardError::Unsupported(reason)) => {
                    warn!("Skipping account {}: {}", params.user, reason);
                }
                Err(e) => return Err(e),
            }
        }
        backend.commit()?;

        self.viewer_lookup(FORWARDS_TABLE).write(&self.lookup_path())?;
        write_editor_credentials(&self.editor_credentials_path(), &self.editor, &self.database)?;

        if let Some(postconf) = postconf {
            postconf.set(
                "virtual_alias_maps",
                &format!("mysql:{}", self.lookup_path().display()),
            )?;
        }
        Ok(())
    }
}

fn write_editor_credentials(path: &Path, editor: &ConnectionParams, database: &str) -> Result<()> {
    let content = format!(
        "user = {}\npassword = {}\ndbname = {}\n",
        editor.user, editor.password, database
    );
    write_private(path, &content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DEFAULT_HOST;
    use crate::core::db::sqlite::SqliteDriver;
    use crate::core::db::Database;
    use crate::credentials::Credentials;
    use crate::test_utils::RecordingDriver;
    use tempfile::TempDir;

    fn params(user: &str, password: &str) -> ConnectionParams {
        ConnectionParams {
            host: DEFAULT_HOST.to_string(),
            user: user.to_string(),
            password: password.to_string(),
            database: Some("postfix".to_string()),
        }
    }

    #[test]
    fn test_forwards_table_follows_database_namespaces() {
        let db = Database::new(RecordingDriver::new());
        assert_eq!(forwards_table(&db, "mail"), "mail.forwards");
        let db = Database::new(SqliteDriver::open_in_memory().unwrap());
        assert_eq!(forwards_table(&db, "mail"), FORWARDS_TABLE);
    }

    #[test]
    fn test_add_list_remove_on_sqlite() {
        let mut db = Database::new(SqliteDriver::open_in_memory().unwrap());
        let mut store = ForwardStore::new(&mut db, FORWARDS_TABLE);
        store.create_table().unwrap();
        store.add("a@example.com", "b@example.org").unwrap();
        store.add("c@example.com", "d@example.org").unwrap();
        store.add("a@example.com", "e@example.org").unwrap();

        let all = store.list(None).unwrap();
        assert_eq!(all.len(), 2);
        let a = store.list(Some("a@example.com")).unwrap();
        assert_eq!(
            a,
            vec![Forward {
                source: "a@example.com".to_string(),
                destination: "e@example.org".to_string()
            }]
        );

        assert!(store.remove("a@example.com").unwrap());
        assert!(!store.remove("a@example.com").unwrap());
        assert_eq!(store.list(None).unwrap().len(), 1);
    }

    #[test]
    fn test_add_rejects_non_addresses() {
        let mut db = Database::new(RecordingDriver::new());
        let mut store = ForwardStore::new(&mut db, FORWARDS_TABLE);
        assert!(matches!(
            store.add("not-an-address", "b@example.org"),
            Err(ForwardError::Query(_))
        ));
        assert!(db.driver().events.is_empty());
    }

    #[test]
    fn test_setup_on_mysql_dialect() {
        let dir = TempDir::new().unwrap();
        let setup = Setup {
            database: "postfix".to_string(),
            viewer: params("postfix", "viewpw"),
            editor: params("postfix_editor", "editpw"),
            conf_dir: dir.path().to_path_buf(),
        };
        let mut db = Database::new(RecordingDriver::new());
        setup.run(&mut db, None).unwrap();

        let statements = db.driver().statements();
        assert_eq!(statements[0], "CREATE DATABASE postfix");
        assert!(statements[1].starts_with("CREATE TABLE postfix.forwards ("));
        let grants: Vec<&&str> = statements.iter().filter(|s| s.starts_with("GRANT")).collect();
        assert_eq!(grants.len(), 2);
        assert!(grants[0].starts_with("GRANT SELECT ON postfix.* TO 'postfix'@'localhost'"));
        assert!(grants[1].starts_with("GRANT SELECT, INSERT, UPDATE, DELETE ON postfix.*"));
        // Each grant commits on its own and reloads privileges before that commit.
        assert_eq!(statements.iter().filter(|s| **s == "FLUSH PRIVILEGES").count(), 2);
        assert_eq!(statements.last(), Some(&"FLUSH PRIVILEGES"));

        // The lookup file doubles as the viewer's credentials.
        let credentials = Credentials::load(dir.path());
        assert_eq!(credentials.viewer.user.as_deref(), Some("postfix"));
        assert_eq!(credentials.viewer.password.as_deref(), Some("viewpw"));
        assert_eq!(credentials.editor.password.as_deref(), Some("editpw"));
        assert_eq!(credentials.database(), "postfix");
    }

    #[test]
    fn test_setup_on_sqlite_skips_accounts() {
        let dir = TempDir::new().unwrap();
        let setup = Setup {
            database: "postfix".to_string(),
            viewer: params("postfix", "viewpw"),
            editor: params("postfix_editor", "editpw"),
            conf_dir: dir.path().to_path_buf(),
        };
        let mut db = Database::new(SqliteDriver::open_in_memory().unwrap());
        setup.run(&mut db, None).unwrap();
        let mut store = ForwardStore::new(&mut db, FORWARDS_TABLE);
        assert!(store.list(None).unwrap().is_empty());
        assert!(setup.lookup_path().exists());
    }
}
