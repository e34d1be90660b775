//! Postfix integration: lookup-table files and `postconf` settings.

use std::fs;
use std::path::Path;
use std::process::Command;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::core::{ForwardError, Result};

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_+.-]+@[a-zA-Z0-9_+.-]+").expect("valid email regex"));

/// Whether `s` starts with something shaped like an e-mail address.
pub fn is_email(s: &str) -> bool {
    EMAIL.is_match(s)
}

/// `CONCAT(a,b,...)` expression, for lookup result columns built from several fields.
pub fn concat(names: &[&str]) -> String {
    format!("CONCAT({})", names.join(","))
}

/// Parameters of one postfix lookup table backed by the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupConfig {
    pub hosts: String,
    pub user: String,
    pub password: String,
    pub dbname: String,
    /// Column (or expression) returned by the lookup.
    pub result_column: String,
    pub table: String,
    /// Column compared against the looked-up key.
    pub match_column: String,
}

impl LookupConfig {
    /// Renders the lookup file; `%s` is substituted by postfix with the key.
    pub fn render(&self) -> String {
        format!(
            "hosts = {}\nuser = {}\npassword = {}\ndbname = {}\nquery = SELECT {} FROM {} WHERE {}='%s'\n",
            self.hosts,
            self.user,
            self.password,
            self.dbname,
            self.result_column,
            self.table,
            self.match_column
        )
    }

    /// Writes the rendered file to `path`, readable by its owner and group only.
    pub fn write(&self, path: &Path) -> Result<()> {
        write_private(path, &self.render())?;
        info!("Wrote lookup table {}", path.display());
        Ok(())
    }
}

/// Writes `content` to `path` with mode 0640 on unix.
pub fn write_private(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o640))?;
    }
    Ok(())
}

/// Applies main.cf settings through the `postconf` program.
#[derive(Debug, Clone)]
pub struct Postconf {
    program: String,
}

impl Default for Postconf {
    fn default() -> Self {
        Postconf::new("postconf")
    }
}

impl Postconf {
    pub fn new(program: impl Into<String>) -> Self {
        Postconf {
            program: program.into(),
        }
    }

    /// Runs `postconf -e "key = value"`. A non-zero exit is an error.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let setting = format!("{} = {}", key, value);
        debug!("Running {} -e '{}'", self.program, setting);
        let output = Command::new(&self.program)
            .arg("-e")
            .arg(&setting)
            .output()
            .map_err(|e| ForwardError::Command(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(ForwardError::Command(format!(
                "{} -e '{}' exited with {}: {}",
                self.program,
                setting,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        info!("Set {}", setting);
        Ok(())
    }
}
