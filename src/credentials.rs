//! Default connection credentials read from the postfix configuration directory.
//!
//! Two `key = value` files hold the defaults for the two roles: the viewer's
//! lookup file (`aliases.cf`, which postfix itself reads) and the editor's
//! `edit_credentials.cf`. Loading is best effort: a missing or malformed file
//! leaves that role without defaults.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::backend::{Role, DEFAULT_DATABASE};

/// Viewer credential file name (doubles as the postfix alias lookup file).
pub const VIEWER_FILE: &str = "aliases.cf";
/// Editor credential file name.
pub const EDITOR_FILE: &str = "edit_credentials.cf";

/// Defaults for one role.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleCredentials {
    pub user: Option<String>,
    pub password: Option<String>,
    pub dbname: Option<String>,
}

impl RoleCredentials {
    fn from_map(mut map: BTreeMap<String, String>) -> Self {
        RoleCredentials {
            user: map.remove("user"),
            password: map.remove("password"),
            dbname: map.remove("dbname"),
        }
    }
}

/// Credential defaults for both roles, loaded once at start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    pub viewer: RoleCredentials,
    pub editor: RoleCredentials,
}

impl Credentials {
    /// Loads both credential files from `dir`. Never fails.
    pub fn load(dir: &Path) -> Self {
        Credentials {
            viewer: RoleCredentials::from_map(read_key_values(&dir.join(VIEWER_FILE))),
            editor: RoleCredentials::from_map(read_key_values(&dir.join(EDITOR_FILE))),
        }
    }

    pub fn role(&self, role: Role) -> &RoleCredentials {
        match role {
            Role::Viewer => &self.viewer,
            Role::Editor => &self.editor,
        }
    }

    /// Database name shared by both roles; the viewer file is authoritative.
    pub fn database(&self) -> &str {
        self.viewer
            .dbname
            .as_deref()
            .unwrap_or(DEFAULT_DATABASE)
    }
}

/// Reads a `key = value` file, returning an empty map on any failure.
pub fn read_key_values(path: &Path) -> BTreeMap<String, String> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            debug!("No credentials at {}: {}", path.display(), e);
            return BTreeMap::new();
        }
    };
    match parse_key_values(&content) {
        Some(map) => map,
        None => {
            warn!("Ignoring malformed credential file {}", path.display());
            BTreeMap::new()
        }
    }
}

/// Parses `key = value` lines; blank lines are skipped, values may contain `=`.
///
/// Returns `None` if any non-blank line has no `=`.
pub fn parse_key_values(content: &str) -> Option<BTreeMap<String, String>> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.split_once('=')
                .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}
