/// Identifier validation.
///
/// Values are always bound as statement parameters. Names (databases, tables,
/// columns, users, privileges) cannot be bound, so they are checked against
/// these allow-lists before being interpolated into statement text.
use crate::core::{ForwardError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

static GRANT_PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\*|[A-Za-z_][A-Za-z0-9_]*)$").expect("valid grant target regex")
});

static PRIVILEGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]+( [A-Z]+)*$").expect("valid privilege regex"));

static USER_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.%-]+$").expect("valid user regex"));

/// Validates a bare identifier such as a column name.
pub fn identifier(name: &str) -> Result<&str> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(ForwardError::Query(format!("invalid identifier '{}'", name)))
    }
}

/// Validates an optionally schema-qualified name such as `postfix.forwards`.
pub fn qualified(name: &str) -> Result<&str> {
    let mut parts = name.split('.');
    let valid = match (parts.next(), parts.next(), parts.next()) {
        (Some(first), None, _) => IDENTIFIER.is_match(first),
        (Some(first), Some(second), None) => IDENTIFIER.is_match(first) && IDENTIFIER.is_match(second),
        _ => false,
    };
    if valid {
        Ok(name)
    } else {
        Err(ForwardError::Query(format!("invalid name '{}'", name)))
    }
}

/// Validates a grant target: `table`, `db.table`, `db.*` or `*.*`.
pub fn grant_target(target: &str) -> Result<&str> {
    let valid = match target.split_once('.') {
        Some((schema, table)) => GRANT_PART.is_match(schema) && GRANT_PART.is_match(table),
        None => GRANT_PART.is_match(target),
    };
    if valid {
        Ok(target)
    } else {
        Err(ForwardError::Query(format!("invalid grant target '{}'", target)))
    }
}

/// Validates a privilege keyword such as `SELECT` or `ALL PRIVILEGES`.
pub fn privilege(name: &str) -> Result<&str> {
    if PRIVILEGE.is_match(name) {
        Ok(name)
    } else {
        Err(ForwardError::Query(format!("invalid privilege '{}'", name)))
    }
}

/// Validates the user or host half of an account name.
pub fn account_part(part: &str) -> Result<&str> {
    if USER_PART.is_match(part) {
        Ok(part)
    } else {
        Err(ForwardError::Query(format!("invalid account name '{}'", part)))
    }
}
