/// Statement Construction Module
///
/// Builds the parameterized statements issued by the CRUD layer. Every value
/// position is a `?` placeholder; names are validated by `ident` before they
/// are interpolated. Column lists and parameter lists are always produced by
/// the same pass over a `Row`, so their order cannot diverge.
use super::ident;
use super::value::{Row, Value};
use crate::core::{ForwardError, Result};
use std::fmt;

/// A statement ready for execution: SQL text plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
    /// False for statements the engine refuses to run inside a transaction.
    pub transactional: bool,
    /// Parameters must be sent as escaped literals in the statement text,
    /// for positions where the server grammar accepts no placeholder.
    pub inline_params: bool,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Statement {
            sql: sql.into(),
            params,
            transactional: true,
            inline_params: false,
        }
    }

    /// Statement without parameters.
    pub fn raw(sql: impl Into<String>) -> Self {
        Statement::new(sql, Vec::new())
    }

    pub fn outside_transaction(mut self) -> Self {
        self.transactional = false;
        self
    }

    pub fn with_inline_params(mut self) -> Self {
        self.inline_params = true;
        self
    }

    /// Number of `?` placeholders in the statement text.
    #[cfg(test)]
    pub(crate) fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}

/// A column definition for `CREATE TABLE`, e.g. `source VARCHAR(255) NOT NULL DEFAULT ''`.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    definition: String,
}

impl Field {
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            definition: definition.into(),
        }
    }

    /// Address column: `VARCHAR(255) NOT NULL DEFAULT ''`.
    pub fn email(name: impl Into<String>) -> Self {
        Field::new(name, "VARCHAR(255) NOT NULL DEFAULT ''")
    }

    fn render(&self) -> Result<String> {
        ident::identifier(&self.name)?;
        if self.definition.contains(';') || self.definition.contains("--") {
            return Err(ForwardError::Query(format!(
                "invalid definition for column '{}'",
                self.name
            )));
        }
        Ok(format!("{} {}", self.name, self.definition))
    }
}

/// Privilege grant for a database account. Not persisted; translated directly
/// into a grant statement by the dialect.
#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
    pub user: String,
    pub password: String,
    pub privileges: Vec<String>,
    pub target: String,
}

impl Grant {
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        privileges: &[&str],
        target: impl Into<String>,
    ) -> Self {
        Grant {
            user: user.into(),
            password: password.into(),
            privileges: privileges.iter().map(|p| p.to_string()).collect(),
            target: target.into(),
        }
    }

    /// Splits the account into user and host; `localhost` when no host is given.
    pub fn account(&self) -> Result<(&str, &str)> {
        let (user, host) = self.user.split_once('@').unwrap_or((&self.user, "localhost"));
        Ok((ident::account_part(user)?, ident::account_part(host)?))
    }

    /// Validated, comma separated privilege list.
    pub fn privilege_list(&self) -> Result<String> {
        if self.privileges.is_empty() {
            return Err(ForwardError::Query("grant requires at least one privilege".to_string()));
        }
        let privileges = self
            .privileges
            .iter()
            .map(|p| ident::privilege(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(privileges.join(", "))
    }
}

/// Builds `CREATE TABLE name (fields..., PRIMARY KEY (keys))`.
pub fn create_table(name: &str, fields: &[Field], primary_keys: &[&str]) -> Result<Statement> {
    ident::qualified(name)?;
    if fields.is_empty() {
        return Err(ForwardError::Query(format!("table '{}' requires at least one field", name)));
    }
    let mut columns = fields
        .iter()
        .map(Field::render)
        .collect::<Result<Vec<_>>>()?;
    if !primary_keys.is_empty() {
        let keys = primary_keys
            .iter()
            .map(|key| ident::identifier(key))
            .collect::<Result<Vec<_>>>()?;
        columns.push(format!("PRIMARY KEY ({})", keys.join(",")));
    }
    Ok(Statement::raw(format!("CREATE TABLE {} ({})", name, columns.join(", "))))
}

/// `INSERT INTO` prefix shared by every upsert dialect.
///
/// Returns the statement prefix, the `col = ?` assignments for the update
/// clause and the value list, all built from one iteration over `row`.
pub(crate) fn insert_parts(table: &str, row: &Row) -> Result<(String, String, Vec<Value>)> {
    ident::qualified(table)?;
    if row.is_empty() {
        return Err(ForwardError::Query(format!("insert into '{}' requires at least one column", table)));
    }
    let mut names = Vec::with_capacity(row.len());
    let mut assignments = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (column, value) in row.iter() {
        ident::identifier(column)?;
        names.push(column);
        assignments.push(format!("{} = ?", column));
        values.push(value.clone());
    }
    let placeholders = vec!["?"; names.len()].join(", ");
    let insert = format!("INSERT INTO {} ({}) VALUES ({})", table, names.join(", "), placeholders);
    Ok((insert, assignments.join(", "), values))
}

/// Upsert parameters: the value list once for the insert clause and the very
/// same list again for the update clause.
pub(crate) fn doubled(values: Vec<Value>) -> Vec<Value> {
    let mut params = values.clone();
    params.extend(values);
    params
}

/// Builds ` WHERE a = ? AND b = ?` (or nothing for an empty filter) and its values.
fn where_clause(filter: &Row) -> Result<(String, Vec<Value>)> {
    if filter.is_empty() {
        return Ok((String::new(), Vec::new()));
    }
    let mut predicates = Vec::with_capacity(filter.len());
    let mut values = Vec::with_capacity(filter.len());
    for (column, value) in filter.iter() {
        ident::identifier(column)?;
        predicates.push(format!("{} = ?", column));
        values.push(value.clone());
    }
    Ok((format!(" WHERE {}", predicates.join(" AND ")), values))
}

/// Builds `SELECT <columns|*> FROM table [WHERE ...]`.
pub fn select(table: &str, columns: &[&str], filter: &Row) -> Result<Statement> {
    ident::qualified(table)?;
    let projection = if columns.is_empty() {
        "*".to_string()
    } else {
        columns
            .iter()
            .map(|column| ident::identifier(column))
            .collect::<Result<Vec<_>>>()?
            .join(", ")
    };
    let (predicate, params) = where_clause(filter)?;
    Ok(Statement::new(
        format!("SELECT {} FROM {}{}", projection, table, predicate),
        params,
    ))
}

/// Builds `DELETE FROM table [WHERE ...]`.
pub fn delete(table: &str, filter: &Row) -> Result<Statement> {
    ident::qualified(table)?;
    let (predicate, params) = where_clause(filter)?;
    Ok(Statement::new(format!("DELETE FROM {}{}", table, predicate), params))
}
