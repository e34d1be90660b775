/// MySQL Driver
///
/// `Driver` implementation over the synchronous `mysql` client. Autocommit is
/// switched off when the connection opens so that statements accumulate in a
/// transaction until `commit` or `rollback`.
///
/// Statements go through the binary protocol with bound parameters, except
/// those flagged `inline_params`, whose parameters are escaped into the text
/// and sent over the text protocol.
use super::connection::Driver;
use super::dialect::{Dialect, MySqlDialect};
use super::query::Statement;
use super::value::{Cursor, Value};
use crate::core::{ForwardError, Result};
use mysql::prelude::{Protocol, Queryable};
use mysql::{Conn, OptsBuilder, Params, QueryResult};
use tracing::debug;

impl From<&Value> for mysql::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => mysql::Value::NULL,
            Value::Integer(i) => mysql::Value::Int(*i),
            Value::Real(r) => mysql::Value::Double(*r),
            Value::Text(t) => mysql::Value::Bytes(t.as_bytes().to_vec()),
        }
    }
}

impl From<mysql::Value> for Value {
    fn from(value: mysql::Value) -> Self {
        match value {
            mysql::Value::NULL => Value::Null,
            mysql::Value::Int(i) => Value::Integer(i),
            mysql::Value::UInt(u) => i64::try_from(u)
                .map(Value::Integer)
                .unwrap_or_else(|_| Value::Text(u.to_string())),
            mysql::Value::Float(f) => Value::Real(f.into()),
            mysql::Value::Double(d) => Value::Real(d),
            mysql::Value::Bytes(b) => Value::Text(String::from_utf8_lossy(&b).to_string()),
            other => Value::Text(other.as_sql(true).trim_matches('\'').to_string()),
        }
    }
}

/// Replaces each `?` in `statement` with its parameter as an escaped SQL literal.
pub(crate) fn inline_sql(statement: &Statement) -> Result<String> {
    let mut params = statement.params.iter();
    let mut sql = String::with_capacity(statement.sql.len());
    for c in statement.sql.chars() {
        if c != '?' {
            sql.push(c);
            continue;
        }
        let value = params.next().ok_or_else(|| {
            ForwardError::Query(format!("missing parameter for '{}'", statement.sql))
        })?;
        sql.push_str(&mysql::Value::from(value).as_sql(false));
    }
    if params.next().is_some() {
        return Err(ForwardError::Query(format!(
            "too many parameters for '{}'",
            statement.sql
        )));
    }
    Ok(sql)
}

fn collect<P: Protocol>(mut result: QueryResult<'_, '_, '_, P>) -> Result<Cursor> {
    let columns: Vec<String> = result
        .columns()
        .as_ref()
        .iter()
        .map(|column| column.name_str().into_owned())
        .collect();
    let mut rows = Vec::new();
    for row in result.by_ref() {
        rows.push(row?.unwrap().into_iter().map(Value::from).collect());
    }
    let affected = result.affected_rows();
    Ok(Cursor::new(columns, rows, affected))
}

pub struct MySqlDriver {
    conn: Conn,
    dialect: MySqlDialect,
}

impl std::fmt::Debug for MySqlDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlDriver").finish_non_exhaustive()
    }
}

impl MySqlDriver {
    pub fn connect(host: &str, user: &str, password: &str, database: Option<&str>) -> Result<Self> {
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(host))
            .user(Some(user))
            .pass(Some(password))
            .db_name(database);
        let mut conn = Conn::new(opts)?;
        conn.query_drop("SET autocommit = 0")?;
        debug!("Connected to MySQL at {} as {}", host, user);
        Ok(MySqlDriver {
            conn,
            dialect: MySqlDialect,
        })
    }
}

impl Driver for MySqlDriver {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn run(&mut self, statement: &Statement) -> Result<Cursor> {
        if statement.inline_params {
            let sql = inline_sql(statement)?;
            return collect(self.conn.query_iter(sql)?);
        }

        let params = if statement.params.is_empty() {
            Params::Empty
        } else {
            Params::Positional(statement.params.iter().map(mysql::Value::from).collect())
        };
        collect(self.conn.exec_iter(statement.sql.as_str(), params)?)
    }

    fn commit(&mut self) -> Result<()> {
        self.conn.query_drop("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn.query_drop("ROLLBACK")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::query::Grant;

    #[test]
    fn test_values_to_mysql() {
        assert_eq!(mysql::Value::from(&Value::Null), mysql::Value::NULL);
        assert_eq!(mysql::Value::from(&Value::Integer(-7)), mysql::Value::Int(-7));
        assert_eq!(mysql::Value::from(&Value::Real(2.5)), mysql::Value::Double(2.5));
        assert_eq!(
            mysql::Value::from(&Value::from("a@example.com")),
            mysql::Value::Bytes(b"a@example.com".to_vec())
        );
    }

    #[test]
    fn test_values_from_mysql() {
        assert_eq!(Value::from(mysql::Value::NULL), Value::Null);
        assert_eq!(Value::from(mysql::Value::Int(3)), Value::Integer(3));
        assert_eq!(Value::from(mysql::Value::UInt(5)), Value::Integer(5));
        assert_eq!(
            Value::from(mysql::Value::UInt(u64::MAX)),
            Value::Text(u64::MAX.to_string())
        );
        assert_eq!(Value::from(mysql::Value::Float(1.5)), Value::Real(1.5));
        assert_eq!(Value::from(mysql::Value::Double(0.25)), Value::Real(0.25));
        assert_eq!(
            Value::from(mysql::Value::Bytes(vec![b'o', b'k', 0xff])),
            Value::Text("ok\u{fffd}".to_string())
        );
    }

    #[test]
    fn test_date_values_become_text() {
        assert_eq!(
            Value::from(mysql::Value::Date(2024, 1, 2, 0, 0, 0, 0)),
            Value::from("2024-01-02")
        );
        assert_eq!(
            Value::from(mysql::Value::Date(2024, 1, 2, 3, 4, 5, 0)),
            Value::from("2024-01-02 03:04:05")
        );
    }

    #[test]
    fn test_grant_is_sent_with_literal_password() {
        let grant = Grant::new("postfix", "pw", &["SELECT"], "postfix.*");
        let stmt = MySqlDialect.grant(&grant).unwrap();
        assert_eq!(
            inline_sql(&stmt).unwrap(),
            "GRANT SELECT ON postfix.* TO 'postfix'@'localhost' IDENTIFIED BY 'pw'"
        );
        // The statement itself, which is what gets logged, never holds the password.
        assert!(!stmt.sql.contains("pw"));
    }

    #[test]
    fn test_grant_password_is_escaped() {
        let grant = Grant::new("bob", "p'w\\x", &["SELECT"], "postfix.*");
        let stmt = MySqlDialect.grant(&grant).unwrap();
        assert_eq!(
            inline_sql(&stmt).unwrap(),
            "GRANT SELECT ON postfix.* TO 'bob'@'localhost' IDENTIFIED BY 'p\\'w\\\\x'"
        );
    }

    #[test]
    fn test_inline_parameter_count_must_match() {
        let missing = Statement::raw("SELECT ?").with_inline_params();
        assert!(matches!(inline_sql(&missing), Err(ForwardError::Query(_))));
        let extra = Statement::new("SELECT 1", vec![Value::Integer(1)]).with_inline_params();
        assert!(matches!(inline_sql(&extra), Err(ForwardError::Query(_))));
    }
}
