/// # Test Utilities Module
///
/// A recording driver that stands in for a real database client: it keeps
/// every executed statement, commit and rollback in order, and can be told to
/// fail statements containing a given fragment.
use crate::core::db::{Cursor, Dialect, Driver, MySqlDialect, Statement};
use crate::core::{ForwardError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Run(String),
    Commit,
    Rollback,
}

#[derive(Debug, Default)]
pub struct RecordingDriver {
    dialect: MySqlDialect,
    pub events: Vec<Event>,
    pub params: Vec<Vec<crate::core::db::Value>>,
    fail_on: Option<String>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver whose statements fail when their SQL contains `fragment`.
    pub fn failing_on(fragment: &str) -> Self {
        RecordingDriver {
            fail_on: Some(fragment.to_string()),
            ..Self::default()
        }
    }

    pub fn commits(&self) -> usize {
        self.events.iter().filter(|e| **e == Event::Commit).count()
    }

    pub fn rollbacks(&self) -> usize {
        self.events.iter().filter(|e| **e == Event::Rollback).count()
    }

    /// SQL of every statement that ran successfully, in order.
    pub fn statements(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Run(sql) => Some(sql.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Driver for RecordingDriver {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn run(&mut self, statement: &Statement) -> Result<Cursor> {
        if let Some(fragment) = &self.fail_on {
            if statement.sql.contains(fragment.as_str()) {
                return Err(ForwardError::Query(format!("injected failure: {}", statement.sql)));
            }
        }
        self.events.push(Event::Run(statement.sql.clone()));
        self.params.push(statement.params.clone());
        Ok(Cursor::empty(0))
    }

    fn commit(&mut self) -> Result<()> {
        self.events.push(Event::Commit);
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.events.push(Event::Rollback);
        Ok(())
    }
}
