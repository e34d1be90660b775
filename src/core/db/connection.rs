/// Connection Management Module
///
/// Defines the `Driver` seam implemented by each database client and the
/// `Database` handle that wraps a driver with a reentrant transactional scope.
use super::dialect::Dialect;
use super::query::Statement;
use super::value::Cursor;
use crate::core::{ForwardError, Result};
use tracing::{debug, info, warn};

/// A database client able to run single statements and end transactions.
pub trait Driver {
    fn dialect(&self) -> &dyn Dialect;

    /// Executes one statement with its bound parameters.
    fn run(&mut self, statement: &Statement) -> Result<Cursor>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;
}

/// Database handle with a reentrant transactional scope.
///
/// Entering the scope increments a depth counter; leaving it decrements the
/// counter. Only the exit that brings the counter back to zero ends the
/// transaction: with a commit when every exit of that scope succeeded, with a
/// rollback as soon as any nested exit reported a failure.
#[derive(Debug)]
pub struct Database<D: Driver> {
    driver: D,
    depth: usize,
    failed: bool,
    user_modified: bool,
}

impl<D: Driver> Database<D> {
    pub fn new(driver: D) -> Self {
        Database {
            driver,
            depth: 0,
            failed: false,
            user_modified: false,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.driver.dialect()
    }

    /// Current nesting depth of the transactional scope.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether a grant was issued since the last commit or rollback.
    pub fn user_modified(&self) -> bool {
        self.user_modified
    }

    pub(crate) fn mark_user_modified(&mut self) {
        self.user_modified = true;
    }

    /// Opens (or re-enters) the transactional scope.
    pub fn enter(&mut self) -> &mut Self {
        self.depth += 1;
        self
    }

    /// Leaves the transactional scope.
    ///
    /// `failed` reports whether the work done inside this level of the scope
    /// failed. The outermost exit commits or rolls back.
    pub fn exit(&mut self, failed: bool) -> Result<()> {
        if self.depth == 0 {
            return Err(ForwardError::Transaction(
                "scope exit without matching enter".to_string(),
            ));
        }
        self.depth -= 1;
        self.failed |= failed;
        if self.depth > 0 {
            return Ok(());
        }
        if std::mem::take(&mut self.failed) {
            self.rollback()
        } else {
            self.commit()
        }
    }

    /// Runs `f` inside the transactional scope.
    ///
    /// An error from `f` is returned unchanged after the scope is left; if the
    /// resulting rollback fails as well, that failure is logged and dropped.
    pub fn scope<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.enter();
        match f(self) {
            Ok(value) => {
                self.exit(false)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.exit(true) {
                    warn!("Rollback after failed statement also failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }

    /// Executes one statement inside the transactional scope and returns its cursor.
    pub fn execute(&mut self, statement: &Statement) -> Result<Cursor> {
        debug!(
            dialect = self.driver.dialect().name(),
            params = statement.params.len(),
            "Executing: {}",
            statement.sql
        );
        self.scope(|db| db.driver.run(statement))
    }

    /// Commits the driver transaction.
    ///
    /// When a grant was issued since the last commit, the dialect's privilege
    /// reload statement runs first.
    pub fn commit(&mut self) -> Result<()> {
        if self.user_modified {
            let reload = self.driver.dialect().privilege_reload();
            if let Some(reload) = reload {
                info!("Reloading privileges: {}", reload.sql);
                self.driver.run(&reload)?;
            }
        }
        self.user_modified = false;
        self.driver.commit()?;
        debug!("Committed");
        Ok(())
    }

    /// Rolls back the driver transaction, discarding the pending privilege reload.
    pub fn rollback(&mut self) -> Result<()> {
        self.user_modified = false;
        self.driver.rollback()?;
        info!("Rolled back");
        Ok(())
    }
}
