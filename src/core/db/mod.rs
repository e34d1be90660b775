/// Database Module
///
/// The database layer is split into focused submodules:
/// - **Values** (`value.rs`): column values, ordered rows and result cursors
/// - **Identifiers** (`ident.rs`): allow-list validation for names interpolated into SQL
/// - **Statements** (`query.rs`): parameterized statement construction
/// - **Dialects** (`dialect.rs`): engine-specific syntax (upsert, grants, privilege reload)
/// - **Connection** (`connection.rs`): the driver seam and the reentrant transactional scope
/// - **Drivers** (`sqlite.rs`, `mysql_driver.rs`): concrete database clients
///
/// ## Error Handling
///
/// All database operations return `ForwardError`; driver errors are propagated unchanged.
pub mod connection;
pub mod dialect;
pub mod ident;
#[cfg(feature = "mysql")]
pub mod mysql_driver;
pub mod query;
pub mod sqlite;
pub mod value;

pub use connection::*;
pub use dialect::*;
pub use query::*;
pub use value::*;
