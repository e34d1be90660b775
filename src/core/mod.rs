/// Core Module
///
/// Shared infrastructure for postfix-forward: the error type and the
/// database layer (values, statement building, dialects, drivers and the
/// transactional scope).

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{ForwardError, Result};
