// Core infrastructure modules
pub mod core;

// Feature-specific modules
pub mod backend;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod forward;
pub mod postfix;
pub mod prompt;

#[cfg(test)]
mod test_utils;

pub use crate::backend::{Backend, BackendRegistry, ConnectionParams, Role};
pub use crate::core::{ForwardError, Result};
