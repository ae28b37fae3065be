//! Database module for tablesync
//!
//! This module handles database connections, statement execution and
//! migration history.

pub mod connection;
pub mod executor;
pub mod history;

// Re-export key types
pub use connection::{connect, DatabaseConnection};
pub use executor::{Row, SqlExecutor};
pub use history::MigrationHistory;
