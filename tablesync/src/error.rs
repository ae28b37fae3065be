//! Error types for tablesync

use thiserror::Error;

use crate::query::value::SqlValue;

/// Result type for tablesync operations
pub type Result<T> = std::result::Result<T, Error>;

/// A group of rows sharing the same values on a set of columns
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub values: Vec<SqlValue>,
    pub count: i64,
}

/// Error types for tablesync
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Introspection error: {0}")]
    IntrospectionError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("DDL statement failed: {message} (statement: {statement})")]
    DdlExecutionError { statement: String, message: String },

    #[error(
        "Cannot add unique constraint `{constraint}` on `{table}` ({}): {} duplicate value group(s)",
        columns.join(", "),
        groups.len()
    )]
    DuplicateValueError {
        table: String,
        constraint: String,
        columns: Vec<String>,
        groups: Vec<DuplicateGroup>,
    },

    #[error("Unsupported operator: {0}")]
    UnsupportedOperatorError(String),

    #[error("Type mapping error: {0}")]
    TypeMappingError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl Error {
    /// Whether the error came from the transport rather than the server
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::ConnectionError(_))
    }
}

/// Transport failures become connection errors, everything the server
/// rejected stays a database error
impl From<sqlx::Error> for Error {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Error::ConnectionError(error.to_string()),
            other => Error::DatabaseError(other.to_string()),
        }
    }
}

/// Convert Serde JSON errors to tablesync errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert TOML deserialization errors to tablesync errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}
