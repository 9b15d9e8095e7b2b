/// QueryDb Error Module
///
/// This module defines the error types shared by every layer of the crate.
/// Warnings that must not interrupt execution live here as well.
use std::fmt;
use thiserror::Error;

/// Comprehensive error type for querydb.
///
/// The variants follow the kinds of failure a caller can meet:
/// - Connectivity (cannot open or verify the connection)
/// - Usage (bad input to the query entry point, raised before any I/O)
/// - Schema (missing primary key, unknown table or column)
/// - Query execution and raw handle misuse
/// - Configuration and I/O
#[derive(Error, Debug)]
pub enum QueryDbError {
    /// The connection could not be established, verified, or is gone
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Invalid input to the query entry point
    #[error("Usage error: {0}")]
    Usage(String),

    /// Default ordering was requested on a table without a primary key
    #[error(
        "Schema error: table {table} needs a primary key for default ordering; \
         alternatively, specify an ORDER BY column with `by`"
    )]
    NoPrimaryKey { table: String },

    #[error("Schema error: no such table: {0}")]
    UnknownTable(String),

    #[error("Schema error: no such column {column} in table {table}")]
    UnknownColumn { table: String, column: String },

    /// SQL preparation or execution failed
    #[error("Query error: {0}")]
    Query(String),

    /// A raw result handle was read after it had been released
    #[error("Resource closed: {0}")]
    ResourceClosed(String),

    /// Configuration loading and resolution errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database-related errors from SQLite operations
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Type alias for Result to use QueryDbError as the error type.
pub type Result<T> = std::result::Result<T, QueryDbError>;

/// Non-fatal conditions surfaced to the caller alongside a successful result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryWarning {
    /// A table has more than one primary key and no explicit ordering column
    /// was given; `used` is the key the query was ordered by.
    MultiplePrimaryKeys {
        table: String,
        keys: Vec<String>,
        used: String,
    },
}

impl fmt::Display for QueryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryWarning::MultiplePrimaryKeys { table, keys, used } => write!(
                f,
                "more than one primary key for table {} ({}); using the first key {}",
                table,
                keys.join(", "),
                used
            ),
        }
    }
}
