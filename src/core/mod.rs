/// Core Module for querydb
///
/// This module contains the shared infrastructure: the error type and the
/// database layer (connection management, schema reflection, query
/// execution).

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{QueryDbError, QueryWarning, Result};
