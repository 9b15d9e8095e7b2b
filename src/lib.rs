// Core infrastructure modules
pub mod core;

// Feature-specific modules
pub mod accessor;
pub mod cli;
pub mod config;
pub mod demo;
pub mod password;
pub mod query_db;
pub mod repl;
pub mod results_grid;

#[cfg(test)]
mod test_utils;

pub use accessor::{Accessor, Filter};
pub use config::Config;
pub use core::db::{Catalog, QueryOutput, RawResult, ReturnAs};
pub use core::{QueryDbError, QueryWarning, Result};
pub use query_db::QueryDb;
pub use results_grid::ResultsGrid;
