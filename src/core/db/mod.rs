/// Database Module
///
/// The database layer is split into three concerns:
/// - **Connection Management** (`connection.rs`): URL resolution output, opening, verification, liveness
/// - **Schema Reflection** (`schema.rs`): the table/column snapshot taken at connection time
/// - **Query Execution** (`query.rs`): running SQL into tabular results or raw cursors
///
/// All operations use the crate-wide `QueryDbError` type.
pub mod connection;
pub mod query;
pub mod schema;

pub use connection::*;
pub use query::*;
pub use schema::*;
