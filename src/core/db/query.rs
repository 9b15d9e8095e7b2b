/// Query Execution Module
///
/// Executes raw SQL against a connection and hands back either a fully
/// materialized `ResultsGrid` or a connection-bound `RawResult` cursor.

use crate::core::{QueryDbError, Result};
use crate::results_grid::ResultsGrid;
use rusqlite::types::Value;
use rusqlite::{Connection, Statement};
use std::collections::VecDeque;
use std::str::FromStr;
use tracing::debug;

/// How a query result is handed back to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnAs {
    /// Materialize everything into a `ResultsGrid`
    #[default]
    Tabular,
    /// Hand back a live `RawResult` bound to the connection
    Raw,
}

impl FromStr for ReturnAs {
    type Err = QueryDbError;

    /// Accepts `df`, `dataframe`, `tabular`, `result`, `resultproxy` and
    /// `raw`, ignoring case.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DF" | "DATAFRAME" | "TABULAR" => Ok(ReturnAs::Tabular),
            "RESULT" | "RESULTPROXY" | "RAW" => Ok(ReturnAs::Raw),
            _ => Err(QueryDbError::Usage(format!(
                "unsupported return type '{}'; expected one of: dataframe, df, tabular, result, resultproxy, raw",
                s
            ))),
        }
    }
}

/// Rejects SQL text that is empty or only whitespace.
pub fn check_sql(sql: &str) -> Result<&str> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(QueryDbError::Usage(
            "Cannot execute empty SQL query - please provide a valid SQL statement".to_string(),
        ));
    }
    Ok(trimmed)
}

/// Result of the query entry point
#[derive(Debug)]
pub enum QueryOutput<'conn> {
    /// `None` when the query produced no rows
    Tabular(Option<ResultsGrid>),
    Raw(RawResult<'conn>),
}

impl<'conn> QueryOutput<'conn> {
    /// Tabular form of the output, draining a raw handle if necessary.
    pub fn into_tabular(self) -> Result<Option<ResultsGrid>> {
        match self {
            QueryOutput::Tabular(grid) => Ok(grid),
            QueryOutput::Raw(raw) => raw.into_grid(),
        }
    }

    pub fn into_raw(self) -> Option<RawResult<'conn>> {
        match self {
            QueryOutput::Raw(raw) => Some(raw),
            QueryOutput::Tabular(_) => None,
        }
    }
}

/// A cursor over an executed statement.
///
/// The statement runs when the handle is opened, so its effects and errors
/// happen at query time. After [`RawResult::close`] (or once dropped) the
/// statement is released and every read fails with
/// `QueryDbError::ResourceClosed`.
#[derive(Debug)]
pub struct RawResult<'conn> {
    sql: String,
    columns: Vec<String>,
    statement: Option<Statement<'conn>>,
    pending: VecDeque<Vec<Value>>,
}

impl<'conn> RawResult<'conn> {
    fn open(sql: &str, mut statement: Statement<'conn>) -> Result<Self> {
        let columns = statement.column_names().into_iter().map(String::from).collect();
        let pending = collect_rows(&mut statement)?.into();
        Ok(RawResult {
            sql: sql.to_string(),
            columns,
            statement: Some(statement),
            pending,
        })
    }

    /// Column names of the result set. Still available after closing.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_closed(&self) -> bool {
        self.statement.is_none()
    }

    /// Releases the statement. Further reads fail.
    pub fn close(&mut self) {
        if self.statement.take().is_some() {
            debug!("Released raw result for: {}", self.sql);
        }
        self.pending.clear();
    }

    fn pending(&mut self) -> Result<&mut VecDeque<Vec<Value>>> {
        if self.statement.is_none() {
            return Err(QueryDbError::ResourceClosed(format!(
                "the result of '{}' has been released",
                self.sql
            )));
        }
        Ok(&mut self.pending)
    }

    /// Next row, or `None` once exhausted.
    pub fn fetch_one(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.pending()?.pop_front())
    }

    /// Up to `n` of the remaining rows.
    pub fn fetch_many(&mut self, n: usize) -> Result<Vec<Vec<Value>>> {
        let pending = self.pending()?;
        let take = n.min(pending.len());
        Ok(pending.drain(..take).collect())
    }

    /// Every remaining row.
    pub fn fetch_all(&mut self) -> Result<Vec<Vec<Value>>> {
        Ok(self.pending()?.drain(..).collect())
    }

    /// Drains the remaining rows into a grid and releases the handle.
    pub fn into_grid(mut self) -> Result<Option<ResultsGrid>> {
        let rows = self.fetch_all()?;
        self.close();
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(ResultsGrid::new(self.columns.clone(), rows)))
    }
}

/// Query execution service that operates on a database connection
pub struct QueryExecutor<'a> {
    connection: &'a Connection,
}

impl<'a> QueryExecutor<'a> {
    /// Creates a new QueryExecutor for the given connection
    pub fn new(connection: &'a Connection) -> Self {
        QueryExecutor { connection }
    }

    /// Runs `sql` and hands the result back in the requested form.
    pub fn run(&self, sql: &str, mode: ReturnAs) -> Result<QueryOutput<'a>> {
        match mode {
            ReturnAs::Tabular => self.execute(sql).map(QueryOutput::Tabular),
            ReturnAs::Raw => self.open_raw(sql).map(QueryOutput::Raw),
        }
    }

    /// Executes a SQL query and materializes every row.
    ///
    /// # Returns
    ///
    /// `None` when the statement produced no rows, otherwise a grid whose
    /// columns are taken from the result set.
    ///
    /// # Errors
    ///
    /// Returns `QueryDbError::Query` if the SQL syntax is invalid or if the
    /// database operation fails.
    pub fn execute(&self, sql: &str) -> Result<Option<ResultsGrid>> {
        let mut stmt = self.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = collect_rows(&mut stmt)?;
        debug!("Query returned {} rows", rows.len());

        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(ResultsGrid::new(columns, rows)))
    }

    /// Executes `sql` and returns a cursor over its rows.
    ///
    /// # Errors
    ///
    /// Returns `QueryDbError::Query` if the statement cannot be prepared or
    /// fails while running.
    pub fn open_raw(&self, sql: &str) -> Result<RawResult<'a>> {
        let stmt = self.prepare(sql)?;
        RawResult::open(sql, stmt)
    }

    /// Prepares a SQL statement for execution without running it
    pub fn prepare(&self, sql: &str) -> Result<Statement<'a>> {
        debug!("Executing: {}", sql);
        self.connection
            .prepare(sql)
            .map_err(|e| QueryDbError::Query(format!("Failed to prepare statement: {}", e)))
    }
}

fn collect_rows(stmt: &mut Statement<'_>) -> Result<Vec<Vec<Value>>> {
    let column_count = stmt.column_count();
    stmt.query_map([], |row| {
        (0..column_count)
            .map(|i| row.get::<_, Value>(i))
            .collect::<rusqlite::Result<Vec<_>>>()
    })
    .map_err(|e| QueryDbError::Query(format!("Query execution failed: {}", e)))?
    .collect::<std::result::Result<Vec<_>, _>>()
    .map_err(|e| QueryDbError::Query(format!("Result processing failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::DatabaseFixture;

    #[test]
    fn test_return_as_parsing() {
        assert_eq!("dataframe".parse::<ReturnAs>().unwrap(), ReturnAs::Tabular);
        assert_eq!("DF".parse::<ReturnAs>().unwrap(), ReturnAs::Tabular);
        assert_eq!("result".parse::<ReturnAs>().unwrap(), ReturnAs::Raw);
        assert_eq!("ResultProxy".parse::<ReturnAs>().unwrap(), ReturnAs::Raw);
        match "junk".parse::<ReturnAs>() {
            Err(QueryDbError::Usage(msg)) => assert!(msg.contains("junk")),
            other => panic!("Expected Usage error, got {:?}", other),
        }
    }

    #[test]
    fn test_check_sql() {
        assert_eq!(check_sql("  SELECT 1 ").unwrap(), "SELECT 1");
        assert!(matches!(check_sql("   "), Err(QueryDbError::Usage(_))));
    }

    #[test]
    fn test_query_execution() {
        let fixture = DatabaseFixture::with_sample_data().unwrap();
        let executor = QueryExecutor::new(&fixture.connection);

        let grid = executor
            .execute("SELECT id, name FROM accounts ORDER BY id")
            .unwrap()
            .unwrap();
        assert_eq!(grid.columns(), &["id", "name"]);
        assert_eq!(grid.row_count(), 4);
        assert_eq!(grid.rows()[0], vec![Value::Integer(1), Value::Text("alice".to_string())]);
    }

    #[test]
    fn test_no_rows_is_none() {
        let fixture = DatabaseFixture::with_sample_data().unwrap();
        let executor = QueryExecutor::new(&fixture.connection);
        let result = executor.execute("SELECT * FROM accounts WHERE id < 0").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_query_error_handling() {
        let fixture = DatabaseFixture::new().unwrap();
        let executor = QueryExecutor::new(&fixture.connection);

        match executor.execute("SELECT * FROM nonexistent_table") {
            Err(QueryDbError::Query(msg)) => assert!(msg.contains("no such table")),
            other => panic!("Expected Query error, got {:?}", other),
        }
    }

    #[test]
    fn test_raw_result_cursor() {
        let fixture = DatabaseFixture::with_sample_data().unwrap();
        let executor = QueryExecutor::new(&fixture.connection);

        let mut raw = executor.open_raw("SELECT id FROM accounts ORDER BY id").unwrap();
        assert_eq!(raw.columns(), &["id"]);
        assert_eq!(raw.fetch_one().unwrap(), Some(vec![Value::Integer(1)]));
        assert_eq!(raw.fetch_many(2).unwrap().len(), 2);
        assert_eq!(raw.fetch_all().unwrap(), vec![vec![Value::Integer(4)]]);
        assert_eq!(raw.fetch_one().unwrap(), None);
    }

    #[test]
    fn test_raw_result_fails_after_close() {
        let fixture = DatabaseFixture::with_sample_data().unwrap();
        let executor = QueryExecutor::new(&fixture.connection);

        let mut raw = executor.open_raw("SELECT * FROM accounts").unwrap();
        raw.close();
        assert!(raw.is_closed());
        assert!(matches!(raw.fetch_all(), Err(QueryDbError::ResourceClosed(_))));
        assert!(matches!(raw.fetch_one(), Err(QueryDbError::ResourceClosed(_))));
        // Column names survive the release.
        assert_eq!(raw.columns().len(), 3);
    }

    #[test]
    fn test_raw_statement_runs_when_opened() {
        let fixture = DatabaseFixture::with_sample_data().unwrap();
        let executor = QueryExecutor::new(&fixture.connection);

        let mut raw = executor
            .open_raw("INSERT INTO accounts (name, balance) VALUES ('erin', 3.5)")
            .unwrap();
        assert!(raw.columns().is_empty());
        raw.close();

        let count: i64 = fixture
            .connection
            .query_row("SELECT COUNT(*) FROM accounts WHERE name = 'erin'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_raw_runtime_error_is_immediate() {
        let fixture = DatabaseFixture::new().unwrap();
        let executor = QueryExecutor::new(&fixture.connection);

        match executor.open_raw("SELECT abs(-9223372036854775808)") {
            Err(QueryDbError::Query(msg)) => assert!(msg.contains("overflow")),
            other => panic!("Expected Query error, got {:?}", other),
        };
    }

    #[test]
    fn test_raw_into_tabular() {
        let fixture = DatabaseFixture::with_sample_data().unwrap();
        let executor = QueryExecutor::new(&fixture.connection);

        let output = executor.run("SELECT name FROM accounts ORDER BY id", ReturnAs::Raw).unwrap();
        let grid = output.into_tabular().unwrap().unwrap();
        assert_eq!(grid.shape(), (4, 1));
    }

    #[test]
    fn test_blob_handling() {
        let fixture = DatabaseFixture::new().unwrap();
        fixture
            .connection
            .execute_batch("CREATE TABLE blobs (id INTEGER, data BLOB); INSERT INTO blobs VALUES (1, X'48656C6C6F');")
            .unwrap();

        let executor = QueryExecutor::new(&fixture.connection);
        let grid = executor.execute("SELECT data FROM blobs WHERE id = 1").unwrap().unwrap();
        assert_eq!(grid.rows()[0][0], Value::Blob(b"Hello".to_vec()));
        assert!(grid.render().contains("<BLOB: 5 bytes>"));
    }
}
