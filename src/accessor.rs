//! Row accessors: query shorthands bound to one reflected table or column.
//!
//! An [`Accessor`] only builds SQL text from the reflected metadata and hands
//! it to the session's query entry point; it never executes anything itself.
use crate::core::db::{Column, QueryOutput, ReturnAs, Table};
use crate::core::{QueryDbError, QueryWarning, Result};
use crate::query_db::QueryDb;
use crate::results_grid::ResultsGrid;
use rusqlite::types::Value;
use std::fmt;
use tracing::warn;

/// Substrings that mark a fragment as a comparison clause for [`Filter::infer`].
const COMPARISON_TOKENS: [&str; 5] = ["=", ">", "<", "LIKE", "like"];

/// Row selection for [`Accessor::filter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// A WHERE clause used verbatim
    Clause(String),
    /// A SQL literal compared for equality with the first primary key
    KeyEquals(String),
}

impl Filter {
    pub fn clause(clause: impl Into<String>) -> Self {
        Filter::Clause(clause.into())
    }

    /// Equality against the primary key with `literal` inserted verbatim.
    pub fn key(literal: impl Into<String>) -> Self {
        Filter::KeyEquals(literal.into())
    }

    /// Equality against the primary key with a typed value rendered as a
    /// SQL literal.
    pub fn key_value(value: impl Into<Value>) -> Self {
        Filter::KeyEquals(sql_literal(&value.into()))
    }

    /// Guesses the intent of a free-form fragment.
    ///
    /// A fragment containing `=`, `>`, `<`, `LIKE` or `like` is a clause;
    /// anything else is a primary key value. This is a substring test, not a
    /// parser.
    pub fn infer(fragment: &str) -> Self {
        if COMPARISON_TOKENS.iter().any(|token| fragment.contains(token)) {
            Filter::Clause(fragment.to_string())
        } else {
            Filter::KeyEquals(fragment.trim().to_string())
        }
    }
}

/// Quotes an identifier for SQLite.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Renders a value as a SQL literal.
pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => format!("{:?}", f),
        Value::Text(t) => format!("'{}'", t.replace('\'', "''")),
        Value::Blob(b) => {
            let hex: String = b.iter().map(|byte| format!("{:02X}", byte)).collect();
            format!("X'{}'", hex)
        }
    }
}

/// A view of one table, or of one column within it.
#[derive(Clone, Copy)]
pub struct Accessor<'db> {
    db: &'db QueryDb,
    table: &'db Table,
    column: Option<&'db Column>,
}

impl<'db> Accessor<'db> {
    pub(crate) fn for_table(db: &'db QueryDb, table: &'db Table) -> Self {
        Accessor {
            db,
            table,
            column: None,
        }
    }

    pub fn table(&self) -> &'db Table {
        self.table
    }

    /// The bound column, `None` for a table accessor.
    pub fn column_meta(&self) -> Option<&'db Column> {
        self.column
    }

    pub fn is_table(&self) -> bool {
        self.column.is_none()
    }

    /// Accessor for one column of this table.
    pub fn column(&self, name: &str) -> Option<Accessor<'db>> {
        self.table.column(name).map(|column| Accessor {
            column: Some(column),
            ..*self
        })
    }

    pub fn try_column(&self, name: &str) -> Result<Accessor<'db>> {
        let column = self.table.try_column(name)?;
        Ok(Accessor {
            column: Some(column),
            ..*self
        })
    }

    /// One accessor per column, in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = Accessor<'db>> + 'db {
        let (db, table) = (self.db, self.table);
        table.columns.iter().map(move |column| Accessor {
            db,
            table,
            column: Some(column),
        })
    }

    /// Column information for the table, or the single bound column.
    pub fn describe(&self) -> ResultsGrid {
        let grid = self.table.describe();
        match self.column {
            None => grid,
            Some(column) => {
                let columns = grid.columns().to_vec();
                let rows = grid
                    .into_rows()
                    .into_iter()
                    .filter(|row| row[0] == Value::Text(column.name.clone()))
                    .collect();
                ResultsGrid::new(columns, rows)
            }
        }
    }

    fn selection(&self) -> String {
        match self.column {
            Some(column) => quote_ident(&column.name),
            None => "*".to_string(),
        }
    }

    /// Column to order by: `by` when given, else the first primary key.
    ///
    /// # Errors
    ///
    /// `UnknownColumn` if `by` is not a column of the table, `NoPrimaryKey`
    /// if `by` is absent and the table has no primary key.
    pub fn order_key(&self, by: Option<&str>) -> Result<&'db str> {
        if let Some(by) = by {
            return Ok(self.table.try_column(by)?.name.as_str());
        }
        self.primary_key()
    }

    fn primary_key(&self) -> Result<&'db str> {
        let keys = self.table.primary_keys();
        match keys.as_slice() {
            [] => Err(QueryDbError::NoPrimaryKey {
                table: self.table.name.clone(),
            }),
            [only] => Ok(*only),
            [first, ..] => {
                let warning = QueryWarning::MultiplePrimaryKeys {
                    table: self.table.name.clone(),
                    keys: keys.iter().map(|k| k.to_string()).collect(),
                    used: first.to_string(),
                };
                warn!("{}", warning);
                self.db.record_warning(warning);
                Ok(*first)
            }
        }
    }

    fn ordered_sql(&self, n: usize, by: Option<&str>, direction: &str) -> Result<String> {
        let key = self.order_key(by)?;
        Ok(format!(
            "SELECT {} FROM {} ORDER BY {} {} LIMIT {}",
            self.selection(),
            quote_ident(&self.table.name),
            quote_ident(key),
            direction,
            n
        ))
    }

    /// SQL for the first `n` rows in ascending order.
    pub fn head_sql(&self, n: usize, by: Option<&str>) -> Result<String> {
        self.ordered_sql(n, by, "ASC")
    }

    /// SQL for the last `n` rows, newest first.
    pub fn tail_sql(&self, n: usize, by: Option<&str>) -> Result<String> {
        self.ordered_sql(n, by, "DESC")
    }

    /// SQL selecting the rows that match `filter`.
    ///
    /// # Errors
    ///
    /// `Usage` for an empty clause or key value, `NoPrimaryKey` for key
    /// equality on a table without a primary key.
    pub fn filter_sql(&self, filter: &Filter) -> Result<String> {
        let text = match filter {
            Filter::Clause(text) | Filter::KeyEquals(text) => text,
        };
        if text.trim().is_empty() {
            return Err(QueryDbError::Usage(format!(
                "empty filter for table {}; give a WHERE clause or a primary key value",
                self.table.name
            )));
        }
        let condition = match filter {
            Filter::Clause(clause) => clause.clone(),
            Filter::KeyEquals(literal) => {
                format!("{} = {}", quote_ident(self.primary_key()?), literal)
            }
        };
        Ok(format!(
            "SELECT {} FROM {} WHERE {}",
            self.selection(),
            quote_ident(&self.table.name),
            condition
        ))
    }

    /// First `n` rows ordered ascending by `by` or the first primary key.
    pub fn head(&self, n: usize, by: Option<&str>) -> Result<Option<ResultsGrid>> {
        self.head_as(n, by, ReturnAs::Tabular)?.into_tabular()
    }

    /// Last `n` rows: ordered descending, so in reverse relative to `head`.
    pub fn tail(&self, n: usize, by: Option<&str>) -> Result<Option<ResultsGrid>> {
        self.tail_as(n, by, ReturnAs::Tabular)?.into_tabular()
    }

    /// Alias for [`Accessor::head`].
    pub fn first(&self, n: usize, by: Option<&str>) -> Result<Option<ResultsGrid>> {
        self.head(n, by)
    }

    /// Alias for [`Accessor::tail`].
    pub fn last(&self, n: usize, by: Option<&str>) -> Result<Option<ResultsGrid>> {
        self.tail(n, by)
    }

    pub fn filter(&self, filter: &Filter) -> Result<Option<ResultsGrid>> {
        self.filter_as(filter, ReturnAs::Tabular)?.into_tabular()
    }

    pub fn head_as(&self, n: usize, by: Option<&str>, mode: ReturnAs) -> Result<QueryOutput<'db>> {
        let sql = self.head_sql(n, by)?;
        self.db.query_as(&sql, mode)
    }

    pub fn tail_as(&self, n: usize, by: Option<&str>, mode: ReturnAs) -> Result<QueryOutput<'db>> {
        let sql = self.tail_sql(n, by)?;
        self.db.query_as(&sql, mode)
    }

    pub fn filter_as(&self, filter: &Filter, mode: ReturnAs) -> Result<QueryOutput<'db>> {
        let sql = self.filter_sql(filter)?;
        self.db.query_as(&sql, mode)
    }
}

impl fmt::Display for Accessor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column {
            Some(column) => write!(f, "{}.{}", self.table.name, column.name),
            None => f.write_str(&self.table.name),
        }
    }
}

impl fmt::Debug for Accessor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("table", &self.table.name)
            .field("column", &self.column.map(|c| c.name.as_str()))
            .finish()
    }
}
