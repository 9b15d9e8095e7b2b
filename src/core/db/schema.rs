/// Schema Reflection Module
///
/// This module reflects the tables of a live database into a `Catalog`:
/// an explicit, ordered mapping from table name to column metadata. The
/// catalog is a snapshot taken at connection time and is not refreshed.

use crate::core::{QueryDbError, Result};
use crate::results_grid::ResultsGrid;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Leading type name of a declared type, without any size arguments.
static TYPE_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_ ]*?)\s*(?:\(.*)?$").expect("type class pattern is valid")
});

/// Represents a database column with its metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Declared type as written in the DDL (may be empty)
    pub type_name: String,
    /// Whether the column allows NULL values
    pub notnull: bool,
    /// 1-based position within the primary key, 0 when not part of it
    pub pk: u32,
    /// Default value expression (if any)
    pub dflt_value: Option<String>,
}

impl Column {
    /// Creates a Column from a `pragma_table_info` result row
    fn from_pragma_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Column {
            name: row.get(0)?,
            type_name: row.get(1)?,
            notnull: row.get(2)?,
            dflt_value: row.get(3)?,
            pk: row.get(4)?,
        })
    }

    pub fn is_primary_key(&self) -> bool {
        self.pk > 0
    }

    /// Type class of the declared type, so `NVARCHAR(120)` and `NVARCHAR(40)`
    /// compare equal. Untyped columns yield an empty string.
    pub fn type_class(&self) -> String {
        TYPE_CLASS
            .captures(&self.type_name)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_ascii_uppercase())
            .unwrap_or_else(|| self.type_name.trim().to_ascii_uppercase())
    }
}

/// Represents a database table with its reflected columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// Table name
    pub name: String,
    /// Columns in declaration order
    pub columns: Vec<Column>,
}

impl Table {
    /// Creates a Table by introspecting the database for the given table name
    fn from_database(conn: &Connection, table_name: &str) -> Result<Self> {
        let columns = get_table_columns(conn, table_name)?;
        Ok(Table {
            name: table_name.to_string(),
            columns,
        })
    }

    /// Primary key column names, ordered by their position in the key.
    pub fn primary_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&Column> = self.columns.iter().filter(|c| c.is_primary_key()).collect();
        keys.sort_by_key(|c| c.pk);
        keys.into_iter().map(|c| c.name.as_str()).collect()
    }

    /// Looks a column up by exact name, then ignoring ASCII case.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
    }

    /// Like [`Table::column`], failing with `UnknownColumn`.
    pub fn try_column(&self, name: &str) -> Result<&Column> {
        self.column(name).ok_or_else(|| QueryDbError::UnknownColumn {
            table: self.name.clone(),
            column: name.to_string(),
        })
    }

    /// Number of distinct declared type classes across the columns.
    pub fn type_class_count(&self) -> usize {
        self.columns
            .iter()
            .map(Column::type_class)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Column information as a grid: `Column`, `Type`, `Primary Key`.
    pub fn describe(&self) -> ResultsGrid {
        let rows = self
            .columns
            .iter()
            .map(|c| {
                vec![
                    Value::Text(c.name.clone()),
                    Value::Text(c.type_name.clone()),
                    Value::Integer(i64::from(c.is_primary_key())),
                ]
            })
            .collect();
        ResultsGrid::new(
            vec!["Column".to_string(), "Type".to_string(), "Primary Key".to_string()],
            rows,
        )
    }
}

/// Snapshot of every user table visible to the connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    tables: BTreeMap<String, Table>,
}

impl Catalog {
    /// Reflects all user tables through the given connection
    pub fn from_connection(conn: &Connection) -> Result<Self> {
        let tables = get_all_tables(conn)?;
        debug!("Reflected {} tables", tables.len());
        Ok(Catalog { tables })
    }

    pub fn from_tables(tables: impl IntoIterator<Item = Table>) -> Self {
        Catalog {
            tables: tables.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    /// Looks a table up by exact name, then ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name).or_else(|| {
            self.tables
                .values()
                .find(|t| t.name.eq_ignore_ascii_case(name))
        })
    }

    /// Like [`Catalog::get`], failing with `UnknownTable`.
    pub fn try_get(&self, name: &str) -> Result<&Table> {
        self.get(name)
            .ok_or_else(|| QueryDbError::UnknownTable(name.to_string()))
    }

    /// Table names in sorted order, for discovery.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Per-table summary used for display.
    pub fn summary(&self) -> Summary {
        let rows = self
            .tables
            .values()
            .map(|t| SummaryRow {
                table: t.name.clone(),
                primary_keys: t.primary_keys().into_iter().map(String::from).collect(),
                column_count: t.columns.len(),
                type_class_count: t.type_class_count(),
            })
            .collect();
        Summary { rows }
    }
}

/// One line of the database summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub table: String,
    pub primary_keys: Vec<String>,
    pub column_count: usize,
    pub type_class_count: usize,
}

/// Display-only overview of the reflected tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub rows: Vec<SummaryRow>,
}

impl Summary {
    pub fn to_grid(&self) -> ResultsGrid {
        let rows = self
            .rows
            .iter()
            .map(|r| {
                // A single key prints bare, anything else as a list.
                let keys = match r.primary_keys.as_slice() {
                    [only] => only.clone(),
                    keys => format!("[{}]", keys.join(", ")),
                };
                vec![
                    Value::Text(r.table.clone()),
                    Value::Text(keys),
                    Value::Integer(r.column_count as i64),
                    Value::Integer(r.type_class_count as i64),
                ]
            })
            .collect();
        ResultsGrid::new(
            vec![
                "Table".to_string(),
                "Primary Key(s)".to_string(),
                "# of Columns".to_string(),
                "# of Column Types".to_string(),
            ],
            rows,
        )
    }
}

/// Helper function to retrieve all user-defined tables from the database
fn get_all_tables(conn: &Connection) -> Result<BTreeMap<String, Table>> {
    let mut tables = BTreeMap::new();

    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type='table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;

    let table_iter = stmt.query_map([], |row| row.get::<_, String>(0))?;

    for table_result in table_iter {
        let table_name = table_result?;
        tables.insert(table_name.clone(), Table::from_database(conn, &table_name)?);
    }

    Ok(tables)
}

/// Helper function to retrieve column information for a specific table
fn get_table_columns(conn: &Connection, table_name: &str) -> Result<Vec<Column>> {
    let mut columns = Vec::new();

    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", dflt_value, pk
         FROM pragma_table_info(?1) ORDER BY cid",
    )?;
    let column_iter = stmt.query_map([table_name], |row| Column::from_pragma_row(row))?;

    for column_result in column_iter {
        columns.push(column_result?);
    }

    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn setup_test_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE users (
                id INTEGER PRIMARY KEY,
                name NVARCHAR(120) NOT NULL,
                email NVARCHAR(60),
                age INTEGER
            );
            CREATE TABLE memberships (
                group_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                joined TEXT,
                PRIMARY KEY (user_id, group_id)
            );
            CREATE TABLE audit_log (message TEXT, at);
        ",
        )
    }

    #[test]
    fn test_schema_reflection() {
        let conn = Connection::open_in_memory().unwrap();
        setup_test_schema(&conn).unwrap();

        let catalog = Catalog::from_connection(&conn).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(
            catalog.table_names().collect::<Vec<_>>(),
            vec!["audit_log", "memberships", "users"]
        );

        let users = catalog.get("users").unwrap();
        assert_eq!(users.columns.len(), 4);
        assert_eq!(users.columns[0].name, "id");
        assert!(users.columns[0].is_primary_key());
        assert_eq!(users.columns[1].type_name, "NVARCHAR(120)");
        assert!(users.columns[1].notnull);
        assert!(!users.columns[3].is_primary_key());
    }

    #[test]
    fn test_primary_keys_follow_key_order() {
        let conn = Connection::open_in_memory().unwrap();
        setup_test_schema(&conn).unwrap();
        let catalog = Catalog::from_connection(&conn).unwrap();

        assert_eq!(catalog.try_get("users").unwrap().primary_keys(), vec!["id"]);
        // Declared as PRIMARY KEY (user_id, group_id) although group_id comes first.
        assert_eq!(catalog.try_get("memberships").unwrap().primary_keys(), vec!["user_id", "group_id"]);
        assert!(catalog.try_get("audit_log").unwrap().primary_keys().is_empty());
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let conn = Connection::open_in_memory().unwrap();
        setup_test_schema(&conn).unwrap();
        let catalog = Catalog::from_connection(&conn).unwrap();

        assert_eq!(catalog.get("USERS").unwrap().name, "users");
        assert_eq!(catalog.try_get("users").unwrap().column("EMAIL").unwrap().name, "email");
        assert!(matches!(
            catalog.try_get("nope"),
            Err(QueryDbError::UnknownTable(_))
        ));
        assert!(matches!(
            catalog.try_get("users").unwrap().try_column("nope"),
            Err(QueryDbError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_type_class() {
        let column = |type_name: &str| Column {
            name: "c".to_string(),
            type_name: type_name.to_string(),
            notnull: false,
            pk: 0,
            dflt_value: None,
        };
        assert_eq!(column("NVARCHAR(120)").type_class(), "NVARCHAR");
        assert_eq!(column("numeric(10, 2)").type_class(), "NUMERIC");
        assert_eq!(column("UNSIGNED BIG INT").type_class(), "UNSIGNED BIG INT");
        assert_eq!(column("").type_class(), "");
    }

    #[test]
    fn test_summary() {
        let conn = Connection::open_in_memory().unwrap();
        setup_test_schema(&conn).unwrap();
        let summary = Catalog::from_connection(&conn).unwrap().summary();

        let users = summary.rows.iter().find(|r| r.table == "users").unwrap();
        assert_eq!(users.primary_keys, vec!["id".to_string()]);
        assert_eq!(users.column_count, 4);
        // INTEGER and NVARCHAR; the two NVARCHAR sizes share a class.
        assert_eq!(users.type_class_count, 2);

        let grid = summary.to_grid();
        assert_eq!(grid.shape(), (3, 4));
        let rendered = grid.render();
        assert!(rendered.contains("[user_id, group_id]"));
        assert!(rendered.contains("# of Column Types"));
    }

    #[test]
    fn test_describe() {
        let conn = Connection::open_in_memory().unwrap();
        setup_test_schema(&conn).unwrap();
        let catalog = Catalog::from_connection(&conn).unwrap();

        let grid = catalog.try_get("users").unwrap().describe();
        assert_eq!(grid.columns(), &["Column", "Type", "Primary Key"]);
        assert_eq!(grid.rows()[0][2], Value::Integer(1));
        assert_eq!(grid.rows()[1][0], Value::Text("name".to_string()));
    }
}
