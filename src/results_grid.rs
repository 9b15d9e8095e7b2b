use crate::core::{QueryDbError, Result};

/// Results Grid Module for querydb
///
/// The tabular result of a query: named columns and fully materialized rows
/// of typed SQLite values, with text rendering and export helpers.

use rusqlite::types::{Value, ValueRef};
use serde_json::{Map, Number, Value as JsonValue};
use std::fmt;

/// A materialized query result.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsGrid {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl ResultsGrid {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        ResultsGrid { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<Value>> {
        self.rows
    }

    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, matched exactly first and then ignoring ASCII case.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
    }

    /// All values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// The same grid with its rows in reverse order.
    pub fn reversed(&self) -> ResultsGrid {
        ResultsGrid {
            columns: self.columns.clone(),
            rows: self.rows.iter().rev().cloned().collect(),
        }
    }

    /// Renders the grid as aligned text with a header underline.
    pub fn render(&self) -> String {
        if self.columns.is_empty() {
            return String::new();
        }

        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(format_value).collect())
            .collect();
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &cells {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let mut output = String::new();
        output.push_str(&render_line(&self.columns, &widths));
        output.push('\n');
        let underline: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        output.push_str(&underline.join("-+-"));
        output.push('\n');
        for row in &cells {
            output.push_str(&render_line(row, &widths));
            output.push('\n');
        }
        output
    }

    /// Exports the grid data to a specified format.
    /// Supported formats: CSV, JSON, Markdown.
    pub fn export(&self, format: &str) -> Result<String> {
        match format.to_lowercase().as_str() {
            "csv" => Ok(self.export_to_csv()),
            "json" => self.export_to_json(),
            "markdown" | "md" => Ok(self.export_to_markdown()),
            _ => Err(QueryDbError::Usage(format!(
                "Unsupported export format: '{}'. Supported formats: csv, json, markdown",
                format
            ))),
        }
    }

    fn export_to_csv(&self) -> String {
        let mut output = String::new();
        let header: Vec<String> = self.columns.iter().map(|c| csv_field(c)).collect();
        output.push_str(&header.join(","));
        output.push('\n');
        for row in &self.rows {
            let fields: Vec<String> = row
                .iter()
                .map(|v| match v {
                    Value::Null => String::new(),
                    other => csv_field(&format_value(other)),
                })
                .collect();
            output.push_str(&fields.join(","));
            output.push('\n');
        }
        output
    }

    fn export_to_json(&self) -> Result<String> {
        let records: Vec<JsonValue> = self
            .rows
            .iter()
            .map(|row| {
                let mut record = Map::new();
                for (column, value) in self.columns.iter().zip(row) {
                    record.insert(column.clone(), to_json(value));
                }
                JsonValue::Object(record)
            })
            .collect();
        Ok(serde_json::to_string(&records)?)
    }

    fn export_to_markdown(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("| {} |\n", self.columns.join(" | ")));
        let underline: Vec<String> = self
            .columns
            .iter()
            .map(|c| "-".repeat(c.len().max(3)))
            .collect();
        output.push_str(&format!("| {} |\n", underline.join(" | ")));
        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .map(|v| format_value(v).replace('|', "\\|"))
                .collect();
            output.push_str(&format!("| {} |\n", cells.join(" | ")));
        }
        output
    }
}

impl fmt::Display for ResultsGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn render_line(cells: &[String], widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect();
    padded.join(" | ").trim_end().to_string()
}

fn csv_field(field: &str) -> String {
    if field.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Integer(i) => JsonValue::from(*i),
        Value::Real(f) => Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::Text(t) => JsonValue::String(t.clone()),
        Value::Blob(_) => JsonValue::String(format_value(value)),
    }
}

/// Formats a SQLite value for display
pub fn format_value(value: &Value) -> String {
    match ValueRef::from(value) {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).to_string(),
        ValueRef::Blob(b) => format!("<BLOB: {} bytes>", b.len()),
    }
}
