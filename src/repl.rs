use crate::accessor::{Accessor, Filter};
use crate::core::{QueryDbError, Result};
use crate::query_db::QueryDb;
use crate::results_grid::ResultsGrid;
use std::io::{BufRead, Write};

const DEFAULT_ROWS: usize = 10;

/// Represents a parsed REPL command.
#[derive(Debug, PartialEq)]
pub enum Command {
    Tables,
    Summary,
    Describe(String),
    Head {
        target: String,
        n: usize,
        by: Option<String>,
    },
    Tail {
        target: String,
        n: usize,
        by: Option<String>,
    },
    Where { table: String, clause: String },
    Key { table: String, value: String },
    Export(String),
    Status,
    Help,
    Quit,
    Sql(String),
    Unknown(String),
}

/// Parses a user input string into a corresponding `Command`.
///
/// If the input starts with a colon (`:`), it is interpreted as a command.
/// Otherwise, it is treated as a SQL query.
pub fn parse_command(input: &str) -> Command {
    let input = input.trim();
    let Some(trimmed) = input.strip_prefix(':') else {
        return Command::Sql(input.to_string());
    };
    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    if parts.is_empty() {
        return Command::Unknown(input.to_string());
    }
    let rest = |skip: usize| parts[skip..].join(" ");
    match parts[0] {
        "tables" => Command::Tables,
        "summary" => Command::Summary,
        "describe" if parts.len() == 2 => Command::Describe(parts[1].to_string()),
        "head" | "tail" if (2..=4).contains(&parts.len()) => {
            let n = match parts.get(2) {
                Some(raw) => match raw.parse::<usize>() {
                    Ok(n) => n,
                    Err(_) => return Command::Unknown(input.to_string()),
                },
                None => DEFAULT_ROWS,
            };
            let target = parts[1].to_string();
            let by = parts.get(3).map(|s| s.to_string());
            if parts[0] == "head" {
                Command::Head { target, n, by }
            } else {
                Command::Tail { target, n, by }
            }
        }
        "where" if parts.len() >= 3 => Command::Where {
            table: parts[1].to_string(),
            clause: rest(2),
        },
        "key" if parts.len() >= 3 => Command::Key {
            table: parts[1].to_string(),
            value: rest(2),
        },
        "export" if parts.len() == 2 => Command::Export(parts[1].to_string()),
        "status" => Command::Status,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(input.to_string()),
    }
}

/// Resolves `table` or `table.column` to an accessor.
fn resolve_target<'db>(db: &'db QueryDb, target: &str) -> Result<Accessor<'db>> {
    match target.split_once('.') {
        Some((table, column)) => db.try_table(table)?.try_column(column),
        None => db.try_table(target),
    }
}

fn print_help<W: Write>(output: &mut W) -> Result<()> {
    writeln!(output, "Available commands:")?;
    writeln!(output, "  :tables - List the reflected tables")?;
    writeln!(output, "  :summary - Show keys, column and type counts per table")?;
    writeln!(output, "  :describe <table[.column]> - Show column information")?;
    writeln!(output, "  :head <table[.column]> [n] [by] - First n rows (default {})", DEFAULT_ROWS)?;
    writeln!(output, "  :tail <table[.column]> [n] [by] - Last n rows (default {})", DEFAULT_ROWS)?;
    writeln!(output, "  :where <table> <clause> - Rows matching a WHERE clause")?;
    writeln!(output, "  :key <table> <value> - Rows whose primary key equals a value")?;
    writeln!(output, "  :export <csv|json|markdown> - Export the last result")?;
    writeln!(output, "  :status - Check the connection")?;
    writeln!(output, "  :quit - Leave")?;
    writeln!(output, "\nOr enter SQL queries directly without any prefix.")?;
    Ok(())
}

fn print_grid<W: Write>(output: &mut W, grid: &Option<ResultsGrid>) -> Result<()> {
    match grid {
        Some(grid) => {
            write!(output, "{}", grid.render())?;
            writeln!(output, "\n({} rows)", grid.row_count())?;
        }
        None => writeln!(output, "(no rows)")?,
    }
    Ok(())
}

/// Runs a command and returns the rows it produced, if any.
fn execute<W: Write>(
    db: &QueryDb,
    command: Command,
    last: &Option<ResultsGrid>,
    output: &mut W,
) -> Result<Option<Option<ResultsGrid>>> {
    let rows = match command {
        Command::Tables => {
            for name in db.inspect().table_names() {
                writeln!(output, "{}", name)?;
            }
            return Ok(None);
        }
        Command::Summary => Some(db.summary().to_grid()),
        Command::Describe(target) => Some(resolve_target(db, &target)?.describe()),
        Command::Head { target, n, by } => resolve_target(db, &target)?.head(n, by.as_deref())?,
        Command::Tail { target, n, by } => resolve_target(db, &target)?.tail(n, by.as_deref())?,
        Command::Where { table, clause } => db.try_table(&table)?.filter(&Filter::clause(clause))?,
        Command::Key { table, value } => db.try_table(&table)?.filter(&Filter::key(value))?,
        Command::Export(format) => {
            let grid = last.as_ref().ok_or_else(|| {
                QueryDbError::Usage("no result to export yet".to_string())
            })?;
            writeln!(output, "{}", grid.export(&format)?.trim_end())?;
            return Ok(None);
        }
        Command::Status => {
            writeln!(output, "{}", db)?;
            return Ok(None);
        }
        Command::Help => {
            print_help(output)?;
            return Ok(None);
        }
        Command::Sql(sql) => db.q(&sql)?,
        Command::Unknown(input) => {
            return Err(QueryDbError::Usage(format!(
                "unknown command '{}'; type :help for the list",
                input
            )))
        }
        Command::Quit => return Ok(None),
    };
    Ok(Some(rows))
}

/// Runs the interactive shell until `:quit` or end of input.
pub fn run_repl<R: BufRead, W: Write>(db: &QueryDb, mut input: R, mut output: W) -> Result<()> {
    writeln!(output, "Type :help for commands, :quit to exit.")?;
    let mut line = String::new();
    let mut last: Option<ResultsGrid> = None;

    loop {
        write!(output, "> ")?;
        output.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let command = parse_command(trimmed);
        if command == Command::Quit {
            break;
        }
        match execute(db, command, &last, &mut output) {
            Ok(Some(rows)) => {
                print_grid(&mut output, &rows)?;
                if rows.is_some() {
                    last = rows;
                }
            }
            Ok(None) => {}
            Err(e) => writeln!(output, "Error: {}", e)?,
        }
        for warning in db.take_warnings() {
            writeln!(output, "Warning: {}", warning)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_script;

    fn run(script: &str) -> String {
        let db = QueryDb::from_script("fixture", &sample_script()).unwrap();
        let mut out = Vec::new();
        run_repl(&db, script.as_bytes(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_head_command() {
        assert_eq!(
            parse_command(":head Track.Composer 5 Milliseconds"),
            Command::Head {
                target: "Track.Composer".to_string(),
                n: 5,
                by: Some("Milliseconds".to_string())
            }
        );
        assert_eq!(
            parse_command(":tail Genre"),
            Command::Tail {
                target: "Genre".to_string(),
                n: DEFAULT_ROWS,
                by: None
            }
        );
    }

    #[test]
    fn test_parse_bad_count() {
        assert_eq!(
            parse_command(":head Genre many"),
            Command::Unknown(":head Genre many".to_string())
        );
    }

    #[test]
    fn test_parse_where_keeps_clause() {
        assert_eq!(
            parse_command(":where Track Composer = 'Philip Glass'"),
            Command::Where {
                table: "Track".to_string(),
                clause: "Composer = 'Philip Glass'".to_string()
            }
        );
    }

    #[test]
    fn test_parse_sql_query() {
        let cmd = parse_command("SELECT * FROM users");
        assert_eq!(cmd, Command::Sql("SELECT * FROM users".to_string()));
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(parse_command(":invalid"), Command::Unknown(":invalid".to_string()));
        assert_eq!(parse_command(":"), Command::Unknown(":".to_string()));
    }

    #[test]
    fn test_repl_session() {
        let out = run(":tables\n:head accounts 2\n:export csv\n:quit\nSELECT 1\n");
        assert!(out.contains("accounts\nevents\nmemberships\n"));
        assert!(out.contains("(2 rows)"));
        assert!(out.contains("id,name,balance\n1,alice,120.5\n2,bob,0\n"));
        // Input after :quit is never run.
        assert!(!out.contains("(1 rows)"));
    }

    #[test]
    fn test_repl_reports_errors_and_warnings() {
        let out = run(":head events\n:tail memberships 1\n:export xml\nSELECT * FROM nope\n");
        assert!(out.contains("Error: Schema error: table events needs a primary key"));
        assert!(out.contains("Warning: more than one primary key for table memberships"));
        assert!(out.contains("Unsupported export format"));
        assert!(out.contains("no such table: nope"));
    }

    #[test]
    fn test_repl_key_and_where() {
        let out = run(":key accounts 2\n:where accounts balance > 100\n");
        assert!(out.contains("bob"));
        assert!(out.contains("alice"));
        assert_eq!(out.matches("(1 rows)").count(), 2);
    }
}
