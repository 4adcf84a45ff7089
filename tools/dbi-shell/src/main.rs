///
/// dbi-shell - Run SQL against a sqlite3 datasource
///
/// Commands:
/// - dbi-shell <ds> exec <sql> [args...]: exec, prints columns or affected rows
/// - dbi-shell <ds> exec-raw <sql>: exec without placeholder processing
/// - dbi-shell <ds> select <sql> [args...]: column-oriented result
/// - dbi-shell <ds> rows <sql> [args...]: row-oriented result
/// - dbi-shell <ds> cursor <sql> [args...] --batch N: prepared cursor, one
///   JSON line per batch
/// - dbi-shell <ds> describe <sql> [args...]: column metadata
/// - dbi-shell <ds> version: engine version
///
/// Arguments are JSON literals: `7`, `2.5`, `true`, `null`, `"text"`, and
/// arrays of byte values (`[0, 255]`) for binary data.
///

use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use thiserror::Error;
use tracing::Level;

use dbi_core::{Rows, Value};
use dbi_sqlite3::{Connection, Sqlite3Driver, StatementState, DRIVER_NAME};

#[derive(Parser)]
#[command(name = "dbi-shell")]
#[command(author, version, about = "Run parameterized SQL against a sqlite3 datasource", long_about = None)]
struct Cli {
    /// Datasource: [sqlite3:]database[{key=value,...}]
    datasource: String,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a statement (columns for queries, affected rows otherwise)
    Exec {
        sql: String,
        #[arg(value_parser = parse_value, allow_negative_numbers = true)]
        args: Vec<Value>,
    },

    /// Execute a statement without placeholder processing
    ExecRaw { sql: String },

    /// Run a query and print a column-oriented result
    Select {
        sql: String,
        #[arg(value_parser = parse_value, allow_negative_numbers = true)]
        args: Vec<Value>,
    },

    /// Run a query and print a row-oriented result
    Rows {
        sql: String,
        #[arg(value_parser = parse_value, allow_negative_numbers = true)]
        args: Vec<Value>,
    },

    /// Step through a query with a prepared statement
    Cursor {
        sql: String,
        #[arg(value_parser = parse_value, allow_negative_numbers = true)]
        args: Vec<Value>,

        /// Rows fetched per batch
        #[arg(long, default_value_t = 100)]
        batch: usize,
    },

    /// Print column metadata for a query
    Describe {
        sql: String,
        #[arg(value_parser = parse_value, allow_negative_numbers = true)]
        args: Vec<Value>,
    },

    /// Print the engine version
    Version,
}

#[derive(Debug, Error)]
enum ShellError {
    #[error(transparent)]
    Driver(#[from] dbi_sqlite3::Error),

    #[error("failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

impl ShellError {
    fn tag(&self) -> &'static str {
        match self {
            ShellError::Driver(e) => e.tag(),
            ShellError::Output(_) => "DBI-SHELL-OUTPUT-ERROR",
        }
    }

    /// `TAG: message`, with the failing component's tag appended when known.
    fn report(&self) -> String {
        match self {
            ShellError::Driver(e) => match e.source_tag() {
                Some(source) => format!("{}: {} ({})", self.tag(), self, source),
                None => format!("{}: {}", self.tag(), self),
            },
            ShellError::Output(_) => format!("{}: {}", self.tag(), self),
        }
    }
}

#[derive(Serialize)]
struct VersionInfo {
    driver: &'static str,
    server: &'static str,
    client: &'static str,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_max_level(level)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{}", e.report());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), ShellError> {
    let conn = Sqlite3Driver.open_datasource(&cli.datasource)?;

    match cli.command {
        Commands::Exec { sql, args } => print_json(&conn.exec(&sql, &args)?)?,
        Commands::ExecRaw { sql } => print_json(&conn.exec_raw(&sql)?)?,
        Commands::Select { sql, args } => print_json(&conn.select(&sql, &args)?)?,
        Commands::Rows { sql, args } => print_json(&conn.select_rows(&sql, &args)?)?,
        Commands::Cursor { sql, args, batch } => run_cursor(&conn, &sql, args, batch)?,
        Commands::Describe { sql, args } => {
            let mut stmt = conn.prepare(&sql, args)?;
            stmt.exec()?;
            // Storage classes are per cell, so describe against the first row.
            stmt.next()?;
            print_json(&stmt.describe()?)?;
        }
        Commands::Version => print_json(&VersionInfo {
            driver: DRIVER_NAME,
            server: conn.server_version(),
            client: conn.client_version(),
        })?,
    }

    if !conn.is_autocommit() {
        conn.commit()?;
    }
    conn.close()?;
    Ok(())
}

fn run_cursor(conn: &Connection, sql: &str, args: Vec<Value>, batch: usize) -> Result<(), ShellError> {
    for_each_batch(conn, sql, args, batch, |rows| {
        println!("{}", serde_json::to_string(rows)?);
        Ok(())
    })
}

/// Step a prepared cursor in batches of at most `batch` rows, handing each
/// non-empty batch to `emit`.
fn for_each_batch<F>(conn: &Connection, sql: &str, args: Vec<Value>, batch: usize, mut emit: F) -> Result<(), ShellError>
where
    F: FnMut(&Rows) -> Result<(), ShellError>,
{
    let mut stmt = conn.prepare(sql, args)?;
    stmt.exec()?;
    while stmt.state() != StatementState::Exhausted {
        let rows = stmt.fetch_rows(Some(batch.max(1)))?;
        if rows.is_empty() {
            break;
        }
        emit(&rows)?;
    }
    stmt.reset();
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ShellError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Convert one JSON literal argument into a driver value.
fn parse_value(text: &str) -> Result<Value, String> {
    let json: serde_json::Value =
        serde_json::from_str(text).map_err(|e| format!("'{}' is not a JSON literal: {}", text, e))?;
    json_to_value(json)
}

fn json_to_value(json: serde_json::Value) -> Result<Value, String> {
    match json {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Boolean(b)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Integer)
            .or_else(|| n.as_f64().map(Value::Float))
            .ok_or_else(|| format!("number {} is out of range", n)),
        serde_json::Value::String(s) => Ok(Value::String(s)),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(|| format!("byte arrays may only hold 0-255, got {}", item))
            })
            .collect::<Result<Vec<u8>, String>>()
            .map(Value::Bytes),
        serde_json::Value::Object(_) => Err("objects cannot be bound".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbi_sqlite3::Config;

    #[test]
    fn test_parse_value_literals() {
        assert_eq!(parse_value("7").unwrap(), Value::Integer(7));
        assert_eq!(parse_value("2.5").unwrap(), Value::Float(2.5));
        assert_eq!(parse_value("true").unwrap(), Value::Boolean(true));
        assert_eq!(parse_value("null").unwrap(), Value::Null);
        assert_eq!(parse_value("\"o'k\"").unwrap(), Value::from("o'k"));
        assert_eq!(parse_value("[0, 255]").unwrap(), Value::Bytes(vec![0, 255]));
    }

    #[test]
    fn test_parse_value_rejects() {
        assert!(parse_value("bare").is_err());
        assert!(parse_value("{\"a\": 1}").is_err());
        assert!(parse_value("[256]").is_err());
    }

    #[test]
    fn test_cli_parses_arguments() {
        let cli = Cli::try_parse_from([
            "dbi-shell",
            ":memory:",
            "-v",
            "cursor",
            "SELECT %v",
            "1",
            "--batch",
            "5",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Cursor { sql, args, batch } => {
                assert_eq!(sql, "SELECT %v");
                assert_eq!(args, vec![Value::Integer(1)]);
                assert_eq!(batch, 5);
            }
            _ => panic!("expected cursor command"),
        }
    }

    fn numbers(count: i64) -> Connection {
        let conn = Connection::open(Config::memory()).unwrap();
        conn.exec_raw("CREATE TABLE t (id INTEGER)").unwrap();
        for id in 1..=count {
            conn.exec("INSERT INTO t VALUES (%v)", &[Value::from(id)]).unwrap();
        }
        conn
    }

    fn batch_sizes(conn: &Connection, batch: usize) -> Vec<usize> {
        let mut sizes = Vec::new();
        for_each_batch(conn, "SELECT id FROM t ORDER BY id", Vec::new(), batch, |rows| {
            sizes.push(rows.len());
            Ok(())
        })
        .unwrap();
        sizes
    }

    #[test]
    fn test_cursor_batches_with_partial_tail() {
        let conn = numbers(3);
        assert_eq!(batch_sizes(&conn, 100), vec![3]);
        assert_eq!(batch_sizes(&conn, 2), vec![2, 1]);
        assert_eq!(batch_sizes(&conn, 3), vec![3]);
        assert_eq!(batch_sizes(&conn, 1), vec![1, 1, 1]);
    }

    #[test]
    fn test_cursor_over_empty_result() {
        let conn = numbers(0);
        assert!(batch_sizes(&conn, 10).is_empty());
    }

    #[test]
    fn test_run_cursor_command() {
        let cli = Cli::try_parse_from([
            "dbi-shell",
            ":memory:",
            "cursor",
            "SELECT 1 AS a UNION ALL SELECT 2 UNION ALL SELECT 3",
            "--batch",
            "2",
        ])
        .unwrap();
        run(cli).unwrap();
    }

    #[test]
    fn test_run_against_memory() {
        let cli = Cli::try_parse_from(["dbi-shell", ":memory:", "rows", "SELECT %v AS a", "3"]).unwrap();
        run(cli).unwrap();

        let cli = Cli::try_parse_from(["dbi-shell", "pgsql:db", "version"]).unwrap();
        let err = run(cli).unwrap_err();
        assert_eq!(err.tag(), "SQLITE3-CONFIG-ERROR");
        assert!(err.report().starts_with("SQLITE3-CONFIG-ERROR: "));

        let cli = Cli::try_parse_from(["dbi-shell", ":memory:", "select", "SELECT %v, %v", "1"]).unwrap();
        let err = run(cli).unwrap_err();
        assert!(err.report().starts_with("SQLITE3-SELECT: "));
        assert!(err.report().ends_with("(SQLITE3-PARSE-EXCEPTION)"));
    }
}
