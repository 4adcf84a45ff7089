///
/// dbi-sqlite3 - SQLite3 Statement Execution
///
/// Runs parameterized SQL against SQLite and hands results back as
/// `dbi_core` values.
///
/// Placeholders:
/// - `%v` binds the next argument as an engine parameter (`?N`)
/// - `%d` inlines the next argument as a numeric literal
/// - `%s` inlines the next argument as a quoted string literal
///
/// Entry points:
/// - Connection: open, close, begin, commit, rollback, versions
/// - Eager: exec, exec_raw, select, select_rows
/// - Prepared statements: prepare, bind, exec, next, fetch_row,
///   fetch_rows, fetch_columns, describe, reset
///
/// All calls are synchronous and run on the thread that opened the
/// connection.
///

pub mod assemble;
pub mod binder;
pub mod config;
pub mod connection;
pub mod driver;
pub mod engine;
pub mod error;
mod executor;
pub mod marshal;
pub mod parser;
pub mod statement;

pub use config::{Config, QuoteHandling};
pub use connection::Connection;
pub use driver::{Sqlite3Driver, DRIVER_INFO, DRIVER_NAME};
pub use error::{BindError, Call, ConfigError, EngineError, Error, ParseError, Result};
pub use parser::{parse, Rewritten};
pub use statement::{PreparedStatement, StatementState};
