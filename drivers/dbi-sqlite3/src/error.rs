///
/// Driver error types.
///
/// Every public operation reports failures as `Error`, tagged with the
/// operation (`Call`) it originated from so the host can attribute it.
/// Component errors (`ParseError`, `BindError`, `EngineError`,
/// `ConfigError`) are kept as sources so the full chain is visible.
///
/// Nothing is retried: SQLite failures are treated as deterministic.
///

use std::fmt;
use std::path::PathBuf;

use dbi_core::ValueKind;
use thiserror::Error;

/// Public operation an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Connect,
    Close,
    Begin,
    Commit,
    Rollback,
    Exec,
    ExecRaw,
    Select,
    SelectRows,
    Prepare,
    StatementBind,
    BindPlaceholders,
    StatementExec,
    Fetch,
    FetchRow,
    FetchRows,
    FetchColumns,
    Describe,
    GetOutput,
    GetOutputRows,
}

impl Call {
    pub fn tag(self) -> &'static str {
        match self {
            Call::Connect => "SQLITE3-CONNECT-ERROR",
            Call::Close => "SQLITE3-CLOSE-ERROR",
            Call::Begin => "SQLITE3-BEGIN-ERROR",
            Call::Commit => "SQLITE3-COMMIT-ERROR",
            Call::Rollback => "SQLITE3-ROLLBACK-ERROR",
            Call::Exec => "SQLITE3-EXEC",
            Call::ExecRaw => "SQLITE3-EXECRAW",
            Call::Select => "SQLITE3-SELECT",
            Call::SelectRows => "SQLITE3-SELECT-ROWS",
            Call::Prepare => "SQLITE3-PREPARE-ERROR",
            Call::StatementBind => "SQLITE3-STATEMENT-BIND-ERROR",
            Call::BindPlaceholders => "SQLITE3-BIND-PLACEHOLDERS-ERROR",
            Call::StatementExec => "SQLITE3-STATEMENT-EXEC-ERROR",
            Call::Fetch => "SQLITE3-FETCH-ERROR",
            Call::FetchRow => "SQLITE3-FETCH-ROW-ERROR",
            Call::FetchRows => "SQLITE3-FETCH-ROWS-ERROR",
            Call::FetchColumns => "SQLITE3-FETCH-COLUMNS-ERROR",
            Call::Describe => "SQLITE3-DESCRIBE-ERROR",
            Call::GetOutput => "SQLITE3-GET-OUTPUT-ERROR",
            Call::GetOutputRows => "SQLITE3-GET-OUTPUT-ROWS-ERROR",
        }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Failure reported by the SQLite C API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (code {code})")]
pub struct EngineError {
    pub code: i32,
    pub message: String,
}

impl EngineError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid value specification (expecting '%v', '%d' or '%s', got %{found}) at offset {offset}")]
    InvalidSpecifier { offset: usize, found: char },

    #[error("invalid value specification (expecting '%v' or '%d', got %v{found}*) at offset {offset}")]
    AmbiguousSpecifier { offset: usize, found: char },

    #[error("unexpected end of statement after '%' at offset {offset}")]
    DanglingMarker { offset: usize },

    #[error("statement consumes {expected} argument(s) but {supplied} were supplied")]
    ArgumentCount { expected: usize, supplied: usize },

    #[error("cannot use {kind} value as a numeric literal at offset {offset}")]
    NotNumeric { offset: usize, kind: ValueKind },
}

impl ParseError {
    pub const TAG: &'static str = "SQLITE3-PARSE-EXCEPTION";
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("failed to bind {kind} to parameter ?{slot}: {source}")]
    Rejected {
        slot: usize,
        kind: ValueKind,
        #[source]
        source: EngineError,
    },

    #[error("statement has {expected} value slot(s) but {supplied} value(s) were supplied")]
    SlotCount { expected: usize, supplied: usize },
}

impl BindError {
    pub const TAG: &'static str = "SQLITE3-BIND-EXCEPTION";
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported driver '{0}' in datasource (expected 'sqlite3')")]
    UnknownDriver(String),

    #[error("unknown datasource option '{0}'")]
    UnknownOption(String),

    #[error("invalid value '{value}' for datasource option '{key}'")]
    InvalidOption { key: String, value: String },

    #[error("malformed datasource string: {0}")]
    Malformed(String),

    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to parse bind variables: {source}")]
    Parse {
        call: Call,
        #[source]
        source: ParseError,
    },

    #[error("sqlite3 error: {source}")]
    Engine {
        call: Call,
        #[source]
        source: EngineError,
    },

    #[error("failed to bind variables: {source}")]
    Bind {
        call: Call,
        #[source]
        source: BindError,
    },

    #[error("sqlite3 error: {source}")]
    Sqlite {
        call: Call,
        #[source]
        source: rusqlite::Error,
    },

    #[error("{message}")]
    Usage { call: Call, message: String },

    #[error("Datasource has an empty dbname parameter")]
    MissingDbName,

    #[error("cannot open {database}: {source}")]
    Connect {
        database: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    pub(crate) fn usage(call: Call, message: impl Into<String>) -> Self {
        Error::Usage {
            call,
            message: message.into(),
        }
    }

    /// Operation the error is attributed to, when there is one.
    pub fn call(&self) -> Option<Call> {
        match self {
            Error::Parse { call, .. }
            | Error::Engine { call, .. }
            | Error::Bind { call, .. }
            | Error::Sqlite { call, .. }
            | Error::Usage { call, .. } => Some(*call),
            Error::Connect { .. } => Some(Call::Connect),
            Error::MissingDbName | Error::Config(_) => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Error::MissingDbName => "DATASOURCE-MISSING-DBNAME",
            Error::Config(_) => "SQLITE3-CONFIG-ERROR",
            other => other.call().map(Call::tag).unwrap_or("SQLITE3-ERROR"),
        }
    }

    /// Tag of the component that failed, for placeholder and bind failures.
    pub fn source_tag(&self) -> Option<&'static str> {
        match self {
            Error::Parse { .. } => Some(ParseError::TAG),
            Error::Bind { .. } => Some(BindError::TAG),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
