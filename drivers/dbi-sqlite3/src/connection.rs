///
/// Datasource connection.
///
/// A `Connection` owns one SQLite database handle together with the thread
/// token of the thread that opened it. Statements borrow the connection, so
/// it cannot be closed while one is alive.
///
/// Transactions follow the engine's autocommit flag: `begin` only issues
/// BEGIN when no transaction is open, which lets prepared statements start
/// one implicitly on `exec`.
///

use std::time::Duration;

use dbi_core::{ExecOutcome, Rows, ThreadInit, Value};
use rusqlite::OpenFlags;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Call, Error, Result};
use crate::executor::Executor;
use crate::statement::PreparedStatement;

pub struct Connection {
    db: rusqlite::Connection,
    config: Config,
    _thread: ThreadInit,
}

impl Connection {
    pub fn open(config: Config) -> Result<Self> {
        if config.database.is_empty() {
            return Err(Error::MissingDbName);
        }
        let thread = ThreadInit::acquire();

        let mut flags = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if config.read_only {
            flags |= OpenFlags::SQLITE_OPEN_READ_ONLY;
        } else {
            flags |= OpenFlags::SQLITE_OPEN_READ_WRITE;
            if config.create {
                flags |= OpenFlags::SQLITE_OPEN_CREATE;
            }
        }

        let connect_err = |source| Error::Connect {
            database: config.database.clone(),
            source,
        };
        let db = rusqlite::Connection::open_with_flags(&config.database, flags).map_err(connect_err)?;
        if let Some(ms) = config.busy_timeout_ms {
            db.busy_timeout(Duration::from_millis(ms)).map_err(connect_err)?;
        }

        debug!(database = %config.database, read_only = config.read_only, "opened sqlite3 datasource");
        Ok(Self {
            db,
            config,
            _thread: thread,
        })
    }

    pub fn close(self) -> Result<()> {
        let database = self.config.database;
        self.db.close().map_err(|(_, source)| {
            warn!(database = %database, error = %source, "failed to close sqlite3 datasource");
            Error::Sqlite {
                call: Call::Close,
                source,
            }
        })?;
        debug!(database = %database, "closed sqlite3 datasource");
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn db(&self) -> &rusqlite::Connection {
        &self.db
    }

    fn executor(&self) -> Executor<'_> {
        Executor::new(&self.db, self.config.quote_handling)
    }

    /// Open a transaction unless one is already in progress.
    pub fn begin(&self) -> Result<()> {
        if !self.db.is_autocommit() {
            return Ok(());
        }
        debug!("BEGIN");
        self.batch("BEGIN;", Call::Begin)
    }

    pub fn commit(&self) -> Result<()> {
        debug!("COMMIT");
        self.batch("COMMIT;", Call::Commit)
    }

    pub fn rollback(&self) -> Result<()> {
        debug!("ROLLBACK");
        self.batch("ROLLBACK;", Call::Rollback)
    }

    fn batch(&self, sql: &str, call: Call) -> Result<()> {
        self.db
            .execute_batch(sql)
            .map_err(|source| Error::Sqlite { call, source })
    }

    pub fn is_autocommit(&self) -> bool {
        self.db.is_autocommit()
    }

    /// Rows changed by the most recent INSERT, UPDATE or DELETE.
    pub fn changes(&self) -> i64 {
        self.db.changes() as i64
    }

    pub fn last_insert_rowid(&self) -> i64 {
        self.db.last_insert_rowid()
    }

    /// The engine is embedded, so the server is the linked library.
    pub fn server_version(&self) -> &'static str {
        rusqlite::version()
    }

    pub fn client_version(&self) -> &'static str {
        rusqlite::version()
    }

    pub fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecOutcome> {
        self.executor().exec(sql, args)
    }

    pub fn exec_raw(&self, sql: &str) -> Result<ExecOutcome> {
        self.executor().exec_raw(sql)
    }

    pub fn select(&self, sql: &str, args: &[Value]) -> Result<ExecOutcome> {
        self.executor().select(sql, args)
    }

    pub fn select_rows(&self, sql: &str, args: &[Value]) -> Result<Rows> {
        self.executor().select_rows(sql, args)
    }

    /// A fresh, unprepared statement bound to this connection.
    pub fn statement(&self) -> PreparedStatement<'_> {
        PreparedStatement::new(self)
    }

    pub fn prepare(&self, sql: &str, args: Vec<Value>) -> Result<PreparedStatement<'_>> {
        let mut stmt = self.statement();
        stmt.prepare(sql, Some(args))?;
        Ok(stmt)
    }

    pub fn prepare_raw(&self, sql: &str) -> Result<PreparedStatement<'_>> {
        let mut stmt = self.statement();
        stmt.prepare_raw(sql)?;
        Ok(stmt)
    }
}
