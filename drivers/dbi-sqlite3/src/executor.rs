///
/// Eager execution: exec, execRaw, select and selectRows.
///
/// Each call parses (unless raw), compiles, binds and drains the statement
/// in one go. The rewritten text only lives until the statement is
/// compiled; the compiled statement is finalized when the call returns,
/// whichever way it returns.
///

use dbi_core::{Accumulate, Columns, ExecOutcome, Rows, Value};
use tracing::debug;

use crate::assemble::{drain, RowStream};
use crate::binder::bind_values;
use crate::config::QuoteHandling;
use crate::engine::CompiledStatement;
use crate::error::{Call, Error, Result};
use crate::parser::{parse, Rewritten};

pub(crate) struct Executor<'conn> {
    db: &'conn rusqlite::Connection,
    quotes: QuoteHandling,
}

impl<'conn> Executor<'conn> {
    pub(crate) fn new(db: &'conn rusqlite::Connection, quotes: QuoteHandling) -> Self {
        Self { db, quotes }
    }

    pub(crate) fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecOutcome> {
        self.outcome(sql, Some(args), Call::Exec)
    }

    pub(crate) fn exec_raw(&self, sql: &str) -> Result<ExecOutcome> {
        self.outcome(sql, None, Call::ExecRaw)
    }

    pub(crate) fn select(&self, sql: &str, args: &[Value]) -> Result<ExecOutcome> {
        self.outcome(sql, Some(args), Call::Select)
    }

    pub(crate) fn select_rows(&self, sql: &str, args: &[Value]) -> Result<Rows> {
        let (rows, _) = self.run::<Rows>(sql, Some(args), Call::SelectRows)?;
        Ok(rows)
    }

    /// Column-oriented result, or the affected-row count for statements
    /// without result columns.
    fn outcome(&self, sql: &str, args: Option<&[Value]>, call: Call) -> Result<ExecOutcome> {
        let (columns, column_count) = self.run::<Columns>(sql, args, call)?;
        if column_count == 0 {
            return Ok(ExecOutcome::Affected(self.db.changes() as i64));
        }
        Ok(ExecOutcome::Columns(columns))
    }

    /// `args == None` runs the text as-is, without placeholder processing.
    fn run<A: Accumulate>(&self, sql: &str, args: Option<&[Value]>, call: Call) -> Result<(A, usize)> {
        let (rewritten, args) = match args {
            Some(args) => {
                let rewritten = parse(sql, Some(args), self.quotes)
                    .map_err(|source| Error::Parse { call, source })?;
                (rewritten, args)
            }
            None => (Rewritten::raw(sql), &[][..]),
        };
        debug!(call = call.tag(), sql = %rewritten.sql, "compiling statement");

        let mut stmt = CompiledStatement::prepare(self.db, &rewritten.sql)
            .map_err(|source| Error::Engine { call, source })?;
        bind_values(&mut stmt, rewritten.bind_list(args))
            .map_err(|source| Error::Bind { call, source })?;

        let column_count = stmt.column_count();
        let acc = drain(RowStream::new(&mut stmt)).map_err(|source| Error::Engine { call, source })?;
        Ok((acc, column_count))
    }
}
