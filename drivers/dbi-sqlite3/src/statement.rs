///
/// Prepared statement cursor.
///
/// Lifecycle:
///
/// ```text
/// Created --prepare--> Prepared --exec--> Active --next--> Iterating
///                                                  \          |
///                                                   +--next--> Exhausted
/// any state --reset--> Closed --prepare--> Prepared ...
/// ```
///
/// - prepare: parse (unless raw) and compile; arguments given here are
///   retained and bound on `exec` unless `bind` was called first.
/// - exec: bind if needed, begin a transaction when the connection is in
///   autocommit mode, and mark the cursor active. No row is read.
/// - next: one engine step; `false` once the rows run out or when inactive.
/// - fetch_row: the current row; only while the last step landed on one.
/// - fetch_rows / fetch_columns: advance up to `max` more rows.
/// - reset: release the compiled statement, text, and arguments.
///
/// The compiled statement is finalized on reset and on drop.
///

use dbi_core::{Accumulate, ColumnInfo, Columns, Row, Rows, Value};
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::binder::bind_values;
use crate::connection::Connection;
use crate::engine::{CompiledStatement, Step};
use crate::error::{BindError, Call, Error, Result};
use crate::marshal;
use crate::parser::{parse, Rewritten};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    Created,
    Prepared,
    Active,
    Iterating,
    Exhausted,
    Closed,
}

struct Handle<'conn> {
    stmt: CompiledStatement<'conn>,
    sql: String,
    names: Vec<String>,
    args: Vec<Value>,
    slots: Vec<usize>,
    positional: usize,
    bound: bool,
    /// Rows advanced since exec; `None` until the cursor starts.
    row_count: Option<usize>,
    active: bool,
    /// The last step landed on a row that can be read.
    on_row: bool,
}

pub struct PreparedStatement<'conn> {
    conn: &'conn Connection,
    handle: Option<Handle<'conn>>,
    state: StatementState,
}

impl<'conn> PreparedStatement<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            handle: None,
            state: StatementState::Created,
        }
    }

    pub fn state(&self) -> StatementState {
        self.state
    }

    /// Rewritten statement text, retained while the statement is prepared.
    pub fn sql(&self) -> Option<&str> {
        self.handle.as_ref().map(|h| h.sql.as_str())
    }

    pub fn row_count(&self) -> Option<usize> {
        self.handle.as_ref().and_then(|h| h.row_count)
    }

    /// Parse and compile `sql`. `args == None` defers values to `bind`.
    pub fn prepare(&mut self, sql: &str, args: Option<Vec<Value>>) -> Result<()> {
        self.ensure_unprepared()?;
        let rewritten = parse(sql, args.as_deref(), self.conn.config().quote_handling).map_err(|source| {
            Error::Parse {
                call: Call::Prepare,
                source,
            }
        })?;
        self.compile(rewritten, args.unwrap_or_default())
    }

    /// Compile `sql` as-is, without placeholder processing.
    pub fn prepare_raw(&mut self, sql: &str) -> Result<()> {
        self.ensure_unprepared()?;
        self.compile(Rewritten::raw(sql), Vec::new())
    }

    fn ensure_unprepared(&self) -> Result<()> {
        match self.state {
            StatementState::Created | StatementState::Closed => Ok(()),
            _ => Err(Error::usage(
                Call::Prepare,
                "statement is already prepared; call reset() first",
            )),
        }
    }

    fn compile(&mut self, rewritten: Rewritten, args: Vec<Value>) -> Result<()> {
        debug!(sql = %rewritten.sql, "preparing statement");
        let stmt = CompiledStatement::prepare(self.conn.db(), &rewritten.sql).map_err(|source| Error::Engine {
            call: Call::Prepare,
            source,
        })?;
        let names = stmt.column_names();
        self.handle = Some(Handle {
            stmt,
            sql: rewritten.sql,
            names,
            args,
            slots: rewritten.slots,
            positional: rewritten.positional,
            bound: false,
            row_count: None,
            active: false,
            on_row: false,
        });
        self.state = StatementState::Prepared;
        Ok(())
    }

    fn handle(&self, call: Call) -> Result<&Handle<'conn>> {
        self.handle
            .as_ref()
            .ok_or_else(|| Error::usage(call, "statement has not been prepared"))
    }

    fn handle_mut(&mut self, call: Call) -> Result<&mut Handle<'conn>> {
        self.handle
            .as_mut()
            .ok_or_else(|| Error::usage(call, "statement has not been prepared"))
    }

    /// Bind values to the statement's `%v` slots.
    ///
    /// Empty `values` re-binds the retained list; otherwise `values` replace
    /// it and must supply exactly one value per slot.
    pub fn bind(&mut self, values: Vec<Value>) -> Result<()> {
        let call = Call::StatementBind;
        if self.state != StatementState::Prepared {
            self.handle(call)?;
            return Err(Error::usage(call, "values can only be bound before exec()"));
        }
        let handle = self.handle_mut(call)?;

        if !values.is_empty() {
            if values.len() != handle.positional {
                return Err(Error::Bind {
                    call,
                    source: BindError::SlotCount {
                        expected: handle.positional,
                        supplied: values.len(),
                    },
                });
            }
            handle.slots = (0..values.len()).collect();
            handle.args = values;
        }
        handle.bind(call)
    }

    pub fn bind_values(&mut self, values: Vec<Value>) -> Result<()> {
        self.bind(values)
    }

    pub fn bind_placeholders(&mut self, _values: Vec<Value>) -> Result<()> {
        Err(Error::usage(
            Call::BindPlaceholders,
            "binding placeholders is not necessary or supported with the sqlite3 driver",
        ))
    }

    /// Output definition is a no-op for this driver.
    pub fn define(&mut self) -> Result<()> {
        self.handle(Call::StatementExec)?;
        Ok(())
    }

    pub fn exec(&mut self) -> Result<()> {
        let call = Call::StatementExec;
        if self.state != StatementState::Prepared {
            self.handle(call)?;
            return Err(Error::usage(
                call,
                "statement has already been executed; call reset() and prepare() again",
            ));
        }
        let conn = self.conn;
        let handle = self.handle_mut(call)?;
        if !handle.bound {
            handle.bind(call)?;
        }
        conn.begin()?;
        handle.active = true;
        self.state = StatementState::Active;
        Ok(())
    }

    /// Advance the cursor one row. Inactive statements return `Ok(false)`.
    pub fn next(&mut self) -> Result<bool> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(false);
        };
        if !handle.active {
            return Ok(false);
        }
        match handle.stmt.step() {
            Ok(Step::Row) => {
                let count = handle.row_count.map_or(1, |n| n + 1);
                handle.row_count = Some(count);
                handle.on_row = true;
                trace!(row = count, "statement advanced");
                self.state = StatementState::Iterating;
                Ok(true)
            }
            Ok(Step::Done) => {
                handle.active = false;
                handle.on_row = false;
                self.state = StatementState::Exhausted;
                Ok(false)
            }
            Err(source) => {
                handle.active = false;
                handle.on_row = false;
                self.state = StatementState::Exhausted;
                Err(Error::Engine {
                    call: Call::Fetch,
                    source,
                })
            }
        }
    }

    pub fn fetch_row(&self) -> Result<Row> {
        let call = Call::FetchRow;
        let handle = self.handle(call)?;
        if !handle.on_row {
            return Err(Error::usage(
                call,
                "next() must be called and return true before calling fetch_row()",
            ));
        }
        Ok(marshal::row(&handle.stmt, &handle.names))
    }

    /// Advance up to `max` rows (`None`: all remaining) into row maps.
    pub fn fetch_rows(&mut self, max: Option<usize>) -> Result<Rows> {
        self.fetch_into(max, Call::FetchRows)
    }

    /// Advance up to `max` rows (`None`: all remaining) into column lists.
    pub fn fetch_columns(&mut self, max: Option<usize>) -> Result<Columns> {
        self.fetch_into(max, Call::FetchColumns)
    }

    fn fetch_into<A: Accumulate>(&mut self, max: Option<usize>, call: Call) -> Result<A> {
        let handle = self.handle_mut(call)?;
        if !handle.active {
            return Err(Error::usage(
                call,
                "SQL statement is inactive or has reached the end of the result set",
            ));
        }
        if handle.row_count.is_none() {
            handle.row_count = Some(0);
        }

        let mut acc = A::default();
        let mut remaining = max;
        while remaining != Some(0) && self.next().map_err(|e| retag(e, call))? {
            let handle = self.handle(call)?;
            acc.accept(marshal::row(&handle.stmt, &handle.names));
            remaining = remaining.map(|n| n - 1);
        }
        Ok(acc)
    }

    pub fn describe(&self) -> Result<IndexMap<String, ColumnInfo>> {
        let call = Call::Describe;
        if !self.conn.config().describe {
            return Err(Error::usage(call, "describe() is not supported"));
        }
        let handle = self.handle(call)?;
        Ok((0..handle.names.len())
            .map(|i| {
                let info = marshal::describe_column(&handle.stmt, i);
                (info.name.clone(), info)
            })
            .collect())
    }

    pub fn rows_affected(&self) -> i64 {
        self.conn.changes()
    }

    pub fn get_output(&self) -> Result<IndexMap<String, Value>> {
        Err(Error::usage(
            Call::GetOutput,
            "sqlite3 does not support output values as it does not support stored procedures",
        ))
    }

    pub fn get_output_rows(&self) -> Result<Rows> {
        Err(Error::usage(
            Call::GetOutputRows,
            "sqlite3 does not support output rows as it does not support stored procedures",
        ))
    }

    /// Release the compiled statement, text and arguments. Resetting a
    /// statement that holds nothing is a no-op.
    pub fn reset(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!(sql = %handle.sql, rows = handle.row_count.unwrap_or(0), "releasing statement");
            self.state = StatementState::Closed;
        }
    }
}

impl Handle<'_> {
    fn bind(&mut self, call: Call) -> Result<()> {
        let values = self.slots.iter().filter_map(|&i| self.args.get(i));
        bind_values(&mut self.stmt, values).map_err(|source| Error::Bind { call, source })?;
        self.bound = true;
        Ok(())
    }
}

/// Step failures inside a bulk fetch are reported against the bulk call.
fn retag(err: Error, call: Call) -> Error {
    match err {
        Error::Engine { source, .. } => Error::Engine { call, source },
        other => other,
    }
}
