///
/// Result assembly.
///
/// `RowStream` is the single scan loop over a compiled statement: a lazy,
/// finite, non-restartable iterator of marshaled rows. The row-oriented and
/// column-oriented results are both produced by draining one into an
/// `Accumulate` sink.
///

use dbi_core::{Accumulate, Row};
use tracing::trace;

use crate::engine::{CompiledStatement, Step};
use crate::error::EngineError;
use crate::marshal;

pub struct RowStream<'s, 'conn> {
    stmt: &'s mut CompiledStatement<'conn>,
    names: Vec<String>,
    done: bool,
}

impl<'s, 'conn> RowStream<'s, 'conn> {
    pub fn new(stmt: &'s mut CompiledStatement<'conn>) -> Self {
        let names = stmt.column_names();
        Self {
            stmt,
            names,
            done: false,
        }
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }
}

impl Iterator for RowStream<'_, '_> {
    type Item = Result<Row, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        // Stepping a finished statement would silently run it again.
        if self.done {
            return None;
        }
        match self.stmt.step() {
            Ok(Step::Row) => {
                trace!(columns = self.names.len(), "row");
                Some(Ok(marshal::row(self.stmt, &self.names)))
            }
            Ok(Step::Done) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Drain every remaining row into an accumulator. A failing step discards
/// whatever had been collected.
pub fn drain<A: Accumulate>(stream: RowStream<'_, '_>) -> Result<A, EngineError> {
    let mut acc = A::default();
    for row in stream {
        acc.accept(row?);
    }
    Ok(acc)
}
