//!
//! Statement Result Shapes
//!
//! Drivers return query results in one of two shapes:
//!
//! - row oriented: `Rows`, one `Row` (column name -> cell) per fetched row
//! - column oriented: `Columns`, column name -> cells in fetch order
//!
//! Both keep the column order reported by the engine. When a row carries the
//! same column name twice the later column wins, in both shapes.
//!

use indexmap::IndexMap;
use serde::Serialize;

use crate::value::{Value, ValueKind};

pub type Row = IndexMap<String, Value>;

pub type Rows = Vec<Row>;

pub type Columns = IndexMap<String, Vec<Value>>;

/// Result of the exec/select family.
///
/// Statements that produce no result columns (INSERT, UPDATE, DDL...) report
/// the number of rows they changed instead of an empty column map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExecOutcome {
    Columns(Columns),
    Affected(i64),
}

impl ExecOutcome {
    pub fn affected(&self) -> Option<i64> {
        match self {
            ExecOutcome::Affected(n) => Some(*n),
            ExecOutcome::Columns(_) => None,
        }
    }

    pub fn columns(&self) -> Option<&Columns> {
        match self {
            ExecOutcome::Columns(c) => Some(c),
            ExecOutcome::Affected(_) => None,
        }
    }

    pub fn into_columns(self) -> Option<Columns> {
        match self {
            ExecOutcome::Columns(c) => Some(c),
            ExecOutcome::Affected(_) => None,
        }
    }
}

/// Metadata for one result column of a prepared statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Engine storage class code of the current cell.
    pub internal_id: i32,
    /// Engine storage class name ("int", "float", "text", "blob", "unknown").
    pub native_type: &'static str,
    /// Value kind the marshaler produces for this storage class.
    pub kind: Option<ValueKind>,
    /// Type declared in the table schema, when the column maps to one.
    pub declared_type: Option<String>,
    /// Always -1: the engine does not track a maximum column width.
    pub max_size: i64,
}

/// Sink for rows coming off a statement.
///
/// One scan loop feeds any accumulator, so the row-oriented and the
/// column-oriented results are built from the same stream.
pub trait Accumulate: Default {
    fn accept(&mut self, row: Row);
}

impl Accumulate for Rows {
    fn accept(&mut self, row: Row) {
        self.push(row);
    }
}

impl Accumulate for Columns {
    fn accept(&mut self, row: Row) {
        for (name, cell) in row {
            self.entry(name).or_default().push(cell);
        }
    }
}
