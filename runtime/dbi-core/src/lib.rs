//!
//! dbi-core - Shared Driver Types
//!
//! This crate provides the types shared between database drivers and the
//! host runtime that calls them:
//!
//! - `Value` and `ValueKind` for dynamically typed arguments and cells
//! - `Row`, `Rows`, `Columns` and `ExecOutcome` for statement results
//! - `ColumnInfo` for statement column metadata
//! - `DriverInfo` and the `CAP_*` capability bits
//! - `ThreadInit` for the one-time per-thread initialization step
//!
//! Drivers are synchronous: every operation runs to completion on the
//! calling thread.
//!

pub mod driver;
pub mod results;
pub mod thread;
pub mod value;

pub use driver::*;
pub use results::*;
pub use thread::*;
pub use value::*;
