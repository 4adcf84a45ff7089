///
/// Compiled statement wrapper over the SQLite C API.
///
/// rusqlite's `Statement` resets itself whenever its `Rows` borrow ends,
/// which rules it out for a cursor that is advanced one call at a time.
/// `CompiledStatement` owns a raw `sqlite3_stmt` instead and finalizes it
/// on drop, so every exit path (including errors) releases the handle.
///
/// The statement borrows the connection it was compiled on; the borrow keeps
/// the connection open for as long as the statement exists.
///

use std::ffi::CStr;
use std::marker::PhantomData;
use std::os::raw::{c_char, c_int};
use std::ptr::{self, NonNull};

use rusqlite::ffi;

use crate::error::EngineError;

/// Per-cell storage class reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Integer,
    Float,
    Text,
    Blob,
    Null,
}

impl StorageClass {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            ffi::SQLITE_INTEGER => Some(StorageClass::Integer),
            ffi::SQLITE_FLOAT => Some(StorageClass::Float),
            ffi::SQLITE_TEXT => Some(StorageClass::Text),
            ffi::SQLITE_BLOB => Some(StorageClass::Blob),
            ffi::SQLITE_NULL => Some(StorageClass::Null),
            _ => None,
        }
    }
}

/// Outcome of one engine step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Row,
    Done,
}

pub struct CompiledStatement<'conn> {
    raw: NonNull<ffi::sqlite3_stmt>,
    db: *mut ffi::sqlite3,
    _conn: PhantomData<&'conn rusqlite::Connection>,
}

impl<'conn> CompiledStatement<'conn> {
    /// Compile the first statement in `sql`. Trailing statements are ignored.
    pub fn prepare(conn: &'conn rusqlite::Connection, sql: &str) -> Result<Self, EngineError> {
        let db = unsafe { conn.handle() };
        let len = c_int::try_from(sql.len())
            .map_err(|_| EngineError::new(ffi::SQLITE_TOOBIG, "statement text is too long"))?;

        let mut raw: *mut ffi::sqlite3_stmt = ptr::null_mut();
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(
                db,
                sql.as_ptr() as *const c_char,
                len,
                &mut raw,
                ptr::null_mut(),
            )
        };
        if rc != ffi::SQLITE_OK {
            unsafe { ffi::sqlite3_finalize(raw) };
            return Err(last_error(db, rc));
        }

        match NonNull::new(raw) {
            Some(raw) => Ok(Self {
                raw,
                db,
                _conn: PhantomData,
            }),
            None => Err(EngineError::new(
                ffi::SQLITE_MISUSE,
                "statement text contains no SQL",
            )),
        }
    }

    fn stmt(&self) -> *mut ffi::sqlite3_stmt {
        self.raw.as_ptr()
    }

    fn check(&self, rc: c_int) -> Result<(), EngineError> {
        if rc == ffi::SQLITE_OK {
            Ok(())
        } else {
            Err(last_error(self.db, rc))
        }
    }

    pub fn parameter_count(&self) -> usize {
        unsafe { ffi::sqlite3_bind_parameter_count(self.stmt()) as usize }
    }

    pub fn bind_null(&mut self, slot: usize) -> Result<(), EngineError> {
        let rc = unsafe { ffi::sqlite3_bind_null(self.stmt(), slot as c_int) };
        self.check(rc)
    }

    pub fn bind_int64(&mut self, slot: usize, value: i64) -> Result<(), EngineError> {
        let rc = unsafe { ffi::sqlite3_bind_int64(self.stmt(), slot as c_int, value) };
        self.check(rc)
    }

    pub fn bind_double(&mut self, slot: usize, value: f64) -> Result<(), EngineError> {
        let rc = unsafe { ffi::sqlite3_bind_double(self.stmt(), slot as c_int, value) };
        self.check(rc)
    }

    /// Bind text; the engine takes its own copy of the bytes.
    pub fn bind_text(&mut self, slot: usize, value: &str) -> Result<(), EngineError> {
        let len = length(value.len())?;
        let rc = unsafe {
            ffi::sqlite3_bind_text(
                self.stmt(),
                slot as c_int,
                value.as_ptr() as *const c_char,
                len,
                ffi::SQLITE_TRANSIENT(),
            )
        };
        self.check(rc)
    }

    /// Bind a blob; the engine takes its own copy of the bytes.
    pub fn bind_blob(&mut self, slot: usize, value: &[u8]) -> Result<(), EngineError> {
        if value.is_empty() {
            let rc = unsafe { ffi::sqlite3_bind_zeroblob(self.stmt(), slot as c_int, 0) };
            return self.check(rc);
        }
        let len = length(value.len())?;
        let rc = unsafe {
            ffi::sqlite3_bind_blob(
                self.stmt(),
                slot as c_int,
                value.as_ptr() as *const _,
                len,
                ffi::SQLITE_TRANSIENT(),
            )
        };
        self.check(rc)
    }

    pub fn step(&mut self) -> Result<Step, EngineError> {
        match unsafe { ffi::sqlite3_step(self.stmt()) } {
            ffi::SQLITE_ROW => Ok(Step::Row),
            ffi::SQLITE_DONE => Ok(Step::Done),
            rc => Err(last_error(self.db, rc)),
        }
    }

    pub fn column_count(&self) -> usize {
        unsafe { ffi::sqlite3_column_count(self.stmt()) as usize }
    }

    pub fn column_name(&self, index: usize) -> String {
        let name = unsafe { ffi::sqlite3_column_name(self.stmt(), index as c_int) };
        if name.is_null() {
            return String::new();
        }
        unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned()
    }

    pub fn column_names(&self) -> Vec<String> {
        (0..self.column_count()).map(|i| self.column_name(i)).collect()
    }

    /// Type declared for the column in the table schema, if any.
    pub fn column_decltype(&self, index: usize) -> Option<String> {
        let decl = unsafe { ffi::sqlite3_column_decltype(self.stmt(), index as c_int) };
        if decl.is_null() {
            return None;
        }
        Some(unsafe { CStr::from_ptr(decl) }.to_string_lossy().into_owned())
    }

    /// Raw storage class code of the current cell.
    pub fn column_type(&self, index: usize) -> i32 {
        unsafe { ffi::sqlite3_column_type(self.stmt(), index as c_int) }
    }

    pub fn storage_class(&self, index: usize) -> Option<StorageClass> {
        StorageClass::from_code(self.column_type(index))
    }

    pub fn column_int64(&self, index: usize) -> i64 {
        unsafe { ffi::sqlite3_column_int64(self.stmt(), index as c_int) }
    }

    pub fn column_double(&self, index: usize) -> f64 {
        unsafe { ffi::sqlite3_column_double(self.stmt(), index as c_int) }
    }

    pub fn column_text(&self, index: usize) -> String {
        unsafe {
            let text = ffi::sqlite3_column_text(self.stmt(), index as c_int);
            let len = ffi::sqlite3_column_bytes(self.stmt(), index as c_int);
            if text.is_null() || len <= 0 {
                return String::new();
            }
            let bytes = std::slice::from_raw_parts(text, len as usize);
            String::from_utf8_lossy(bytes).into_owned()
        }
    }

    /// Copy of the current blob cell; the engine buffer dies on the next step.
    pub fn column_blob(&self, index: usize) -> Vec<u8> {
        unsafe {
            let blob = ffi::sqlite3_column_blob(self.stmt(), index as c_int);
            let len = ffi::sqlite3_column_bytes(self.stmt(), index as c_int);
            if blob.is_null() || len <= 0 {
                return Vec::new();
            }
            std::slice::from_raw_parts(blob as *const u8, len as usize).to_vec()
        }
    }
}

impl Drop for CompiledStatement<'_> {
    fn drop(&mut self) {
        unsafe {
            ffi::sqlite3_finalize(self.stmt());
        }
    }
}

fn length(len: usize) -> Result<c_int, EngineError> {
    c_int::try_from(len).map_err(|_| EngineError::new(ffi::SQLITE_TOOBIG, "value is too large to bind"))
}

fn last_error(db: *mut ffi::sqlite3, rc: c_int) -> EngineError {
    let message = unsafe {
        let msg = ffi::sqlite3_errmsg(db);
        if msg.is_null() {
            let fallback = ffi::sqlite3_errstr(rc);
            if fallback.is_null() {
                return EngineError::new(rc, "unknown error");
            }
            CStr::from_ptr(fallback).to_string_lossy().into_owned()
        } else {
            CStr::from_ptr(msg).to_string_lossy().into_owned()
        }
    };
    EngineError::new(rc, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> rusqlite::Connection {
        rusqlite::Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_prepare_and_step() {
        let conn = memory();
        let mut stmt = CompiledStatement::prepare(&conn, "SELECT 1 AS a, 'x' AS b").unwrap();
        assert_eq!(stmt.column_count(), 2);
        assert_eq!(stmt.column_names(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(stmt.step().unwrap(), Step::Row);
        assert_eq!(StorageClass::from_code(stmt.column_type(0)), Some(StorageClass::Integer));
        assert_eq!(stmt.column_int64(0), 1);
        assert_eq!(stmt.column_text(1), "x");
        assert_eq!(stmt.step().unwrap(), Step::Done);
    }

    #[test]
    fn test_prepare_error_reports_engine_message() {
        let conn = memory();
        let err = CompiledStatement::prepare(&conn, "SELECT * FROM missing_table").err().unwrap();
        assert_eq!(err.code, ffi::SQLITE_ERROR);
        assert!(err.message.contains("no such table"));
    }

    #[test]
    fn test_empty_statement_is_rejected() {
        let conn = memory();
        let err = CompiledStatement::prepare(&conn, "   ").err().unwrap();
        assert_eq!(err.code, ffi::SQLITE_MISUSE);
    }

    #[test]
    fn test_bind_out_of_range() {
        let conn = memory();
        let mut stmt = CompiledStatement::prepare(&conn, "SELECT ?1").unwrap();
        assert_eq!(stmt.parameter_count(), 1);
        assert!(stmt.bind_int64(1, 5).is_ok());
        let err = stmt.bind_int64(2, 5).unwrap_err();
        assert_eq!(err.code, ffi::SQLITE_RANGE);
    }

    #[test]
    fn test_blob_and_text_are_copied() {
        let conn = memory();
        let mut stmt = CompiledStatement::prepare(&conn, "SELECT ?1, ?2, ?3").unwrap();
        {
            let text = String::from("héllo");
            let blob = vec![0u8, 1, 2, 255];
            stmt.bind_text(1, &text).unwrap();
            stmt.bind_blob(2, &blob).unwrap();
            stmt.bind_blob(3, &[]).unwrap();
        }
        assert_eq!(stmt.step().unwrap(), Step::Row);
        assert_eq!(stmt.column_text(0), "héllo");
        assert_eq!(stmt.column_blob(1), vec![0u8, 1, 2, 255]);
        assert_eq!(StorageClass::from_code(stmt.column_type(2)), Some(StorageClass::Blob));
        assert!(stmt.column_blob(2).is_empty());
    }

    #[test]
    fn test_decltype() {
        let conn = memory();
        conn.execute_batch("CREATE TABLE t (id INTEGER, name VARCHAR(20))").unwrap();
        let stmt = CompiledStatement::prepare(&conn, "SELECT id, name, 1 FROM t").unwrap();
        assert_eq!(stmt.column_decltype(0).as_deref(), Some("INTEGER"));
        assert_eq!(stmt.column_decltype(1).as_deref(), Some("VARCHAR(20)"));
        assert_eq!(stmt.column_decltype(2), None);
    }
}
