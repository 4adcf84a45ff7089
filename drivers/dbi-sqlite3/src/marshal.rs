///
/// Column marshaler: engine cells -> `Value`.
///
/// SQLite types cells, not columns, so the storage class is read for every
/// cell. Callers must only invoke these against a statement positioned on a
/// row.
///

use dbi_core::{ColumnInfo, Row, Value, ValueKind};

use crate::engine::{CompiledStatement, StorageClass};

pub fn column_value(stmt: &CompiledStatement<'_>, index: usize) -> Value {
    match stmt.storage_class(index) {
        Some(StorageClass::Integer) => Value::Integer(stmt.column_int64(index)),
        Some(StorageClass::Float) => Value::Float(stmt.column_double(index)),
        Some(StorageClass::Blob) => Value::Bytes(stmt.column_blob(index)),
        Some(StorageClass::Null) => Value::Null,
        Some(StorageClass::Text) | None => Value::String(stmt.column_text(index)),
    }
}

/// Marshal the current row; `names` are the statement's column names.
pub fn row(stmt: &CompiledStatement<'_>, names: &[String]) -> Row {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), column_value(stmt, i)))
        .collect()
}

pub fn describe_column(stmt: &CompiledStatement<'_>, index: usize) -> ColumnInfo {
    let code = stmt.column_type(index);
    let (native_type, kind) = match StorageClass::from_code(code) {
        Some(StorageClass::Integer) => ("int", Some(ValueKind::Integer)),
        Some(StorageClass::Float) => ("float", Some(ValueKind::Float)),
        Some(StorageClass::Blob) => ("blob", Some(ValueKind::Bytes)),
        Some(StorageClass::Text) => ("text", Some(ValueKind::String)),
        Some(StorageClass::Null) | None => ("unknown", None),
    };
    ColumnInfo {
        name: stmt.column_name(index),
        internal_id: code,
        native_type,
        kind,
        declared_type: stmt.column_decltype(index),
        max_size: -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Step;

    #[test]
    fn test_storage_classes() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let mut stmt = CompiledStatement::prepare(
            &conn,
            "SELECT 9007199254740993, 2.5, 'txt', x'0102', NULL",
        )
        .unwrap();
        assert_eq!(stmt.step().unwrap(), Step::Row);
        assert_eq!(column_value(&stmt, 0), Value::Integer(9007199254740993));
        assert_eq!(column_value(&stmt, 1), Value::Float(2.5));
        assert_eq!(column_value(&stmt, 2), Value::from("txt"));
        assert_eq!(column_value(&stmt, 3), Value::Bytes(vec![1, 2]));
        assert_eq!(column_value(&stmt, 4), Value::Null);
    }

    #[test]
    fn test_storage_class_is_per_cell() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v); INSERT INTO t VALUES (1), ('one');")
            .unwrap();
        let mut stmt = CompiledStatement::prepare(&conn, "SELECT v FROM t ORDER BY rowid").unwrap();
        stmt.step().unwrap();
        assert_eq!(column_value(&stmt, 0), Value::Integer(1));
        stmt.step().unwrap();
        assert_eq!(column_value(&stmt, 0), Value::from("one"));
    }

    #[test]
    fn test_row_uses_column_names() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let mut stmt = CompiledStatement::prepare(&conn, "SELECT 1 AS a, 'x' AS b").unwrap();
        let names = stmt.column_names();
        stmt.step().unwrap();
        let row = row(&stmt, &names);
        assert_eq!(row["a"], Value::Integer(1));
        assert_eq!(row["b"], Value::from("x"));
    }

    #[test]
    fn test_describe_column() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER, note TEXT); INSERT INTO t VALUES (1, NULL);")
            .unwrap();
        let mut stmt = CompiledStatement::prepare(&conn, "SELECT id, note FROM t").unwrap();
        stmt.step().unwrap();

        let id = describe_column(&stmt, 0);
        assert_eq!(id.name, "id");
        assert_eq!(id.native_type, "int");
        assert_eq!(id.kind, Some(ValueKind::Integer));
        assert_eq!(id.declared_type.as_deref(), Some("INTEGER"));
        assert_eq!(id.max_size, -1);

        let note = describe_column(&stmt, 1);
        assert_eq!(note.native_type, "unknown");
        assert_eq!(note.kind, None);
        assert_eq!(note.internal_id, rusqlite::ffi::SQLITE_NULL);
    }
}
