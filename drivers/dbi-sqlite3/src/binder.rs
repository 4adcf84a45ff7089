///
/// Value binder.
///
/// Attaches a bind list to a compiled statement, slot by slot starting at 1,
/// choosing the engine bind call from the value's kind:
///
/// - Null -> NULL
/// - Integer -> 64-bit integer
/// - Float -> double
/// - Boolean -> integer 0/1
/// - String -> text (engine copies the bytes)
/// - Bytes -> blob (engine copies the bytes)
/// - Decimal -> canonical decimal text
/// - Timestamp -> canonical timestamp text
///
/// The first rejected slot aborts the whole bind.
///

use dbi_core::{format_timestamp, Value};

use crate::engine::CompiledStatement;
use crate::error::BindError;

pub fn bind_values<'v, I>(stmt: &mut CompiledStatement<'_>, values: I) -> Result<(), BindError>
where
    I: IntoIterator<Item = &'v Value>,
{
    for (index, value) in values.into_iter().enumerate() {
        let slot = index + 1;
        let result = match value {
            Value::Null => stmt.bind_null(slot),
            Value::Integer(i) => stmt.bind_int64(slot, *i),
            Value::Float(f) => stmt.bind_double(slot, *f),
            Value::Boolean(b) => stmt.bind_int64(slot, *b as i64),
            Value::String(s) => stmt.bind_text(slot, s),
            Value::Bytes(b) => stmt.bind_blob(slot, b),
            Value::Decimal(d) => stmt.bind_text(slot, &d.to_string()),
            Value::Timestamp(ts) => stmt.bind_text(slot, &format_timestamp(ts)),
        };
        result.map_err(|source| BindError::Rejected {
            slot,
            kind: value.kind(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Step;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn test_bind_each_kind() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let mut stmt = CompiledStatement::prepare(
            &conn,
            "SELECT typeof(?1), typeof(?2), typeof(?3), typeof(?4), typeof(?5), typeof(?6), typeof(?7), ?7, ?4",
        )
        .unwrap();
        let values = [
            Value::Null,
            Value::Integer(1),
            Value::Float(0.5),
            Value::Boolean(true),
            Value::from("s"),
            Value::Bytes(vec![1, 2]),
            Value::Decimal(Decimal::from_str("3.10").unwrap()),
        ];
        bind_values(&mut stmt, &values).unwrap();
        assert_eq!(stmt.step().unwrap(), Step::Row);
        let types: Vec<String> = (0..7).map(|i| stmt.column_text(i)).collect();
        assert_eq!(
            types,
            vec!["null", "integer", "real", "integer", "text", "blob", "text"]
        );
        assert_eq!(stmt.column_text(7), "3.10");
        assert_eq!(stmt.column_int64(8), 1);
    }

    #[test]
    fn test_empty_list_is_noop() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let mut stmt = CompiledStatement::prepare(&conn, "SELECT ?1").unwrap();
        bind_values(&mut stmt, std::iter::empty()).unwrap();
        assert_eq!(stmt.step().unwrap(), Step::Row);
        assert_eq!(stmt.column_type(0), rusqlite::ffi::SQLITE_NULL);
    }

    #[test]
    fn test_extra_value_is_rejected() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let mut stmt = CompiledStatement::prepare(&conn, "SELECT ?1").unwrap();
        let values = [Value::from(1), Value::Bytes(vec![9])];
        let err = bind_values(&mut stmt, &values).unwrap_err();
        match err {
            BindError::Rejected { slot, kind, .. } => {
                assert_eq!(slot, 2);
                assert_eq!(kind, dbi_core::ValueKind::Bytes);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
