///
/// Placeholder parser.
///
/// Rewrites the driver's placeholder syntax into SQLite positional
/// parameters and works out which caller arguments get bound where.
///
/// | Marker | Effect                            | Consumes arg | Creates slot |
/// |--------|-----------------------------------|--------------|--------------|
/// | `%d`   | inlines a numeric literal         | yes          | no           |
/// | `%s`   | inlines a quoted string literal   | yes          | no           |
/// | `%v`   | becomes `?N`, N counting from 1   | yes          | yes          |
///
/// Arguments are consumed left to right, one per marker. When arguments are
/// supplied, the number consumed must match the number supplied exactly.
/// When they are not (a statement prepared now and bound later), `%v` only
/// allocates a slot and any `%d`/`%s` is an error.
///
/// The text is rewritten in place; the scan position is a byte offset that
/// is recomputed after every replacement.
///

use dbi_core::{format_timestamp, Value};

use crate::config::QuoteHandling;
use crate::error::ParseError;

/// Statement text after placeholder substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten {
    pub sql: String,
    /// Number of `?N` markers created.
    pub positional: usize,
    /// Caller argument index bound to each `?N`, in marker order. Empty when
    /// the statement was parsed without arguments.
    pub slots: Vec<usize>,
}

impl Rewritten {
    /// Statement text passed through without placeholder processing.
    pub fn raw(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            positional: 0,
            slots: Vec::new(),
        }
    }

    /// Values to bind, in slot order, borrowed from the caller's arguments.
    pub fn bind_list<'a>(&self, args: &'a [Value]) -> Vec<&'a Value> {
        self.slots.iter().filter_map(|&i| args.get(i)).collect()
    }
}

pub fn parse(
    sql: &str,
    args: Option<&[Value]>,
    quotes: QuoteHandling,
) -> Result<Rewritten, ParseError> {
    let mut text = sql.to_string();
    let mut pos = 0;
    let mut consumed = 0;
    let mut inlined = 0;
    let mut positional = 0;
    let mut slots = Vec::new();

    while let Some(found) = memchr::memchr(b'%', &text.as_bytes()[pos..]) {
        let offset = pos + found;
        let letter = text[offset + 1..]
            .chars()
            .next()
            .ok_or(ParseError::DanglingMarker { offset })?;

        let arg_index = consumed;
        consumed += 1;
        let arg = args.and_then(|a| a.get(arg_index)).unwrap_or(&Value::Null);

        match letter {
            'd' | 's' => {
                let literal = if letter == 'd' {
                    numeric_literal(arg, offset)?
                } else {
                    string_literal(arg)
                };
                text.replace_range(offset..offset + 2, &literal);
                pos = offset + literal.len();
                inlined += 1;
            }
            'v' => {
                if let Some(next) = text[offset + 2..].chars().next() {
                    if next.is_ascii_alphabetic() {
                        return Err(ParseError::AmbiguousSpecifier { offset, found: next });
                    }
                }

                positional += 1;
                let marker = format!("?{}", positional);
                let (start, end) = match quotes {
                    QuoteHandling::Unwrap if is_quoted(text.as_bytes(), offset) => {
                        (offset - 1, offset + 3)
                    }
                    _ => (offset, offset + 2),
                };
                text.replace_range(start..end, &marker);
                pos = start + marker.len();

                if args.is_some() {
                    slots.push(arg_index);
                }
            }
            other => {
                return Err(ParseError::InvalidSpecifier { offset, found: other });
            }
        }
    }

    match args {
        Some(args) if consumed != args.len() => Err(ParseError::ArgumentCount {
            expected: consumed,
            supplied: args.len(),
        }),
        None if inlined > 0 => Err(ParseError::ArgumentCount {
            expected: inlined,
            supplied: 0,
        }),
        _ => Ok(Rewritten {
            sql: text,
            positional,
            slots,
        }),
    }
}

/// `%v` at `offset` sits between a matching pair of quote characters.
fn is_quoted(bytes: &[u8], offset: usize) -> bool {
    if offset == 0 {
        return false;
    }
    let open = bytes[offset - 1];
    (open == b'\'' || open == b'"') && bytes.get(offset + 2) == Some(&open)
}

fn numeric_literal(value: &Value, offset: usize) -> Result<String, ParseError> {
    let not_numeric = || ParseError::NotNumeric {
        offset,
        kind: value.kind(),
    };
    match value {
        Value::Null => Ok("null".to_string()),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Float(f) => float_literal(*f).ok_or_else(not_numeric),
        Value::Boolean(b) => Ok(if *b { "1" } else { "0" }.to_string()),
        Value::Decimal(d) => Ok(d.to_string()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Ok(i.to_string())
            } else {
                s.parse::<f64>()
                    .ok()
                    .and_then(float_literal)
                    .ok_or_else(not_numeric)
            }
        }
        Value::Bytes(_) | Value::Timestamp(_) => Err(not_numeric()),
    }
}

fn float_literal(f: f64) -> Option<String> {
    f.is_finite().then(|| format!("{:?}", f))
}

fn string_literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => quote(s),
        Value::Bytes(b) => format!("X'{}'", hex::encode(b)),
        Value::Boolean(b) => quote(if *b { "1" } else { "0" }),
        Value::Timestamp(ts) => quote(&format_timestamp(ts)),
        Value::Integer(_) | Value::Float(_) | Value::Decimal(_) => quote(&value.to_string()),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn parse_with(sql: &str, args: &[Value]) -> Result<Rewritten, ParseError> {
        parse(sql, Some(args), QuoteHandling::Unwrap)
    }

    #[test]
    fn test_no_markers() {
        let r = parse_with("SELECT 1", &[]).unwrap();
        assert_eq!(r.sql, "SELECT 1");
        assert_eq!(r.positional, 0);
        assert!(r.slots.is_empty());
    }

    #[test]
    fn test_value_markers_numbered_in_order() {
        let args = [Value::from(1), Value::from("a"), Value::Null];
        let r = parse_with("INSERT INTO t VALUES (%v, %v, %v)", &args).unwrap();
        assert_eq!(r.sql, "INSERT INTO t VALUES (?1, ?2, ?3)");
        assert_eq!(r.positional, 3);
        assert_eq!(r.bind_list(&args), vec![&args[0], &args[1], &args[2]]);
    }

    #[test]
    fn test_inline_markers_create_no_slots() {
        let args = [Value::from(7), Value::from("it's"), Value::from(9)];
        let r = parse_with("SELECT %d, %s, %v", &args).unwrap();
        assert_eq!(r.sql, "SELECT 7, 'it''s', ?1");
        assert_eq!(r.positional, 1);
        assert_eq!(r.slots, vec![2]);
        assert_eq!(r.bind_list(&args), vec![&Value::Integer(9)]);
    }

    #[test]
    fn test_bind_list_borrows_arguments() {
        let args = [Value::from("large value")];
        let r = parse_with("SELECT %v", &args).unwrap();
        let list = r.bind_list(&args);
        assert!(std::ptr::eq(list[0], &args[0]));
    }

    #[test]
    fn test_argument_count_mismatch() {
        let err = parse_with("SELECT %v, %d", &[Value::from(1)]).unwrap_err();
        assert_eq!(err, ParseError::ArgumentCount { expected: 2, supplied: 1 });

        let err = parse_with("SELECT %v", &[Value::from(1), Value::from(2)]).unwrap_err();
        assert_eq!(err, ParseError::ArgumentCount { expected: 1, supplied: 2 });
    }

    #[test]
    fn test_without_arguments() {
        let r = parse("SELECT %v, %v", None, QuoteHandling::Unwrap).unwrap();
        assert_eq!(r.sql, "SELECT ?1, ?2");
        assert_eq!(r.positional, 2);
        assert!(r.slots.is_empty());

        let err = parse("SELECT %v, %d", None, QuoteHandling::Unwrap).unwrap_err();
        assert_eq!(err, ParseError::ArgumentCount { expected: 1, supplied: 0 });
    }

    #[test]
    fn test_invalid_specifier() {
        let err = parse_with("SELECT %x", &[Value::from(1)]).unwrap_err();
        assert_eq!(err, ParseError::InvalidSpecifier { offset: 7, found: 'x' });
    }

    #[test]
    fn test_ambiguous_specifier() {
        let err = parse_with("SELECT %val", &[Value::from(1)]).unwrap_err();
        assert_eq!(err, ParseError::AmbiguousSpecifier { offset: 7, found: 'a' });
    }

    #[test]
    fn test_dangling_marker() {
        let err = parse_with("SELECT 5 %", &[]).unwrap_err();
        assert_eq!(err, ParseError::DanglingMarker { offset: 9 });
    }

    #[test]
    fn test_percent_in_literal_is_still_a_marker() {
        let err = parse_with("SELECT * FROM t WHERE n LIKE 'a%'", &[]).unwrap_err();
        assert!(matches!(err, ParseError::InvalidSpecifier { found: '\'', .. }));
    }

    #[test]
    fn test_quoted_value_marker_unwrapped() {
        let args = [Value::from("x"), Value::from("y")];
        let r = parse_with("SELECT * FROM t WHERE a = '%v' AND b = \"%v\"", &args).unwrap();
        assert_eq!(r.sql, "SELECT * FROM t WHERE a = ?1 AND b = ?2");
        assert_eq!(r.positional, 2);
    }

    #[test]
    fn test_mismatched_quotes_not_unwrapped() {
        let r = parse_with("SELECT '%v\"", &[Value::from(1)]).unwrap();
        assert_eq!(r.sql, "SELECT '?1\"");
    }

    #[test]
    fn test_quoted_value_marker_verbatim() {
        let r = parse("SELECT '%v'", Some(&[Value::from(1)]), QuoteHandling::Verbatim).unwrap();
        assert_eq!(r.sql, "SELECT '?1'");
        assert_eq!(r.positional, 1);
    }

    #[test]
    fn test_numeric_literals() {
        let args = [
            Value::Null,
            Value::Float(1.5),
            Value::Float(2.0),
            Value::Boolean(true),
            Value::Decimal(Decimal::from_str("12.340").unwrap()),
            Value::from(" 42 "),
            Value::from("1e3"),
        ];
        let r = parse_with("%d %d %d %d %d %d %d", &args).unwrap();
        assert_eq!(r.sql, "null 1.5 2.0 1 12.340 42 1000.0");
    }

    #[test]
    fn test_numeric_literal_rejects_text() {
        let err = parse_with("SELECT %d", &[Value::from("1; DROP TABLE t")]).unwrap_err();
        assert!(matches!(err, ParseError::NotNumeric { offset: 7, .. }));

        let err = parse_with("SELECT %d", &[Value::Float(f64::NAN)]).unwrap_err();
        assert!(matches!(err, ParseError::NotNumeric { .. }));

        let err = parse_with("SELECT %d", &[Value::Bytes(vec![1])]).unwrap_err();
        assert!(matches!(err, ParseError::NotNumeric { .. }));
    }

    #[test]
    fn test_string_literals() {
        let ts = chrono::NaiveDate::from_ymd_opt(2020, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        let args = [
            Value::Null,
            Value::from(3),
            Value::Bytes(vec![0xab, 0x01]),
            Value::Boolean(false),
            Value::Timestamp(ts),
        ];
        let r = parse_with("%s %s %s %s %s", &args).unwrap();
        assert_eq!(r.sql, "null '3' X'ab01' '0' '2020-01-02 03:04:05'");
    }

    #[test]
    fn test_replacement_keeps_scan_offsets() {
        let long = "x".repeat(200);
        let args = [Value::from(long.as_str()), Value::from(1)];
        let r = parse_with("SELECT %s, %v", &args).unwrap();
        assert_eq!(r.sql, format!("SELECT '{}', ?1", long));
        assert_eq!(r.slots, vec![1]);
    }

    #[test]
    fn test_inlined_text_is_not_rescanned() {
        let args = [Value::from("100%v"), Value::from(2)];
        let r = parse_with("SELECT %s, %v", &args).unwrap();
        assert_eq!(r.sql, "SELECT '100%v', ?1");
    }

    #[test]
    fn test_multibyte_text_passes_through() {
        let r = parse_with("SELECT 'żółw', %v", &[Value::from(1)]).unwrap();
        assert_eq!(r.sql, "SELECT 'żółw', ?1");
    }

    #[test]
    fn test_multibyte_specifier() {
        let err = parse_with("SELECT %ż", &[Value::from(1)]).unwrap_err();
        assert_eq!(err, ParseError::InvalidSpecifier { offset: 7, found: 'ż' });
    }

    #[test]
    fn test_raw() {
        let r = Rewritten::raw("SELECT '%'");
        assert_eq!(r.sql, "SELECT '%'");
        assert_eq!(r.positional, 0);
    }
}
