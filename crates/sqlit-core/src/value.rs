//! Dynamic SQL values and parameter handling.
//!
//! A [`Value`] is the tagged runtime representation of anything that can travel
//! across the parameter boundary: literal constants parsed out of SQL text,
//! bound parameters supplied by a caller, and column values produced by a
//! backend. All values are either parameterized or escaped through
//! [`Value::to_sql_inline`] to prevent SQL injection.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

/// A SQL value that can be used as a parameter or a row cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Arbitrary precision decimal value.
    Decimal(Decimal),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
    /// Calendar date, no time-of-day component.
    Date(NaiveDate),
    /// Time-of-day, no calendar component.
    Time(NaiveTime),
    /// Naive (timezone-less) date and time. Engine-level timezone handling is
    /// applied at the boundary; see the datetime contract in the crate docs.
    DateTime(NaiveDateTime),
}

impl Value {
    /// Returns the SQL representation for inline use (escaped).
    ///
    /// **Warning**: prefer parameterized queries; this exists for renderers
    /// that fall back to literal inlining when a dialect forbids a bind spot
    /// (e.g. DDL identifiers, some LIMIT forms).
    #[must_use]
    pub fn to_sql_inline(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(b) => {
                if *b {
                    "TRUE".to_string()
                } else {
                    "FALSE".to_string()
                }
            }
            Self::Int(n) => format!("{n}"),
            Self::Float(f) => format!("{f}"),
            Self::Decimal(d) => d.to_string(),
            Self::Text(s) => {
                let escaped = s.replace('\'', "''");
                format!("'{escaped}'")
            }
            Self::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
                format!("X'{hex}'")
            }
            Self::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
            Self::Time(t) => format!("'{}'", t.format("%H:%M:%S%.f")),
            Self::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }

    /// `true` for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Trait for types that can be converted to a [`Value`].
///
/// Implemented for the Rust primitives a host is likely to pass as bound
/// parameters; entity hydration uses the inverse direction (see
/// `sqlit::hydrate`).
pub trait ToValue {
    /// Converts the value to a [`Value`].
    fn to_value(self) -> Value;
}

impl ToValue for Value {
    fn to_value(self) -> Value {
        self
    }
}

impl ToValue for bool {
    fn to_value(self) -> Value {
        Value::Bool(self)
    }
}

macro_rules! impl_to_value_int {
    ($($t:ty),*) => {
        $(
            impl ToValue for $t {
                fn to_value(self) -> Value {
                    Value::Int(i64::from(self))
                }
            }
        )*
    };
}

impl_to_value_int!(i8, i16, i32, i64, u8, u16, u32);

impl ToValue for f64 {
    fn to_value(self) -> Value {
        Value::Float(self)
    }
}

impl ToValue for f32 {
    fn to_value(self) -> Value {
        Value::Float(f64::from(self))
    }
}

impl ToValue for Decimal {
    fn to_value(self) -> Value {
        Value::Decimal(self)
    }
}

impl ToValue for String {
    fn to_value(self) -> Value {
        Value::Text(self)
    }
}

impl ToValue for &str {
    fn to_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl ToValue for NaiveDate {
    fn to_value(self) -> Value {
        Value::Date(self)
    }
}

impl ToValue for NaiveTime {
    fn to_value(self) -> Value {
        Value::Time(self)
    }
}

impl ToValue for NaiveDateTime {
    fn to_value(self) -> Value {
        Value::DateTime(self)
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl ToValue for Vec<u8> {
    fn to_value(self) -> Value {
        Value::Blob(self)
    }
}

impl ToValue for &[u8] {
    fn to_value(self) -> Value {
        Value::Blob(self.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_null() {
        assert_eq!(Value::Null.to_sql_inline(), "NULL");
    }

    #[test]
    fn inline_bool() {
        assert_eq!(Value::Bool(true).to_sql_inline(), "TRUE");
        assert_eq!(Value::Bool(false).to_sql_inline(), "FALSE");
    }

    #[test]
    fn inline_int() {
        assert_eq!(Value::Int(42).to_sql_inline(), "42");
        assert_eq!(Value::Int(-100).to_sql_inline(), "-100");
    }

    #[test]
    fn inline_text_escaping() {
        assert_eq!(
            Value::Text("it's".to_string()).to_sql_inline(),
            "'it''s'"
        );
        assert_eq!(
            Value::Text("O'Brien".to_string()).to_sql_inline(),
            "'O''Brien'"
        );
    }

    #[test]
    fn injection_attempt_is_escaped() {
        let malicious = "'; DROP TABLE users; --";
        let value = Value::Text(malicious.to_string());
        assert_eq!(value.to_sql_inline(), "'''; DROP TABLE users; --'");
    }

    #[test]
    fn inline_blob() {
        assert_eq!(
            Value::Blob(vec![0x48, 0x45, 0x4C, 0x4C, 0x4F]).to_sql_inline(),
            "X'48454C4C4F'"
        );
    }

    #[test]
    fn conversions() {
        assert_eq!(true.to_value(), Value::Bool(true));
        assert_eq!(42_i32.to_value(), Value::Int(42));
        assert_eq!(3.14_f64.to_value(), Value::Float(3.14));
        assert_eq!("hello".to_value(), Value::Text("hello".to_string()));
        assert_eq!(None::<i32>.to_value(), Value::Null);
        assert_eq!(Some(42_i32).to_value(), Value::Int(42));
    }

    #[test]
    fn inline_date_time() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(Value::Date(d).to_sql_inline(), "'2024-03-05'");
    }
}
