//! SQL value semantics: comparison, arithmetic, LIKE, and truthiness.
//!
//! The engine's three-valued logic is carried through `Option`: `None`
//! stands for SQL UNKNOWN wherever a NULL operand makes a comparison
//! undecidable. Arithmetic propagates NULL as NULL.

use std::cmp::Ordering;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use sqlit_core::ast::BinaryOp;
use sqlit_core::Value;

use crate::error::{Error, Result};

/// A stable, type-tagged text key for a value. Used to build grouping and
/// deduplication keys; values that compare equal under [`value_eq`] within
/// the same type family serialize identically.
#[must_use]
pub(crate) fn serialize_value(value: &Value) -> String {
    match value {
        Value::Null => "n:".to_string(),
        Value::Bool(b) => format!("b:{}", i32::from(*b)),
        Value::Int(n) => format!("i:{n}"),
        Value::Float(f) => {
            // Integral floats key like their integer counterparts so that
            // 1 and 1.0 land in the same group.
            if f.fract() == 0.0 && f.is_finite() {
                format!("i:{}", *f as i64)
            } else {
                format!("f:{f}")
            }
        }
        Value::Decimal(d) => {
            if d.is_integer() {
                d.to_i64()
                    .map_or_else(|| format!("d:{d}"), |n| format!("i:{n}"))
            } else {
                format!("d:{}", d.normalize())
            }
        }
        Value::Text(s) => format!("t:{s}"),
        Value::Blob(b) => {
            let hex: String = b.iter().map(|byte| format!("{byte:02x}")).collect();
            format!("x:{hex}")
        }
        Value::Date(d) => format!("D:{d}"),
        Value::Time(t) => format!("T:{t}"),
        Value::DateTime(dt) => format!("dt:{dt}"),
    }
}

/// SQL equality. `None` when either side is NULL.
#[must_use]
pub(crate) fn value_eq(a: &Value, b: &Value) -> Option<bool> {
    value_cmp(a, b).map(|ord| ord == Ordering::Equal)
}

/// SQL ordering comparison. `None` when either side is NULL or the types
/// have no meaningful order between them.
#[must_use]
pub(crate) fn value_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    use Value::{Blob, Bool, Date, DateTime, Decimal as Dec, Float, Int, Null, Text, Time};
    match (a, b) {
        (Null, _) | (_, Null) => None,
        (Bool(x), Bool(y)) => Some(x.cmp(y)),
        (Int(x), Int(y)) => Some(x.cmp(y)),
        (Text(x), Text(y)) => Some(x.cmp(y)),
        (Blob(x), Blob(y)) => Some(x.cmp(y)),
        (Date(x), Date(y)) => Some(x.cmp(y)),
        (Time(x), Time(y)) => Some(x.cmp(y)),
        (DateTime(x), DateTime(y)) => Some(x.cmp(y)),
        (Date(x), DateTime(y)) => Some(x.and_hms_opt(0, 0, 0)?.cmp(y)),
        (DateTime(x), Date(y)) => Some(x.cmp(&y.and_hms_opt(0, 0, 0)?)),
        // Mixed numerics promote to the wider representation.
        (Int(_) | Float(_) | Dec(_), Int(_) | Float(_) | Dec(_)) => {
            if let (Some(x), Some(y)) = (as_decimal(a), as_decimal(b)) {
                Some(x.cmp(&y))
            } else {
                as_f64(a)?.partial_cmp(&as_f64(b)?)
            }
        }
        // Text holding a number compares numerically against numbers, the
        // way loosely typed drivers hand back numeric columns.
        (Text(s), Int(_) | Float(_) | Dec(_)) => {
            let parsed = parse_numeric_text(s)?;
            value_cmp(&parsed, b)
        }
        (Int(_) | Float(_) | Dec(_), Text(s)) => {
            let parsed = parse_numeric_text(s)?;
            value_cmp(a, &parsed)
        }
        _ => None,
    }
}

/// Total order for ORDER BY. NULLs sort first by default; `nulls_last`
/// flips that for an explicit `NULLS LAST`.
#[must_use]
pub(crate) fn sort_cmp(a: &Value, b: &Value, nulls_last: bool) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => {
            if nulls_last {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        (false, true) => {
            if nulls_last {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
        (false, false) => value_cmp(a, b).unwrap_or_else(|| {
            // Incomparable types order by their serialized form so the sort
            // stays total and deterministic.
            serialize_value(a).cmp(&serialize_value(b))
        }),
    }
}

fn parse_numeric_text(s: &str) -> Option<Value> {
    if let Ok(n) = s.trim().parse::<i64>() {
        return Some(Value::Int(n));
    }
    s.trim().parse::<f64>().ok().map(Value::Float)
}

pub(crate) fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(f) => Some(*f),
        Value::Decimal(d) => d.to_f64(),
        Value::Bool(b) => Some(f64::from(i32::from(*b))),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Int(n) => Some(Decimal::from(*n)),
        Value::Decimal(d) => Some(*d),
        Value::Float(f) => Decimal::from_f64(*f),
        _ => None,
    }
}

pub(crate) fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Int(n) => Some(*n),
        Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
        Value::Decimal(d) => d.to_i64(),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// SQL truthiness: NULL and zero are false, everything else true.
#[must_use]
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(n) => *n != 0,
        Value::Float(f) => *f != 0.0,
        Value::Decimal(d) => !d.is_zero(),
        Value::Text(s) => !s.is_empty() && s != "0",
        _ => true,
    }
}

/// Evaluates `left op right` for an arithmetic or concatenation operator.
/// NULL operands propagate to NULL.
pub(crate) fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    if op == BinaryOp::Concat {
        return Ok(Value::Text(format!(
            "{}{}",
            text_of(left),
            text_of(right)
        )));
    }

    // Integer arithmetic stays integral; Decimal dominates Float only when
    // both sides are exactly representable.
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        return int_arithmetic(op, *a, *b);
    }
    if matches!(left, Value::Decimal(_)) || matches!(right, Value::Decimal(_)) {
        if let (Some(a), Some(b)) = (as_decimal(left), as_decimal(right)) {
            return decimal_arithmetic(op, a, b);
        }
    }
    let (Some(a), Some(b)) = (as_f64(left), as_f64(right)) else {
        return Err(Error::TypeMismatch(format!(
            "cannot apply {op} to {} and {}",
            left.to_sql_inline(),
            right.to_sql_inline()
        )));
    };
    float_arithmetic(op, a, b)
}

fn int_arithmetic(op: BinaryOp, a: i64, b: i64) -> Result<Value> {
    let overflow = || {
        Error::TypeMismatch(format!("integer overflow evaluating {a} {op} {b}"))
    };
    match op {
        BinaryOp::Add => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
        BinaryOp::Sub => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
        BinaryOp::Mul => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
        BinaryOp::Div => {
            if b == 0 {
                Ok(Value::Null)
            } else if a % b == 0 {
                Ok(Value::Int(a / b))
            } else {
                Ok(Value::Float(a as f64 / b as f64))
            }
        }
        BinaryOp::Mod => {
            if b == 0 {
                Ok(Value::Null)
            } else {
                Ok(Value::Int(a % b))
            }
        }
        BinaryOp::BitAnd => Ok(Value::Int(a & b)),
        BinaryOp::BitOr => Ok(Value::Int(a | b)),
        BinaryOp::LeftShift => Ok(Value::Int(a.wrapping_shl(b as u32))),
        BinaryOp::RightShift => Ok(Value::Int(a.wrapping_shr(b as u32))),
        _ => Err(Error::TypeMismatch(format!("{op} is not arithmetic"))),
    }
}

fn decimal_arithmetic(op: BinaryOp, a: Decimal, b: Decimal) -> Result<Value> {
    let out = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => {
            if b.is_zero() {
                return Ok(Value::Null);
            }
            a.checked_div(b)
        }
        BinaryOp::Mod => {
            if b.is_zero() {
                return Ok(Value::Null);
            }
            a.checked_rem(b)
        }
        _ => return Err(Error::TypeMismatch(format!("{op} is not arithmetic"))),
    };
    out.map(Value::Decimal).ok_or_else(|| {
        Error::TypeMismatch(format!("decimal overflow evaluating {a} {op} {b}"))
    })
}

fn float_arithmetic(op: BinaryOp, a: f64, b: f64) -> Result<Value> {
    let out = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Ok(Value::Null);
            }
            a / b
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Ok(Value::Null);
            }
            a % b
        }
        _ => return Err(Error::TypeMismatch(format!("{op} is not arithmetic"))),
    };
    Ok(Value::Float(out))
}

pub(crate) fn text_of(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_sql_inline().trim_matches('\'').to_string(),
    }
}

/// SQL `LIKE` matching: `%` matches any run, `_` matches one character.
/// ASCII-case-insensitive, the common default.
#[must_use]
pub(crate) fn like_match(text: &str, pattern: &str) -> bool {
    fn matches(text: &[char], pattern: &[char]) -> bool {
        match pattern.first() {
            None => text.is_empty(),
            Some('%') => {
                // Collapse consecutive wildcards, then try every suffix.
                let rest = &pattern[1..];
                (0..=text.len()).any(|i| matches(&text[i..], rest))
            }
            Some('_') => !text.is_empty() && matches(&text[1..], &pattern[1..]),
            Some(c) => {
                text.first()
                    .is_some_and(|t| t.eq_ignore_ascii_case(c))
                    && matches(&text[1..], &pattern[1..])
            }
        }
    }
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    matches(&text, &pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_comparisons_are_unknown() {
        assert_eq!(value_eq(&Value::Null, &Value::Int(1)), None);
        assert_eq!(value_eq(&Value::Null, &Value::Null), None);
    }

    #[test]
    fn mixed_numeric_comparison() {
        assert_eq!(
            value_cmp(&Value::Int(2), &Value::Float(2.0)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            value_cmp(&Value::Float(1.5), &Value::Int(2)),
            Some(Ordering::Less)
        );
        assert_eq!(
            value_cmp(&Value::Decimal(Decimal::new(25, 1)), &Value::Int(2)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn numeric_text_coercion() {
        assert_eq!(
            value_cmp(&Value::Text("10".into()), &Value::Int(9)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn integer_division_stays_exact() {
        assert_eq!(
            arithmetic(BinaryOp::Div, &Value::Int(10), &Value::Int(2)).unwrap(),
            Value::Int(5)
        );
        assert_eq!(
            arithmetic(BinaryOp::Div, &Value::Int(7), &Value::Int(2)).unwrap(),
            Value::Float(3.5)
        );
        assert_eq!(
            arithmetic(BinaryOp::Div, &Value::Int(1), &Value::Int(0)).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn null_propagates_through_arithmetic() {
        assert_eq!(
            arithmetic(BinaryOp::Add, &Value::Null, &Value::Int(1)).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn like_wildcards() {
        assert!(like_match("hello world", "hello%"));
        assert!(like_match("hello", "h_llo"));
        assert!(like_match("HELLO", "hello"));
        assert!(!like_match("hello", "h_lo"));
        assert!(like_match("a", "%"));
        assert!(like_match("", "%"));
        assert!(!like_match("", "_"));
    }

    #[test]
    fn sort_puts_nulls_first_by_default() {
        assert_eq!(sort_cmp(&Value::Null, &Value::Int(1), false), Ordering::Less);
        assert_eq!(sort_cmp(&Value::Null, &Value::Int(1), true), Ordering::Greater);
    }

    #[test]
    fn serialization_unifies_integral_floats() {
        assert_eq!(
            serialize_value(&Value::Int(1)),
            serialize_value(&Value::Float(1.0))
        );
        assert_ne!(
            serialize_value(&Value::Int(1)),
            serialize_value(&Value::Text("1".into()))
        );
    }
}
