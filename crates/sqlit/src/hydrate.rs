//! Entity hydration: turning raw rows into host objects.
//!
//! Four strategies cover the spectrum:
//!
//! - raw rows — no target, the caller consumes [`Row`]s;
//! - a row hydrator — the target implements [`FromSqlRow`] and classifies
//!   each row itself;
//! - property assignment — the target implements [`Entity`], exposing
//!   compile-time [`FieldDescriptor`]s that are matched against result
//!   columns by name, with values routed through the converter registry;
//! - a closure — invoked with each row's values in positional order.
//!
//! A load callback can be attached to any strategy and runs after each
//! instance is built.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::convert::ConverterRegistry;
use crate::datetime::DateTimeConfig;
use crate::row::Row;
use crate::value_ops;
use sqlit_core::Value;

/// A hydration failure: the target type and what went wrong.
#[derive(Debug, Clone, Error)]
#[error("cannot hydrate {target}: {message}")]
pub struct HydrationError {
    /// The target type's name.
    pub target: &'static str,
    /// What went wrong.
    pub message: String,
}

impl HydrationError {
    /// A failure hydrating `T`.
    #[must_use]
    pub fn new<T>(message: impl Into<String>) -> Self {
        Self {
            target: std::any::type_name::<T>(),
            message: message.into(),
        }
    }
}

/// Everything a conversion needs besides the raw value: the converter
/// registry and the datetime configuration.
#[derive(Debug, Clone, Default)]
pub struct HydrationContext {
    /// The converter registry consulted before built-in conversions.
    pub registry: Arc<ConverterRegistry>,
    /// Timezone configuration for datetime reads.
    pub datetime: DateTimeConfig,
}

impl HydrationContext {
    /// Converts a raw value into `V`: a registered converter wins, the
    /// type's own [`FromSqlValue`] is the fallback.
    ///
    /// # Errors
    ///
    /// Returns [`HydrationError`] when neither path accepts the value.
    pub fn value_as<V: FromSqlValue + 'static>(
        &self,
        raw: &Value,
    ) -> Result<V, HydrationError> {
        match self.registry.convert::<V>(raw, &self.datetime) {
            Some(Some(converted)) => Ok(converted),
            Some(None) => Err(HydrationError::new::<V>(format!(
                "registered converter rejected {}",
                raw.to_sql_inline()
            ))),
            None => V::from_sql_value(raw, self),
        }
    }
}

/// Types constructible from a single SQL value.
pub trait FromSqlValue: Sized {
    /// Converts a raw value.
    ///
    /// # Errors
    ///
    /// Returns [`HydrationError`] when the value has no interpretation as
    /// `Self`.
    fn from_sql_value(value: &Value, ctx: &HydrationContext) -> Result<Self, HydrationError>;
}

/// Types constructible from a whole result row.
pub trait FromSqlRow: Sized {
    /// Builds an instance from a row.
    ///
    /// # Errors
    ///
    /// Returns [`HydrationError`] when the row cannot be absorbed.
    fn from_sql_row(row: &Row, ctx: &HydrationContext) -> Result<Self, HydrationError>;
}

impl FromSqlRow for Row {
    fn from_sql_row(row: &Row, _ctx: &HydrationContext) -> Result<Self, HydrationError> {
        Ok(row.clone())
    }
}

/// One settable field of an [`Entity`]: the column name it binds to and the
/// assignment function.
pub struct FieldDescriptor<T> {
    /// The column name this field absorbs.
    pub name: &'static str,
    /// Assigns a converted value into the instance.
    pub set: fn(&mut T, &Value, &HydrationContext) -> Result<(), HydrationError>,
}

impl<T> std::fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .finish()
    }
}

/// An entity hydrated by matching result columns against field descriptors.
///
/// Unknown columns are ignored; fields without a matching column keep their
/// default. Qualified result columns (`alias.column`) match on the bare
/// column name.
pub trait Entity: Default + 'static {
    /// The entity's field descriptors.
    fn fields() -> &'static [FieldDescriptor<Self>];

    /// Builds an instance from a row through the descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`HydrationError`] when a matched field rejects its value.
    fn hydrate(row: &Row, ctx: &HydrationContext) -> Result<Self, HydrationError> {
        let fields = Self::fields();
        let mut instance = Self::default();
        for (column, value) in row.iter() {
            let bare = column.rsplit('.').next().unwrap_or(column);
            if let Some(field) = fields.iter().find(|f| f.name == bare) {
                (field.set)(&mut instance, value, ctx)?;
            }
        }
        Ok(instance)
    }
}

/// A helper for writing [`FieldDescriptor::set`] bodies: converts and
/// assigns through a setter closure-compatible `fn`.
///
/// # Errors
///
/// Propagates the conversion failure.
pub fn assign<V: FromSqlValue + 'static>(
    slot: &mut V,
    value: &Value,
    ctx: &HydrationContext,
) -> Result<(), HydrationError> {
    *slot = ctx.value_as::<V>(value)?;
    Ok(())
}

// ---------------------------------------------------------------
// Built-in FromSqlValue conversions
// ---------------------------------------------------------------

impl FromSqlValue for Value {
    fn from_sql_value(value: &Value, _ctx: &HydrationContext) -> Result<Self, HydrationError> {
        Ok(value.clone())
    }
}

impl<T: FromSqlValue + 'static> FromSqlValue for Option<T> {
    fn from_sql_value(value: &Value, ctx: &HydrationContext) -> Result<Self, HydrationError> {
        if value.is_null() {
            Ok(None)
        } else {
            ctx.value_as::<T>(value).map(Some)
        }
    }
}

macro_rules! impl_from_sql_int {
    ($($t:ty),*) => {
        $(
            impl FromSqlValue for $t {
                fn from_sql_value(
                    value: &Value,
                    _ctx: &HydrationContext,
                ) -> Result<Self, HydrationError> {
                    value_ops::as_i64(value)
                        .and_then(|n| <$t>::try_from(n).ok())
                        .ok_or_else(|| HydrationError::new::<$t>(format!(
                            "{} is not an integer",
                            value.to_sql_inline()
                        )))
                }
            }
        )*
    };
}

impl_from_sql_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl FromSqlValue for f64 {
    fn from_sql_value(value: &Value, _ctx: &HydrationContext) -> Result<Self, HydrationError> {
        value_ops::as_f64(value).ok_or_else(|| {
            HydrationError::new::<f64>(format!("{} is not numeric", value.to_sql_inline()))
        })
    }
}

impl FromSqlValue for f32 {
    fn from_sql_value(value: &Value, ctx: &HydrationContext) -> Result<Self, HydrationError> {
        f64::from_sql_value(value, ctx).map(|f| f as Self)
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(value: &Value, _ctx: &HydrationContext) -> Result<Self, HydrationError> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(n) => Ok(*n != 0),
            other => Err(HydrationError::new::<bool>(format!(
                "{} is not a boolean",
                other.to_sql_inline()
            ))),
        }
    }
}

impl FromSqlValue for String {
    fn from_sql_value(value: &Value, _ctx: &HydrationContext) -> Result<Self, HydrationError> {
        match value {
            Value::Null => Err(HydrationError::new::<Self>("NULL is not text")),
            Value::Text(s) => Ok(s.clone()),
            other => Ok(value_ops::text_of(other)),
        }
    }
}

impl FromSqlValue for Vec<u8> {
    fn from_sql_value(value: &Value, _ctx: &HydrationContext) -> Result<Self, HydrationError> {
        match value {
            Value::Blob(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.clone().into_bytes()),
            other => Err(HydrationError::new::<Self>(format!(
                "{} is not binary",
                other.to_sql_inline()
            ))),
        }
    }
}

impl FromSqlValue for Decimal {
    fn from_sql_value(value: &Value, _ctx: &HydrationContext) -> Result<Self, HydrationError> {
        match value {
            Value::Decimal(d) => Ok(*d),
            Value::Int(n) => Ok(Self::from(*n)),
            Value::Text(s) => s.parse().map_err(|_| {
                HydrationError::new::<Self>(format!("'{s}' is not a decimal"))
            }),
            Value::Float(f) => Self::try_from(*f).map_err(|_| {
                HydrationError::new::<Self>(format!("{f} is not representable"))
            }),
            other => Err(HydrationError::new::<Self>(format!(
                "{} is not a decimal",
                other.to_sql_inline()
            ))),
        }
    }
}

impl FromSqlValue for NaiveDateTime {
    fn from_sql_value(value: &Value, ctx: &HydrationContext) -> Result<Self, HydrationError> {
        ctx.datetime
            .read_datetime(value)
            .map_err(|err| HydrationError::new::<Self>(err.to_string()))
    }
}

impl FromSqlValue for NaiveDate {
    fn from_sql_value(value: &Value, ctx: &HydrationContext) -> Result<Self, HydrationError> {
        ctx.datetime
            .read_date(value)
            .map_err(|err| HydrationError::new::<Self>(err.to_string()))
    }
}

impl FromSqlValue for NaiveTime {
    fn from_sql_value(value: &Value, _ctx: &HydrationContext) -> Result<Self, HydrationError> {
        match value {
            Value::Time(t) => Ok(*t),
            Value::Text(s) => s.parse().map_err(|_| {
                HydrationError::new::<Self>(format!("'{s}' is not a time"))
            }),
            Value::Decimal(d) => {
                let f = d.to_f64().unwrap_or_default();
                seconds_to_time(f).ok_or_else(|| {
                    HydrationError::new::<Self>(format!("{d} is not a time of day"))
                })
            }
            other => Err(HydrationError::new::<Self>(format!(
                "{} is not a time",
                other.to_sql_inline()
            ))),
        }
    }
}

fn seconds_to_time(seconds: f64) -> Option<NaiveTime> {
    if !(0.0..86_400.0).contains(&seconds) {
        return None;
    }
    let whole = seconds.trunc() as u32;
    let nanos = ((seconds - seconds.trunc()) * 1_000_000_000.0).round() as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(whole, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;

    #[derive(Debug, Default, PartialEq)]
    struct User {
        id: i64,
        name: String,
        active: bool,
        score: Option<f64>,
    }

    impl Entity for User {
        fn fields() -> &'static [FieldDescriptor<Self>] {
            &[
                FieldDescriptor {
                    name: "id",
                    set: |u, v, c| assign(&mut u.id, v, c),
                },
                FieldDescriptor {
                    name: "name",
                    set: |u, v, c| assign(&mut u.name, v, c),
                },
                FieldDescriptor {
                    name: "active",
                    set: |u, v, c| assign(&mut u.active, v, c),
                },
                FieldDescriptor {
                    name: "score",
                    set: |u, v, c| assign(&mut u.score, v, c),
                },
            ]
        }
    }

    #[test]
    fn entity_hydration_matches_columns_by_name() {
        let ctx = HydrationContext::default();
        let row = row!("id" => 3, "name" => "ada", "active" => true, "extra" => 9);
        let user = User::hydrate(&row, &ctx).unwrap();
        assert_eq!(
            user,
            User {
                id: 3,
                name: "ada".into(),
                active: true,
                score: None,
            }
        );
    }

    #[test]
    fn qualified_columns_match_bare_names() {
        let ctx = HydrationContext::default();
        let row = row!("u.id" => 5, "u.name" => "grace");
        let user = User::hydrate(&row, &ctx).unwrap();
        assert_eq!(user.id, 5);
        assert_eq!(user.name, "grace");
    }

    #[test]
    fn option_absorbs_null() {
        let ctx = HydrationContext::default();
        let row = row!("id" => 1, "name" => "x", "score" => Value::Null);
        let user = User::hydrate(&row, &ctx).unwrap();
        assert_eq!(user.score, None);
    }

    #[test]
    fn registry_overrides_builtin_conversion() {
        let mut registry = ConverterRegistry::new();
        registry.register(|value: &Value, _| match value {
            Value::Int(n) => Some(format!("#{n}")),
            _ => None,
        });
        let ctx = HydrationContext {
            registry: Arc::new(registry),
            datetime: DateTimeConfig::default(),
        };
        let row = row!("id" => 1, "name" => 42);
        let user = User::hydrate(&row, &ctx).unwrap();
        assert_eq!(user.name, "#42");
    }

    #[test]
    fn failure_carries_target_type() {
        let ctx = HydrationContext::default();
        let row = row!("id" => "not-a-number");
        let err = User::hydrate(&row, &ctx).unwrap_err();
        assert!(err.target.contains("i64"));
    }
}
