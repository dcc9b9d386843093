//! Datetime conversion at the value boundary.
//!
//! Databases hand datetimes back in several shapes: text in the server's
//! configured timezone, integer epoch seconds, integer epoch milliseconds,
//! or floats with sub-second precision. [`DateTimeConfig`] pins down both
//! timezones and [`DateTimeConfig::read_datetime`] normalises every shape
//! into a naive datetime expressed in the application timezone.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::prelude::ToPrimitive;
use sqlit_core::Value;

use crate::error::{Error, Result};

/// Epoch values at or above this magnitude are interpreted as milliseconds.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Accepted text layouts, tried in order.
const TEXT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d",
];

/// The SQL-side and application-side timezones used when reading datetime
/// values out of result rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTimeConfig {
    /// The timezone datetime strings coming from the backend are written in.
    pub sql_timezone: Tz,
    /// The timezone values are reinterpreted into for the application.
    pub app_timezone: Tz,
}

impl Default for DateTimeConfig {
    fn default() -> Self {
        Self {
            sql_timezone: Tz::UTC,
            app_timezone: Tz::UTC,
        }
    }
}

impl DateTimeConfig {
    /// Config with both sides pinned to one timezone.
    #[must_use]
    pub const fn single(tz: Tz) -> Self {
        Self {
            sql_timezone: tz,
            app_timezone: tz,
        }
    }

    /// Converts a raw value into a naive datetime in the application
    /// timezone.
    ///
    /// - Text is parsed in the SQL timezone and shifted.
    /// - Integers are Unix epoch seconds (UTC), or milliseconds once the
    ///   magnitude reaches 10¹¹.
    /// - Floats are epoch seconds with sub-second precision.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] for values no interpretation fits.
    pub fn read_datetime(&self, value: &Value) -> Result<NaiveDateTime> {
        match value {
            Value::DateTime(dt) => Ok(self.shift(*dt)),
            Value::Date(d) => {
                let midnight = d.and_hms_opt(0, 0, 0).unwrap_or_default();
                Ok(self.shift(midnight))
            }
            Value::Text(s) => {
                let parsed = parse_text(s).ok_or_else(|| {
                    Error::TypeMismatch(format!("cannot read '{s}' as a datetime"))
                })?;
                Ok(self.shift(parsed))
            }
            Value::Int(n) => Ok(self.from_epoch(*n)),
            Value::Float(f) => {
                let secs = f.trunc() as i64;
                let nanos = ((f - f.trunc()) * 1_000_000_000.0).round() as u32;
                let utc = DateTime::from_timestamp(secs, nanos).ok_or_else(|| {
                    Error::TypeMismatch(format!("epoch {f} is out of range"))
                })?;
                Ok(utc.with_timezone(&self.app_timezone).naive_local())
            }
            Value::Decimal(d) => {
                let f = d.to_f64().ok_or_else(|| {
                    Error::TypeMismatch(format!("epoch {d} is out of range"))
                })?;
                self.read_datetime(&Value::Float(f))
            }
            other => Err(Error::TypeMismatch(format!(
                "cannot read {} as a datetime",
                other.to_sql_inline()
            ))),
        }
    }

    /// Converts a raw value into a calendar date in the application
    /// timezone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] for values no interpretation fits.
    pub fn read_date(&self, value: &Value) -> Result<NaiveDate> {
        match value {
            Value::Date(d) => Ok(*d),
            other => Ok(self.read_datetime(other)?.date()),
        }
    }

    fn from_epoch(&self, n: i64) -> NaiveDateTime {
        let utc: DateTime<Utc> = if n.abs() >= MILLIS_THRESHOLD {
            DateTime::from_timestamp_millis(n).unwrap_or_default()
        } else {
            DateTime::from_timestamp(n, 0).unwrap_or_default()
        };
        utc.with_timezone(&self.app_timezone).naive_local()
    }

    /// Reinterprets a naive datetime written in the SQL timezone as a naive
    /// datetime in the application timezone.
    fn shift(&self, naive: NaiveDateTime) -> NaiveDateTime {
        if self.sql_timezone == self.app_timezone {
            return naive;
        }
        match self.sql_timezone.from_local_datetime(&naive).earliest() {
            Some(zoned) => zoned.with_timezone(&self.app_timezone).naive_local(),
            // A nonexistent local time (DST gap) falls back to unshifted.
            None => naive,
        }
    }
}

fn parse_text(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for format in TEXT_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn epoch_seconds() {
        let cfg = DateTimeConfig::default();
        let dt = cfg.read_datetime(&Value::Int(0)).unwrap();
        assert_eq!(dt.to_string(), "1970-01-01 00:00:00");
    }

    #[test]
    fn epoch_millis_detected_by_magnitude() {
        let cfg = DateTimeConfig::default();
        let secs = cfg.read_datetime(&Value::Int(1_700_000_000)).unwrap();
        let millis = cfg.read_datetime(&Value::Int(1_700_000_000_000)).unwrap();
        assert_eq!(secs, millis);
    }

    #[test]
    fn float_carries_subseconds() {
        let cfg = DateTimeConfig::default();
        let dt = cfg.read_datetime(&Value::Float(0.5)).unwrap();
        assert_eq!(dt.nanosecond(), 500_000_000);
    }

    #[test]
    fn strings_are_shifted_between_timezones() {
        let cfg = DateTimeConfig {
            sql_timezone: Tz::UTC,
            app_timezone: Tz::Europe__Oslo,
        };
        let dt = cfg
            .read_datetime(&Value::Text("2024-01-15 12:00:00".into()))
            .unwrap();
        // Oslo is UTC+1 in January.
        assert_eq!(dt.to_string(), "2024-01-15 13:00:00");
    }

    #[test]
    fn plain_date_strings_parse() {
        let cfg = DateTimeConfig::default();
        let d = cfg.read_date(&Value::Text("2024-03-05".into())).unwrap();
        assert_eq!(d.to_string(), "2024-03-05");
    }

    #[test]
    fn garbage_is_a_type_mismatch() {
        let cfg = DateTimeConfig::default();
        assert!(cfg.read_datetime(&Value::Text("not a date".into())).is_err());
        assert!(cfg.read_datetime(&Value::Bool(true)).is_err());
    }
}
