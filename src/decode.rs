//! Storage-class coercions from a SQLite value to the Rust types exposed by
//! [`SqlRecord`](crate::SqlRecord).
//!
//! Every function returns `Ok(None)` for SQL NULL and only for SQL NULL; a value
//! that is present but cannot be represented yields the reason as `Err`.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::types::ValueRef;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use crate::params::{DATE_FORMAT, TIME_FORMAT, TIMESTAMP_FORMAT};

pub(crate) type Decoded<T> = Result<Option<T>, String>;

const DATETIME_FORMATS: &[&str] = &[
    TIMESTAMP_FORMAT,
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const ZONED_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%#z"];

fn utf8(bytes: &[u8]) -> Result<&str, String> {
    std::str::from_utf8(bytes).map_err(|e| format!("invalid UTF-8 text: {e}"))
}

pub(crate) fn string(value: ValueRef<'_>) -> Decoded<String> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Integer(i) => Ok(Some(i.to_string())),
        ValueRef::Real(f) => Ok(Some(f.to_string())),
        ValueRef::Text(t) | ValueRef::Blob(t) => utf8(t).map(|s| Some(s.to_owned())),
    }
}

pub(crate) fn clob(value: ValueRef<'_>) -> Decoded<String> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Text(t) | ValueRef::Blob(t) => utf8(t).map(|s| Some(s.to_owned())),
        ValueRef::Integer(_) | ValueRef::Real(_) => {
            Err("numeric value is not character data".into())
        }
    }
}

pub(crate) fn bytes(value: ValueRef<'_>) -> Decoded<Vec<u8>> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Text(b) | ValueRef::Blob(b) => Ok(Some(b.to_vec())),
        ValueRef::Integer(_) | ValueRef::Real(_) => Err("numeric value is not binary data".into()),
    }
}

pub(crate) fn blob(value: ValueRef<'_>) -> Decoded<Vec<u8>> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Blob(b) => Ok(Some(b.to_vec())),
        other => Err(format!("expected BLOB storage, found {}", other.data_type())),
    }
}

fn real_to_i64(f: f64) -> Result<i64, String> {
    let truncated = f.trunc();
    // i64::MAX is not representable as f64; compare against 2^63 instead.
    if truncated.is_finite()
        && truncated >= -9_223_372_036_854_775_808.0
        && truncated < 9_223_372_036_854_775_808.0
    {
        #[allow(clippy::cast_possible_truncation)]
        let i = truncated as i64;
        Ok(i)
    } else {
        Err(format!("real value {f} does not fit in a 64-bit integer"))
    }
}

pub(crate) fn long(value: ValueRef<'_>) -> Decoded<i64> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Integer(i) => Ok(Some(i)),
        ValueRef::Real(f) => real_to_i64(f).map(Some),
        ValueRef::Text(t) => {
            let s = utf8(t)?.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Ok(Some(i));
            }
            match s.parse::<f64>() {
                Ok(f) => real_to_i64(f).map(Some),
                Err(_) => Err(format!("'{s}' is not a number")),
            }
        }
        ValueRef::Blob(_) => Err("binary value is not a number".into()),
    }
}

fn narrowed<T: TryFrom<i64>>(value: ValueRef<'_>, target: &str) -> Decoded<T> {
    match long(value)? {
        None => Ok(None),
        Some(i) => T::try_from(i)
            .map(Some)
            .map_err(|_| format!("{i} is out of range for {target}")),
    }
}

pub(crate) fn int(value: ValueRef<'_>) -> Decoded<i32> {
    narrowed(value, "i32")
}

pub(crate) fn short(value: ValueRef<'_>) -> Decoded<i16> {
    narrowed(value, "i16")
}

pub(crate) fn double(value: ValueRef<'_>) -> Decoded<f64> {
    match value {
        ValueRef::Null => Ok(None),
        #[allow(clippy::cast_precision_loss)]
        ValueRef::Integer(i) => Ok(Some(i as f64)),
        ValueRef::Real(f) => Ok(Some(f)),
        ValueRef::Text(t) => {
            let s = utf8(t)?.trim();
            s.parse::<f64>()
                .map(Some)
                .map_err(|_| format!("'{s}' is not a number"))
        }
        ValueRef::Blob(_) => Err("binary value is not a number".into()),
    }
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn float(value: ValueRef<'_>) -> Decoded<f32> {
    double(value).map(|v| v.map(|f| f as f32))
}

pub(crate) fn boolean(value: ValueRef<'_>) -> Decoded<bool> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Integer(i) => Ok(Some(i != 0)),
        ValueRef::Real(f) => Ok(Some(f != 0.0)),
        ValueRef::Text(t) => {
            let s = utf8(t)?.trim();
            if s.eq_ignore_ascii_case("true") {
                Ok(Some(true))
            } else if s.eq_ignore_ascii_case("false") {
                Ok(Some(false))
            } else {
                long(value)
                    .map(|v| v.map(|i| i != 0))
                    .map_err(|_| format!("'{s}' is not a boolean"))
            }
        }
        ValueRef::Blob(_) => Err("binary value is not a boolean".into()),
    }
}

pub(crate) fn decimal(value: ValueRef<'_>) -> Decoded<Decimal> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Integer(i) => Ok(Some(Decimal::from(i))),
        ValueRef::Real(f) => Decimal::try_from(f)
            .map(Some)
            .map_err(|e| format!("real value {f} is not a decimal: {e}")),
        ValueRef::Text(t) => {
            let s = utf8(t)?.trim();
            Decimal::from_str(s)
                .or_else(|_| Decimal::from_scientific(s))
                .map(Some)
                .map_err(|e| format!("'{s}' is not a decimal: {e}"))
        }
        ValueRef::Blob(_) => Err("binary value is not a decimal".into()),
    }
}

fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = ZONED_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt.with_timezone(&Utc));
    }
    parse_naive_datetime(s).map(|naive| naive.and_utc())
}

fn from_epoch_millis(millis: i64) -> Result<DateTime<Utc>, String> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| format!("{millis} is out of range for an epoch timestamp"))
}

pub(crate) fn date(value: ValueRef<'_>) -> Decoded<NaiveDate> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Text(t) => {
            let s = utf8(t)?.trim();
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .or_else(|| parse_instant(s).map(|dt| dt.date_naive()))
                .map(Some)
                .ok_or_else(|| format!("'{s}' is not a date"))
        }
        // Epoch milliseconds.
        ValueRef::Integer(millis) => from_epoch_millis(millis).map(|dt| Some(dt.date_naive())),
        other => Err(format!("{} value is not a date", other.data_type())),
    }
}

pub(crate) fn time(value: ValueRef<'_>) -> Decoded<NaiveTime> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Text(t) => {
            let s = utf8(t)?.trim();
            NaiveTime::parse_from_str(s, TIME_FORMAT)
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .ok()
                .or_else(|| parse_instant(s).map(|dt| dt.time()))
                .map(Some)
                .ok_or_else(|| format!("'{s}' is not a time"))
        }
        ValueRef::Integer(millis) => from_epoch_millis(millis).map(|dt| Some(dt.time())),
        other => Err(format!("{} value is not a time", other.data_type())),
    }
}

pub(crate) fn instant(value: ValueRef<'_>) -> Decoded<DateTime<Utc>> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Text(t) => {
            let s = utf8(t)?.trim();
            parse_instant(s)
                .map(Some)
                .ok_or_else(|| format!("'{s}' is not a timestamp"))
        }
        ValueRef::Integer(millis) => from_epoch_millis(millis).map(Some),
        other => Err(format!("{} value is not a timestamp", other.data_type())),
    }
}

pub(crate) fn label<E: FromStr>(value: ValueRef<'_>) -> Decoded<E> {
    match string(value)? {
        None => Ok(None),
        Some(s) => E::from_str(&s).map(Some).map_err(|_| {
            format!("'{s}' is not a valid {} label", std::any::type_name::<E>())
        }),
    }
}

pub(crate) fn json(value: ValueRef<'_>) -> Decoded<JsonValue> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Integer(i) => Ok(Some(JsonValue::from(i))),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(|n| Some(JsonValue::Number(n)))
            .ok_or_else(|| format!("real value {f} is not representable in JSON")),
        ValueRef::Text(t) | ValueRef::Blob(t) => serde_json::from_slice(t)
            .map(Some)
            .map_err(|e| format!("invalid JSON: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_absent_for_every_type() {
        assert_eq!(string(ValueRef::Null), Ok(None));
        assert_eq!(long(ValueRef::Null), Ok(None));
        assert_eq!(boolean(ValueRef::Null), Ok(None));
        assert_eq!(decimal(ValueRef::Null), Ok(None));
        assert_eq!(date(ValueRef::Null), Ok(None));
        assert_eq!(instant(ValueRef::Null), Ok(None));
        assert_eq!(json(ValueRef::Null), Ok(None));
    }

    #[test]
    fn zero_is_present() {
        assert_eq!(long(ValueRef::Integer(0)), Ok(Some(0)));
        assert_eq!(boolean(ValueRef::Integer(0)), Ok(Some(false)));
        assert_eq!(double(ValueRef::Real(0.0)), Ok(Some(0.0)));
    }

    #[test]
    fn numbers_coerce_from_text() {
        assert_eq!(long(ValueRef::Text(b" 42 ")), Ok(Some(42)));
        assert_eq!(long(ValueRef::Text(b"4.9")), Ok(Some(4)));
        assert!(long(ValueRef::Text(b"forty-two")).is_err());
        assert_eq!(boolean(ValueRef::Text(b"TRUE")), Ok(Some(true)));
        assert_eq!(boolean(ValueRef::Text(b"0")), Ok(Some(false)));
    }

    #[test]
    fn narrowing_checks_range() {
        assert_eq!(short(ValueRef::Integer(-7)), Ok(Some(-7)));
        assert!(short(ValueRef::Integer(40_000)).is_err());
        assert!(int(ValueRef::Integer(i64::from(i32::MAX) + 1)).is_err());
    }

    #[test]
    fn decimals_keep_scale() {
        let value = decimal(ValueRef::Text(b"12.3400")).unwrap().unwrap();
        assert_eq!(value.to_string(), "12.3400");
        let value = decimal(ValueRef::Text(b"1.5e2")).unwrap().unwrap();
        assert_eq!(value, Decimal::from(150));
    }

    #[test]
    fn temporal_text_formats() {
        let d = date(ValueRef::Text(b"2023-12-31")).unwrap().unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());

        let t = time(ValueRef::Text(b"23:59:58.125")).unwrap().unwrap();
        assert_eq!(t, NaiveTime::from_hms_milli_opt(23, 59, 58, 125).unwrap());

        let i = instant(ValueRef::Text(b"2023-12-31T22:00:00+02:00")).unwrap().unwrap();
        assert_eq!(i.to_rfc3339(), "2023-12-31T20:00:00+00:00");

        let i = instant(ValueRef::Text(b"2023-12-31 20:00:00")).unwrap().unwrap();
        assert_eq!(i.to_rfc3339(), "2023-12-31T20:00:00+00:00");
    }

    #[test]
    fn temporal_epoch_millis() {
        let i = instant(ValueRef::Integer(86_400_000)).unwrap().unwrap();
        assert_eq!(i.date_naive(), NaiveDate::from_ymd_opt(1970, 1, 2).unwrap());
    }

    #[test]
    fn blob_rejects_text_storage() {
        assert!(blob(ValueRef::Text(b"abc")).is_err());
        assert_eq!(blob(ValueRef::Blob(&[1, 2])), Ok(Some(vec![1, 2])));
        assert_eq!(bytes(ValueRef::Text(b"ab")), Ok(Some(b"ab".to_vec())));
    }

    #[derive(Debug, PartialEq)]
    enum Color {
        Red,
    }

    impl FromStr for Color {
        type Err = ();

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s {
                "RED" => Ok(Color::Red),
                _ => Err(()),
            }
        }
    }

    #[test]
    fn labels_parse_or_fail() {
        assert_eq!(label::<Color>(ValueRef::Text(b"RED")), Ok(Some(Color::Red)));
        let err = label::<Color>(ValueRef::Text(b"BLUE")).unwrap_err();
        assert!(err.contains("'BLUE' is not a valid"));
    }
}
