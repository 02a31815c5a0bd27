use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, Statement};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use crate::error::{SqlAccessError, SqlFault};

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const TIME_FORMAT: &str = "%H:%M:%S%.f";
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A domain value that knows how to turn itself into a driver value.
///
/// The live connection is handed over so implementations can allocate
/// driver-side resources while converting. A failing conversion surfaces
/// to the caller as a [`SqlFault`].
///
/// ```rust
/// use rusqlite::types::Value;
/// use sql_access::prelude::*;
///
/// struct Email(String);
///
/// impl ToSqlObject for Email {
///     fn to_sql_object(&self, _conn: &rusqlite::Connection) -> rusqlite::Result<Value> {
///         Ok(Value::Text(self.0.to_lowercase()))
///     }
/// }
///
/// let param = SqlParam::object(Email("John@Doe.com".into()));
/// # let _ = param;
/// ```
pub trait ToSqlObject {
    /// Convert the current object to a driver value (text, blob, integer ...).
    ///
    /// # Errors
    /// Returns the driver error raised while building the value.
    fn to_sql_object(&self, conn: &Connection) -> rusqlite::Result<Value>;
}

/// A statement parameter.
///
/// The variants are tried in declaration order when binding: temporal values get a
/// canonical text encoding, domain objects convert themselves, anything else is
/// handed to the driver untouched.
#[derive(Clone)]
pub enum SqlParam {
    /// Calendar date, bound as `YYYY-MM-DD`.
    Date(NaiveDate),
    /// Point in time, bound as a UTC `YYYY-MM-DD HH:MM:SS[.fff]` timestamp.
    Instant(DateTime<Utc>),
    /// Time of day, bound as `HH:MM:SS[.fff]`.
    Time(NaiveTime),
    /// Domain object converted through [`ToSqlObject`] at bind time.
    Object(Arc<dyn ToSqlObject>),
    /// Raw driver value; type coercion is left to SQLite.
    Value(Value),
}

impl SqlParam {
    #[must_use]
    pub fn null() -> Self {
        SqlParam::Value(Value::Null)
    }

    pub fn object(obj: impl ToSqlObject + 'static) -> Self {
        SqlParam::Object(Arc::new(obj))
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlParam::Value(Value::Null))
    }

    /// Produce the driver value bound for this parameter.
    ///
    /// # Errors
    /// Returns [`SqlAccessError::Fault`] if a [`ToSqlObject`] conversion fails.
    pub fn to_driver_value(&self, conn: &Connection) -> Result<Value, SqlAccessError> {
        let value = match self {
            SqlParam::Date(date) => Value::Text(date.format(DATE_FORMAT).to_string()),
            SqlParam::Instant(instant) => {
                Value::Text(instant.naive_utc().format(TIMESTAMP_FORMAT).to_string())
            }
            SqlParam::Time(time) => Value::Text(time.format(TIME_FORMAT).to_string()),
            SqlParam::Object(obj) => obj
                .to_sql_object(conn)
                .map_err(|e| SqlFault::new("Error converting SQL object", e))?,
            SqlParam::Value(value) => value.clone(),
        };
        Ok(value)
    }
}

impl fmt::Debug for SqlParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlParam::Date(date) => f.debug_tuple("Date").field(date).finish(),
            SqlParam::Instant(instant) => f.debug_tuple("Instant").field(instant).finish(),
            SqlParam::Time(time) => f.debug_tuple("Time").field(time).finish(),
            SqlParam::Object(_) => f.write_str("Object(..)"),
            SqlParam::Value(value) => f.debug_tuple("Value").field(value).finish(),
        }
    }
}

/// Bind `params` into positions `1..=params.len()` of a prepared statement.
///
/// The number of parameters must match the statement's placeholders exactly.
///
/// # Errors
/// Returns [`SqlAccessError::Fault`] on a count mismatch, or if a conversion or
/// the driver bind call fails.
pub fn bind_params(
    conn: &Connection,
    stmt: &mut Statement<'_>,
    params: &[SqlParam],
) -> Result<(), SqlAccessError> {
    let expected = stmt.parameter_count();
    if params.len() != expected {
        return Err(SqlFault::new(
            format!(
                "Error binding SQL parameters: statement expects {expected}, got {}",
                params.len()
            ),
            rusqlite::Error::InvalidParameterCount(params.len(), expected),
        )
        .into());
    }
    for (idx, param) in params.iter().enumerate() {
        let position = idx + 1;
        let value = param.to_driver_value(conn)?;
        stmt.raw_bind_parameter(position, value).map_err(|e| {
            SqlFault::new(format!("Error binding SQL parameter {position}"), e)
        })?;
    }
    Ok(())
}

impl From<NaiveDate> for SqlParam {
    fn from(value: NaiveDate) -> Self {
        SqlParam::Date(value)
    }
}

impl From<DateTime<Utc>> for SqlParam {
    fn from(value: DateTime<Utc>) -> Self {
        SqlParam::Instant(value)
    }
}

impl From<NaiveTime> for SqlParam {
    fn from(value: NaiveTime) -> Self {
        SqlParam::Time(value)
    }
}

impl From<Value> for SqlParam {
    fn from(value: Value) -> Self {
        SqlParam::Value(value)
    }
}

macro_rules! integer_param {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for SqlParam {
                fn from(value: $ty) -> Self {
                    SqlParam::Value(Value::Integer(i64::from(value)))
                }
            }
        )*
    };
}

integer_param!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for SqlParam {
    fn from(value: bool) -> Self {
        SqlParam::Value(Value::Integer(i64::from(value)))
    }
}

impl From<f32> for SqlParam {
    fn from(value: f32) -> Self {
        SqlParam::Value(Value::Real(f64::from(value)))
    }
}

impl From<f64> for SqlParam {
    fn from(value: f64) -> Self {
        SqlParam::Value(Value::Real(value))
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Value(Value::Text(value))
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Value(Value::Text(value.to_owned()))
    }
}

impl From<Vec<u8>> for SqlParam {
    fn from(value: Vec<u8>) -> Self {
        SqlParam::Value(Value::Blob(value))
    }
}

impl From<&[u8]> for SqlParam {
    fn from(value: &[u8]) -> Self {
        SqlParam::Value(Value::Blob(value.to_vec()))
    }
}

// Decimals are stored as text so no precision is lost to REAL affinity.
impl From<Decimal> for SqlParam {
    fn from(value: Decimal) -> Self {
        SqlParam::Value(Value::Text(value.to_string()))
    }
}

impl From<JsonValue> for SqlParam {
    fn from(value: JsonValue) -> Self {
        SqlParam::Value(Value::Text(value.to_string()))
    }
}

impl<T: Into<SqlParam>> From<Option<T>> for SqlParam {
    fn from(value: Option<T>) -> Self {
        value.map_or_else(SqlParam::null, Into::into)
    }
}
