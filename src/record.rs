use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::{Row, Statement};
use rusqlite::types::ValueRef;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use crate::decode::{self, Decoded};
use crate::error::{DecodeError, SqlAccessError, SqlFault};

/// A column reported by the driver for the current row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    name: String,
    decl_type: Option<String>,
}

impl Column {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type the column was declared with, when it maps straight to a table column.
    #[must_use]
    pub fn decl_type(&self) -> Option<&str> {
        self.decl_type.as_deref()
    }
}

/// Typed, null-aware view over the row a cursor is positioned on.
///
/// Every accessor returns `Ok(None)` only when the stored value is SQL NULL.
/// An unknown column name is a [`SqlFault`], never an empty value.
///
/// A record borrows the cursor; it cannot outlive the mapper invocation that
/// received it.
pub struct SqlRecord<'r> {
    row: &'r Row<'r>,
}

impl<'r> SqlRecord<'r> {
    pub(crate) fn new(row: &'r Row<'r>) -> Self {
        Self { row }
    }

    /// Columns available on this row, in select-list order.
    ///
    /// # Errors
    /// Kept fallible for drivers whose metadata lookup can fail; `rusqlite` reports
    /// column metadata from the prepared statement.
    pub fn columns(&self) -> Result<Vec<Column>, SqlAccessError> {
        let stmt: &Statement<'_> = self.row.as_ref();
        Ok(stmt
            .columns()
            .into_iter()
            .map(|c| Column {
                name: c.name().to_owned(),
                decl_type: c.decl_type().map(str::to_owned),
            })
            .collect())
    }

    /// Column names available on this row, in select-list order.
    ///
    /// # Errors
    /// See [`SqlRecord::columns`].
    pub fn column_names(&self) -> Result<Vec<String>, SqlAccessError> {
        let stmt: &Statement<'_> = self.row.as_ref();
        Ok(stmt
            .column_names()
            .into_iter()
            .map(str::to_owned)
            .collect())
    }

    fn raw(&self, column: &str) -> Result<ValueRef<'_>, SqlAccessError> {
        self.row.get_ref(column).map_err(|e| {
            SqlFault::new(format!("Error getting SQL value for column '{column}'"), e).into()
        })
    }

    fn read<T>(
        &self,
        column: &str,
        target: &'static str,
        decode: fn(ValueRef<'_>) -> Decoded<T>,
    ) -> Result<Option<T>, SqlAccessError> {
        let value = self.raw(column)?;
        decode(value).map_err(|reason| DecodeError::new(column, target, reason).into())
    }

    /// # Errors
    /// Fault for an unknown column; decode error for invalid UTF-8.
    pub fn get_string(&self, column: &str) -> Result<Option<String>, SqlAccessError> {
        self.read(column, "String", decode::string)
    }

    /// Decode a text label through `FromStr`, the way enums are stored.
    ///
    /// # Errors
    /// [`SqlAccessError::Decode`] when the stored label is not accepted by `E::from_str`.
    pub fn get_enum<E: FromStr>(&self, column: &str) -> Result<Option<E>, SqlAccessError> {
        self.read(column, std::any::type_name::<E>(), decode::label::<E>)
    }

    /// # Errors
    /// Decode error for non-numeric text, blobs or values outside `i32`.
    pub fn get_int(&self, column: &str) -> Result<Option<i32>, SqlAccessError> {
        self.read(column, "i32", decode::int)
    }

    /// # Errors
    /// Decode error for non-numeric text or blobs.
    pub fn get_long(&self, column: &str) -> Result<Option<i64>, SqlAccessError> {
        self.read(column, "i64", decode::long)
    }

    /// # Errors
    /// Decode error for non-numeric text, blobs or values outside `i16`.
    pub fn get_short(&self, column: &str) -> Result<Option<i16>, SqlAccessError> {
        self.read(column, "i16", decode::short)
    }

    /// # Errors
    /// Decode error for non-numeric text or blobs.
    pub fn get_float(&self, column: &str) -> Result<Option<f32>, SqlAccessError> {
        self.read(column, "f32", decode::float)
    }

    /// # Errors
    /// Decode error for non-numeric text or blobs.
    pub fn get_double(&self, column: &str) -> Result<Option<f64>, SqlAccessError> {
        self.read(column, "f64", decode::double)
    }

    /// Integers and reals are true when non-zero; text accepts `true`/`false` or a number.
    ///
    /// # Errors
    /// Decode error for other text or blobs.
    pub fn get_bool(&self, column: &str) -> Result<Option<bool>, SqlAccessError> {
        self.read(column, "bool", decode::boolean)
    }

    /// # Errors
    /// Decode error for numeric storage.
    pub fn get_bytes(&self, column: &str) -> Result<Option<Vec<u8>>, SqlAccessError> {
        self.read(column, "bytes", decode::bytes)
    }

    /// # Errors
    /// Decode error unless the value has BLOB storage.
    pub fn get_blob(&self, column: &str) -> Result<Option<Vec<u8>>, SqlAccessError> {
        self.read(column, "BLOB", decode::blob)
    }

    /// # Errors
    /// Decode error for numeric storage or invalid UTF-8.
    pub fn get_clob(&self, column: &str) -> Result<Option<String>, SqlAccessError> {
        self.read(column, "CLOB", decode::clob)
    }

    /// # Errors
    /// Decode error when the value is not a decimal number.
    pub fn get_decimal(&self, column: &str) -> Result<Option<Decimal>, SqlAccessError> {
        self.read(column, "Decimal", decode::decimal)
    }

    /// # Errors
    /// Decode error when the value is not a date.
    pub fn get_date(&self, column: &str) -> Result<Option<NaiveDate>, SqlAccessError> {
        self.read(column, "NaiveDate", decode::date)
    }

    /// # Errors
    /// Decode error when the value is not a time of day.
    pub fn get_time(&self, column: &str) -> Result<Option<NaiveTime>, SqlAccessError> {
        self.read(column, "NaiveTime", decode::time)
    }

    /// # Errors
    /// Decode error when the value is not a timestamp.
    pub fn get_instant(&self, column: &str) -> Result<Option<DateTime<Utc>>, SqlAccessError> {
        self.read(column, "DateTime<Utc>", decode::instant)
    }

    /// # Errors
    /// Decode error when the text is not valid JSON.
    pub fn get_json(&self, column: &str) -> Result<Option<JsonValue>, SqlAccessError> {
        self.read(column, "JSON", decode::json)
    }
}

/// Builds one value from the record the cursor is positioned on.
///
/// Implemented for every `Fn(&SqlRecord<'_>) -> Result<T, SqlAccessError>`:
///
/// ```rust
/// use sql_access::prelude::*;
///
/// fn user_name(record: &SqlRecord<'_>) -> Result<String, SqlAccessError> {
///     Ok(record.get_string("NAME")?.unwrap_or_default())
/// }
/// # let _ = user_name;
/// ```
pub trait RecordMapper<T> {
    /// # Errors
    /// Whatever the mapper reports; extractor failures propagate unchanged.
    fn map(&self, record: &SqlRecord<'_>) -> Result<T, SqlAccessError>;
}

impl<T, F> RecordMapper<T> for F
where
    F: Fn(&SqlRecord<'_>) -> Result<T, SqlAccessError>,
{
    fn map(&self, record: &SqlRecord<'_>) -> Result<T, SqlAccessError> {
        self(record)
    }
}
