use std::iter::FusedIterator;
use std::marker::PhantomData;

use rusqlite::Rows;
use tracing::trace;

use crate::error::{SqlAccessError, SqlFault};
use crate::record::{RecordMapper, SqlRecord};

/// Cursor options for [`super::SqlRunner::query_iterator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IteratorOptions {
    fetch_size: usize,
    updatable: bool,
}

impl IteratorOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows the driver should fetch per round trip; `0` keeps the driver default.
    ///
    /// SQLite steps one row at a time, so the hint never causes buffering.
    #[must_use]
    pub fn with_fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = fetch_size;
        self
    }

    /// Request an updatable cursor. SQLite rejects this when the cursor is opened.
    #[must_use]
    pub fn with_updatable(mut self, updatable: bool) -> Self {
        self.updatable = updatable;
        self
    }

    #[must_use]
    pub fn fetch_size(&self) -> usize {
        self.fetch_size
    }

    #[must_use]
    pub fn is_updatable(&self) -> bool {
        self.updatable
    }
}

/// Forward-only cursor mapping one row per step.
///
/// The underlying cursor is released as soon as it is exhausted, a step fails,
/// or [`SqlIterator::close`] is called; whichever comes first.
pub struct SqlIterator<'stmt, T, M: ?Sized> {
    rows: Option<Rows<'stmt>>,
    mapper: &'stmt M,
    fetch_size: usize,
    position: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<'stmt, T, M> SqlIterator<'stmt, T, M>
where
    M: RecordMapper<T> + ?Sized,
{
    pub(super) fn new(rows: Rows<'stmt>, mapper: &'stmt M, fetch_size: usize) -> Self {
        trace!(fetch_size, "opened SQL cursor");
        Self {
            rows: Some(rows),
            mapper,
            fetch_size,
            position: 0,
            _marker: PhantomData,
        }
    }

    /// Release the cursor now, before the consuming closure returns.
    pub fn close(mut self) {
        self.release();
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.rows.is_some()
    }

    /// Rows mapped so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn fetch_size(&self) -> usize {
        self.fetch_size
    }

    fn release(&mut self) {
        if self.rows.take().is_some() {
            trace!(rows = self.position, "released SQL cursor");
        }
    }
}

impl<T, M> Iterator for SqlIterator<'_, T, M>
where
    M: RecordMapper<T> + ?Sized,
{
    type Item = Result<T, SqlAccessError>;

    fn next(&mut self) -> Option<Self::Item> {
        let rows = self.rows.as_mut()?;
        let step = match rows.next() {
            Ok(Some(row)) => Some(self.mapper.map(&SqlRecord::new(row))),
            Ok(None) => None,
            Err(e) => Some(Err(SqlFault::new("Error advancing SQL cursor", e).into())),
        };
        let Some(item) = step else {
            self.release();
            return None;
        };
        match item {
            Ok(value) => {
                self.position += 1;
                Some(Ok(value))
            }
            Err(err) => {
                self.release();
                Some(Err(err))
            }
        }
    }
}

impl<T, M> FusedIterator for SqlIterator<'_, T, M> where M: RecordMapper<T> + ?Sized {}

/// Plain-value view over a [`SqlIterator`].
///
/// The first failure ends the stream; it is kept and reported by
/// [`super::SqlRunner::query_as_stream`] once the consumer returns.
pub struct SqlStream<'stmt, T, M: ?Sized> {
    inner: SqlIterator<'stmt, T, M>,
    error: Option<SqlAccessError>,
}

impl<'stmt, T, M> SqlStream<'stmt, T, M>
where
    M: RecordMapper<T> + ?Sized,
{
    pub(super) fn new(inner: SqlIterator<'stmt, T, M>) -> Self {
        Self { inner, error: None }
    }

    /// The failure that ended the stream, if any.
    #[must_use]
    pub fn error(&self) -> Option<&SqlAccessError> {
        self.error.as_ref()
    }

    pub(super) fn finish(self) -> Result<(), SqlAccessError> {
        self.error.map_or(Ok(()), Err)
    }
}

impl<T, M> Iterator for SqlStream<'_, T, M>
where
    M: RecordMapper<T> + ?Sized,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        match self.inner.next()? {
            Ok(value) => Some(value),
            Err(err) => {
                self.error = Some(err);
                None
            }
        }
    }
}

impl<T, M> FusedIterator for SqlStream<'_, T, M> where M: RecordMapper<T> + ?Sized {}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::super::SqlRunner;
    use super::*;
    use crate::query::SqlQuery;

    fn numbers() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE N (V TEXT);
             INSERT INTO N (V) VALUES ('1'), ('2'), ('x'), ('4');",
        )
        .unwrap();
        conn
    }

    fn as_long(r: &SqlRecord<'_>) -> Result<i64, SqlAccessError> {
        Ok(r.get_long("V")?.unwrap_or_default())
    }

    #[test]
    fn mapper_failure_releases_cursor() {
        let conn = numbers();
        let runner = SqlRunner::new(&conn);
        let seen = runner
            .query_iterator(
                &as_long,
                IteratorOptions::new(),
                &SqlQuery::new("SELECT V FROM N ORDER BY rowid"),
                |mut rows| {
                    let mut seen = Vec::new();
                    while let Some(item) = rows.next() {
                        seen.push(item.is_ok());
                    }
                    assert!(!rows.is_open());
                    assert_eq!(rows.position(), 2);
                    Ok(seen)
                },
            )
            .unwrap();
        assert_eq!(seen, vec![true, true, false]);
    }

    #[test]
    fn stream_reports_error_after_consumer() {
        let conn = numbers();
        let runner = SqlRunner::new(&conn);
        let mut collected = Vec::new();
        let err = runner
            .query_as_stream(
                &as_long,
                16,
                &SqlQuery::new("SELECT V FROM N ORDER BY rowid"),
                |stream| collected.extend(stream.by_ref()),
            )
            .unwrap_err();
        assert_eq!(collected, vec![1, 2]);
        assert!(matches!(err, SqlAccessError::Decode(_)));
    }

    #[test]
    fn options_builder() {
        let options = IteratorOptions::new().with_fetch_size(50);
        assert_eq!(options.fetch_size(), 50);
        assert!(!options.is_updatable());
        assert!(IteratorOptions::new().with_updatable(true).is_updatable());
    }
}
