//! Statement execution against a borrowed connection.

mod iter;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, Statement, ffi};
use tracing::trace;

use crate::decode;
use crate::error::{DecodeError, SqlAccessError, SqlFault};
use crate::params::bind_params;
use crate::query::SqlQuery;
use crate::record::{RecordMapper, SqlRecord};

pub use iter::{IteratorOptions, SqlIterator, SqlStream};

/// Runs statements on one connection: prepare, bind, execute, map.
///
/// Every call prepares its own statement and drops it before returning; lazy
/// cursors only live inside the closure handed to [`SqlRunner::query_iterator`].
///
/// ```rust
/// use sql_access::prelude::*;
///
/// # fn main() -> Result<(), SqlAccessError> {
/// let conn = rusqlite::Connection::open_in_memory()?;
/// let runner = SqlRunner::new(&conn);
/// runner.execute_batch("CREATE TABLE T (ID INTEGER, NAME TEXT);")?;
/// runner.execute(&SqlQuery::with_params(
///     "INSERT INTO T (ID, NAME) VALUES (?, ?)",
///     [SqlParam::from(1), SqlParam::from("alice")],
/// ))?;
///
/// let names = runner.query(
///     &|r: &SqlRecord<'_>| r.get_string("NAME"),
///     &SqlQuery::new("SELECT NAME FROM T"),
/// )?;
/// assert_eq!(names, vec![Some("alice".to_string())]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SqlRunner<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlRunner<'conn> {
    #[must_use]
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    #[must_use]
    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    fn prepare(&self, query: &SqlQuery) -> Result<Statement<'conn>, SqlAccessError> {
        trace!(
            sql = query.sql(),
            params = query.params().len(),
            "preparing SQL statement"
        );
        let mut stmt = self
            .conn
            .prepare(query.sql())
            .map_err(|e| SqlFault::new("Error preparing SQL statement", e))?;
        bind_params(self.conn, &mut stmt, query.params())?;
        Ok(stmt)
    }

    /// Materialize every row through `mapper`.
    ///
    /// # Errors
    /// [`SqlAccessError::Fault`] for driver failures; mapper errors propagate unchanged.
    pub fn query<T, M>(&self, mapper: &M, query: &SqlQuery) -> Result<Vec<T>, SqlAccessError>
    where
        M: RecordMapper<T> + ?Sized,
    {
        let mut stmt = self.prepare(query)?;
        let mut rows = stmt.raw_query();
        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| SqlFault::new("Error reading SQL row", e))?
        {
            out.push(mapper.map(&SqlRecord::new(row))?);
        }
        Ok(out)
    }

    /// Map the first row, if there is one. Later rows are never read.
    ///
    /// # Errors
    /// See [`SqlRunner::query`].
    pub fn query_single<T, M>(
        &self,
        mapper: &M,
        query: &SqlQuery,
    ) -> Result<Option<T>, SqlAccessError>
    where
        M: RecordMapper<T> + ?Sized,
    {
        let mut stmt = self.prepare(query)?;
        let mut rows = stmt.raw_query();
        match rows
            .next()
            .map_err(|e| SqlFault::new("Error reading SQL row", e))?
        {
            Some(row) => mapper.map(&SqlRecord::new(row)).map(Some),
            None => Ok(None),
        }
    }

    /// Open a lazy cursor and hand it to `consume`.
    ///
    /// The cursor and its statement are released when `consume` returns, however
    /// it returns. [`SqlIterator::close`] releases them earlier.
    ///
    /// # Errors
    /// Fails before running `consume` when preparation or binding fails, or when
    /// an updatable cursor is requested. Otherwise returns whatever `consume` returns.
    pub fn query_iterator<T, M, F, R>(
        &self,
        mapper: &M,
        options: IteratorOptions,
        query: &SqlQuery,
        consume: F,
    ) -> Result<R, SqlAccessError>
    where
        M: RecordMapper<T> + ?Sized,
        F: FnOnce(SqlIterator<'_, T, M>) -> Result<R, SqlAccessError>,
    {
        if options.is_updatable() {
            return Err(SqlFault::new(
                "Error opening SQL cursor",
                rusqlite::Error::SqliteFailure(
                    ffi::Error::new(ffi::SQLITE_MISUSE),
                    Some("SQLite only supports read-only cursors".to_owned()),
                ),
            )
            .into());
        }
        let mut stmt = self.prepare(query)?;
        let rows = stmt.raw_query();
        consume(SqlIterator::new(rows, mapper, options.fetch_size()))
    }

    /// Lazy stream of mapped rows built on [`SqlRunner::query_iterator`].
    ///
    /// The stream yields plain values. A failure ends it early and is returned
    /// once `consume` has finished, in place of its result.
    ///
    /// # Errors
    /// The first fault or mapper error met while streaming.
    pub fn query_as_stream<T, M, F, R>(
        &self,
        mapper: &M,
        fetch_size: usize,
        query: &SqlQuery,
        consume: F,
    ) -> Result<R, SqlAccessError>
    where
        M: RecordMapper<T> + ?Sized,
        F: FnOnce(&mut SqlStream<'_, T, M>) -> R,
    {
        let options = IteratorOptions::new().with_fetch_size(fetch_size);
        self.query_iterator(mapper, options, query, |rows| {
            let mut stream = SqlStream::new(rows);
            let out = consume(&mut stream);
            stream.finish().map(|()| out)
        })
    }

    /// First column of the first row as an integer; `0` when there is no row or it is NULL.
    ///
    /// # Errors
    /// Fault for driver failures; decode error when the value is not numeric.
    pub fn count(&self, query: &SqlQuery) -> Result<i64, SqlAccessError> {
        let mut stmt = self.prepare(query)?;
        let mut rows = stmt.raw_query();
        let Some(row) = rows
            .next()
            .map_err(|e| SqlFault::new("Error reading SQL row", e))?
        else {
            return Ok(0);
        };
        let value: ValueRef<'_> = row
            .get_ref(0)
            .map_err(|e| SqlFault::new("Error getting SQL count value", e))?;
        let count = decode::long(value).map_err(|reason| DecodeError::new("#1", "i64", reason))?;
        Ok(count.unwrap_or(0))
    }

    /// Run a data-modifying statement and return the affected-row count.
    ///
    /// # Errors
    /// [`SqlAccessError::Fault`] for driver failures.
    pub fn execute(&self, query: &SqlQuery) -> Result<usize, SqlAccessError> {
        let mut stmt = self.prepare(query)?;
        stmt.raw_execute()
            .map_err(|e| SqlFault::new("Error executing SQL statement", e).into())
    }

    /// Run a script of `;`-separated statements without parameters.
    ///
    /// # Errors
    /// [`SqlAccessError::Fault`] for the first failing statement.
    pub fn execute_batch(&self, sql: &str) -> Result<(), SqlAccessError> {
        trace!(sql, "executing SQL batch");
        self.conn
            .execute_batch(sql)
            .map_err(|e| SqlFault::new("Error executing SQL batch", e).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE N (V INTEGER);
             INSERT INTO N (V) VALUES (1), (2), (3);",
        )
        .unwrap();
        conn
    }

    fn value(r: &SqlRecord<'_>) -> Result<i64, SqlAccessError> {
        Ok(r.get_long("V")?.unwrap_or_default())
    }

    #[test]
    fn count_reads_first_column() {
        let conn = seeded();
        let runner = SqlRunner::new(&conn);
        assert_eq!(runner.count(&SqlQuery::new("SELECT COUNT(*) FROM N")).unwrap(), 3);
        assert_eq!(
            runner
                .count(&SqlQuery::new("SELECT V FROM N WHERE V > 5"))
                .unwrap(),
            0
        );
        assert_eq!(runner.count(&SqlQuery::new("SELECT NULL")).unwrap(), 0);
    }

    #[test]
    fn query_single_stops_at_first_row() {
        let conn = seeded();
        let runner = SqlRunner::new(&conn);
        let first = runner
            .query_single(&value, &SqlQuery::new("SELECT V FROM N ORDER BY V DESC"))
            .unwrap();
        assert_eq!(first, Some(3));
    }

    #[test]
    fn updatable_cursor_is_rejected() {
        let conn = seeded();
        let runner = SqlRunner::new(&conn);
        let err = runner
            .query_iterator(
                &value,
                IteratorOptions::new().with_updatable(true),
                &SqlQuery::new("SELECT V FROM N"),
                |rows| Ok(rows.count()),
            )
            .unwrap_err();
        assert_eq!(err.error_code(), Some(ffi::SQLITE_MISUSE));
    }

    #[test]
    fn prepare_failure_is_a_fault() {
        let conn = seeded();
        let runner = SqlRunner::new(&conn);
        let err = runner
            .execute(&SqlQuery::new("INSERT INTO MISSING VALUES (1)"))
            .unwrap_err();
        assert!(err.is_fault());
        assert!(err.to_string().starts_with("Error preparing SQL statement"));
    }
}
