use rusqlite::Connection;

use crate::error::{SqlAccessError, SqlFault};

/// Hands out fresh connections for units of work.
///
/// Pooling, if any, lives behind this trait. Any closure returning a
/// `rusqlite` connection is a source:
///
/// ```rust
/// use sql_access::prelude::*;
///
/// # fn main() -> Result<(), SqlAccessError> {
/// let source = || rusqlite::Connection::open_in_memory();
/// let conn = source.connection()?;
/// # drop(conn);
/// # Ok(())
/// # }
/// ```
pub trait ConnectionSource {
    /// # Errors
    /// Returns a fault when the driver cannot open a connection.
    fn connection(&self) -> Result<Connection, SqlAccessError>;
}

impl<F> ConnectionSource for F
where
    F: Fn() -> rusqlite::Result<Connection>,
{
    fn connection(&self) -> Result<Connection, SqlAccessError> {
        self().map_err(|e| SqlFault::new("Error opening SQL connection", e).into())
    }
}
