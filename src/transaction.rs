//! Units of work: one connection, one transaction, exactly one outcome.

mod savepoint;

use std::fmt;

use clap::ValueEnum;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{SqlAccessError, SqlFault};
use crate::helper::SqlHelper;
use crate::runner::SqlRunner;
use crate::source::ConnectionSource;

pub use savepoint::SqlSavepoint;

/// Lifecycle of a [`SqlTransaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxState {
    Active,
    Committed,
    RolledBack,
    /// Closed while still active; the open transaction was discarded with the connection.
    Closed,
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TxState::Active => "active",
            TxState::Committed => "committed",
            TxState::RolledBack => "rolled back",
            TxState::Closed => "closed",
        })
    }
}

/// Requested isolation level. SQLite transactions are serializable; only
/// `ReadUncommitted` changes behavior, and only for shared-cache connections.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    #[default]
    Serializable,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IsolationLevel::ReadUncommitted => "read-uncommitted",
            IsolationLevel::ReadCommitted => "read-committed",
            IsolationLevel::RepeatableRead => "repeatable-read",
            IsolationLevel::Serializable => "serializable",
        })
    }
}

impl std::str::FromStr for IsolationLevel {
    type Err = SqlAccessError;

    /// Accepts `READ_COMMITTED` style names as well as the `read-committed` CLI spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(&s.replace('_', "-"), true)
            .map_err(|_| SqlAccessError::ConfigError(format!("unknown isolation level '{s}'")))
    }
}

/// How `BEGIN` acquires locks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BeginMode {
    #[default]
    Deferred,
    Immediate,
    Exclusive,
}

impl BeginMode {
    fn statement(self) -> &'static str {
        match self {
            BeginMode::Deferred => "BEGIN DEFERRED",
            BeginMode::Immediate => "BEGIN IMMEDIATE",
            BeginMode::Exclusive => "BEGIN EXCLUSIVE",
        }
    }
}

/// Settings applied when a unit of work begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionOptions {
    pub read_only: bool,
    /// `None` keeps the connection's current setting.
    pub isolation: Option<IsolationLevel>,
    pub begin_mode: BeginMode,
}

impl TransactionOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    #[must_use]
    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = Some(isolation);
        self
    }

    #[must_use]
    pub fn with_begin_mode(mut self, begin_mode: BeginMode) -> Self {
        self.begin_mode = begin_mode;
        self
    }
}

/// Transaction handle that owns its connection until closed.
///
/// Commit and rollback are terminal; a second terminal call, or any statement
/// after one, fails with [`SqlAccessError::TransactionState`]. Dropping the
/// handle closes the connection, which discards an uncommitted transaction.
///
/// ```rust
/// use sql_access::prelude::*;
///
/// # fn main() -> Result<(), SqlAccessError> {
/// let source = || rusqlite::Connection::open_in_memory();
/// let mut tx = SqlTransaction::begin(&source)?;
/// tx.runner()?.execute_batch("CREATE TABLE T (ID INTEGER)")?;
/// tx.commit()?;
/// assert!(tx.commit().is_err());
/// # Ok(())
/// # }
/// ```
pub struct SqlTransaction {
    conn: Option<Connection>,
    state: TxState,
    options: TransactionOptions,
}

impl SqlTransaction {
    /// Begin a read/write unit of work with default settings.
    ///
    /// # Errors
    /// Returns a fault if no connection can be acquired or the transaction cannot start.
    pub fn begin<S>(source: &S) -> Result<Self, SqlAccessError>
    where
        S: ConnectionSource + ?Sized,
    {
        Self::begin_with_options(source, TransactionOptions::default())
    }

    /// # Errors
    /// See [`SqlTransaction::begin`].
    pub fn begin_with_options<S>(
        source: &S,
        options: TransactionOptions,
    ) -> Result<Self, SqlAccessError>
    where
        S: ConnectionSource + ?Sized,
    {
        let conn = source.connection()?;
        Self::begin_with(conn, options)
    }

    /// Begin a unit of work on a connection the caller already holds.
    ///
    /// The connection is closed if setup fails.
    ///
    /// # Errors
    /// Returns a fault if a session pragma or `BEGIN` fails.
    pub fn begin_with(conn: Connection, options: TransactionOptions) -> Result<Self, SqlAccessError> {
        if let Err(err) = Self::setup(&conn, &options) {
            if let Err((_, close_err)) = conn.close() {
                warn!(error = %close_err, "failed to close connection after transaction setup error");
            }
            return Err(err);
        }
        debug!(
            read_only = options.read_only,
            isolation = ?options.isolation,
            begin_mode = ?options.begin_mode,
            "began SQL transaction"
        );
        Ok(Self {
            conn: Some(conn),
            state: TxState::Active,
            options,
        })
    }

    fn setup(conn: &Connection, options: &TransactionOptions) -> Result<(), SqlAccessError> {
        let fault = |e| SqlFault::new("Error beginning SQL transaction", e);
        conn.pragma_update(None, "query_only", options.read_only)
            .map_err(fault)?;
        if let Some(level) = options.isolation {
            conn.pragma_update(
                None,
                "read_uncommitted",
                level == IsolationLevel::ReadUncommitted,
            )
            .map_err(fault)?;
        }
        conn.execute_batch(options.begin_mode.statement())
            .map_err(fault)?;
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> TxState {
        self.state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TxState::Active
    }

    #[must_use]
    pub fn options(&self) -> &TransactionOptions {
        &self.options
    }

    /// The connection, while the unit of work is active.
    ///
    /// # Errors
    /// [`SqlAccessError::TransactionState`] once committed, rolled back or closed.
    pub fn connection(&self) -> Result<&Connection, SqlAccessError> {
        match (&self.conn, self.state) {
            (Some(conn), TxState::Active) => Ok(conn),
            _ => Err(SqlAccessError::TransactionState(self.state)),
        }
    }

    /// A runner bound to this unit of work.
    ///
    /// # Errors
    /// See [`SqlTransaction::connection`].
    pub fn runner(&self) -> Result<SqlRunner<'_>, SqlAccessError> {
        self.connection().map(SqlRunner::new)
    }

    /// Schema checks bound to this unit of work.
    ///
    /// # Errors
    /// See [`SqlTransaction::connection`].
    pub fn helper(&self) -> Result<SqlHelper<'_>, SqlAccessError> {
        self.connection().map(SqlHelper::new)
    }

    /// Set a named savepoint inside this unit of work.
    ///
    /// # Errors
    /// [`SqlAccessError::InvalidIdentifier`] for a name that is not a plain SQL
    /// identifier, a state error once the unit of work is over, or a fault.
    pub fn create_savepoint(&self, name: &str) -> Result<SqlSavepoint<'_>, SqlAccessError> {
        SqlSavepoint::create(self.connection()?, name)
    }

    /// # Errors
    /// A state error if already terminal; a fault if the driver rejects `COMMIT`,
    /// in which case the unit of work stays active.
    pub fn commit(&mut self) -> Result<(), SqlAccessError> {
        let conn = self.connection()?;
        conn.execute_batch("COMMIT")
            .map_err(|e| SqlFault::new("Error committing SQL transaction", e))?;
        self.state = TxState::Committed;
        debug!("committed SQL transaction");
        Ok(())
    }

    /// # Errors
    /// A state error if already terminal; a fault if the driver rejects `ROLLBACK`.
    pub fn rollback(&mut self) -> Result<(), SqlAccessError> {
        let conn = self.connection()?;
        conn.execute_batch("ROLLBACK")
            .map_err(|e| SqlFault::new("Error rolling back SQL transaction", e))?;
        self.state = TxState::RolledBack;
        debug!("rolled back SQL transaction");
        Ok(())
    }

    /// Release the connection. Safe to call more than once.
    ///
    /// # Errors
    /// A fault if the driver fails to close the connection.
    pub fn close(&mut self) -> Result<(), SqlAccessError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        if self.state == TxState::Active {
            self.state = TxState::Closed;
            debug!("closing SQL transaction without commit");
        }
        conn.close()
            .map_err(|(_, e)| SqlFault::new("Error closing SQL transaction", e).into())
    }
}

impl fmt::Debug for SqlTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlTransaction")
            .field("state", &self.state)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Drop for SqlTransaction {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "failed to close SQL transaction");
        }
    }
}
