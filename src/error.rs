use thiserror::Error;

use crate::transaction::TxState;

/// A driver failure raised while preparing, binding, executing or reading a statement.
///
/// Always carries the underlying `rusqlite` error so callers can inspect the
/// driver-reported result code.
#[derive(Debug, Error)]
#[error("{context}: {source}")]
pub struct SqlFault {
    context: String,
    #[source]
    source: rusqlite::Error,
}

impl SqlFault {
    pub fn new(context: impl Into<String>, source: rusqlite::Error) -> Self {
        Self {
            context: context.into(),
            source,
        }
    }

    /// What the layer was doing when the driver failed.
    #[must_use]
    pub fn context(&self) -> &str {
        &self.context
    }

    #[must_use]
    pub fn driver_error(&self) -> &rusqlite::Error {
        &self.source
    }

    /// The extended result code reported by SQLite, when the failure came from the engine
    /// rather than from the Rust side of the driver (e.g. an unknown column name).
    #[must_use]
    pub fn error_code(&self) -> Option<i32> {
        match &self.source {
            rusqlite::Error::SqliteFailure(err, _) => Some(err.extended_code),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_driver_error(self) -> rusqlite::Error {
        self.source
    }
}

/// A stored value could not be converted into the requested Rust type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot decode column '{column}' as {target}: {reason}")]
pub struct DecodeError {
    column: String,
    target: &'static str,
    reason: String,
}

impl DecodeError {
    pub fn new(column: impl Into<String>, target: &'static str, reason: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            target,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }

    #[must_use]
    pub fn target(&self) -> &'static str {
        self.target
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[derive(Debug, Error)]
pub enum SqlAccessError {
    #[error(transparent)]
    Fault(#[from] SqlFault),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("SQL transaction is {0}; operation not permitted")]
    TransactionState(TxState),

    #[error("Savepoint '{0}' already released")]
    SavepointReleased(String),

    #[error("Invalid SQL identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl SqlAccessError {
    /// The wrapped driver fault, if this error came from the driver.
    #[must_use]
    pub fn fault(&self) -> Option<&SqlFault> {
        match self {
            Self::Fault(fault) => Some(fault),
            _ => None,
        }
    }

    #[must_use]
    pub fn error_code(&self) -> Option<i32> {
        self.fault().and_then(SqlFault::error_code)
    }

    #[must_use]
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault(_))
    }
}

impl From<rusqlite::Error> for SqlAccessError {
    fn from(err: rusqlite::Error) -> Self {
        SqlAccessError::Fault(SqlFault::new("SQL driver error", err))
    }
}
