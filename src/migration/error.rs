use std::error::Error as StdError;
use std::fmt::Write as _;

use thiserror::Error;

use super::MigrationMode;
use crate::error::SqlAccessError;

/// Errors raised by migration steps and by the orchestrator.
#[derive(Error, Debug)]
pub enum MigrationError {
    /// The step decided it has nothing to do; the run continues.
    #[error("Migration step skipped: {reason}")]
    Skipped { reason: String },

    #[error(transparent)]
    Sql(#[from] SqlAccessError),

    /// A step failed and the run stopped there.
    #[error("Migration step '{step}' failed in {mode} mode: {source}")]
    StepFailed {
        step: String,
        mode: MigrationMode,
        #[source]
        source: Box<MigrationError>,
    },

    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

impl MigrationError {
    /// Create the skip signal.
    pub fn skip(reason: impl Into<String>) -> Self {
        MigrationError::Skipped {
            reason: reason.into(),
        }
    }

    /// Wrap any error raised by step code.
    pub fn other<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        MigrationError::Other(Box::new(err))
    }

    /// Create a failure from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        MigrationError::Other(message.into())
    }

    #[must_use]
    pub fn is_skip(&self) -> bool {
        matches!(self, MigrationError::Skipped { .. })
    }

    /// Name of the step that stopped the run.
    #[must_use]
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            MigrationError::StepFailed { step, .. } => Some(step),
            _ => None,
        }
    }

    /// The SQL error underneath, unwrapping step failures.
    #[must_use]
    pub fn sql_error(&self) -> Option<&SqlAccessError> {
        match self {
            MigrationError::Sql(err) => Some(err),
            MigrationError::StepFailed { source, .. } => source.sql_error(),
            _ => None,
        }
    }

    /// Format error with full details including error chain
    #[must_use]
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {self}\n");
        let mut source = self.source();
        let mut depth = 1;
        while let Some(err) = source {
            let _ = write!(output, "\nCaused by:\n  {depth}: {err}");
            source = err.source();
            depth += 1;
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_failure_exposes_sql_error() {
        let inner = MigrationError::Sql(SqlAccessError::ConfigError("bad".into()));
        let err = MigrationError::StepFailed {
            step: "create-users".into(),
            mode: MigrationMode::Normal,
            source: Box::new(inner),
        };
        assert_eq!(err.failed_step(), Some("create-users"));
        assert!(err.sql_error().is_some());
        assert!(!err.is_skip());
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: Migration step 'create-users' failed in NORMAL mode"));
        assert!(detailed.contains("Caused by:\n  1: Configuration error: bad"));
    }

    #[test]
    fn helpers() {
        assert!(MigrationError::skip("already done").is_skip());
        assert_eq!(MigrationError::msg("boom").to_string(), "boom");
        let io = std::io::Error::other("disk");
        assert_eq!(MigrationError::other(io).to_string(), "disk");
    }
}
