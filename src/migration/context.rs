use super::MigrationMode;
use crate::error::SqlAccessError;
use crate::helper::SqlHelper;
use crate::runner::SqlRunner;
use crate::transaction::SqlTransaction;

/// What a migration step gets to work with: its unit of work plus a runner and
/// schema helper bound to the same connection.
#[derive(Debug)]
pub struct MigrationContext<'a> {
    tx: &'a SqlTransaction,
    runner: SqlRunner<'a>,
    helper: SqlHelper<'a>,
    mode: MigrationMode,
    step: &'a str,
}

impl<'a> MigrationContext<'a> {
    pub(super) fn new(
        tx: &'a SqlTransaction,
        mode: MigrationMode,
        step: &'a str,
    ) -> Result<Self, SqlAccessError> {
        Ok(Self {
            tx,
            runner: tx.runner()?,
            helper: tx.helper()?,
            mode,
            step,
        })
    }

    /// The unit of work, e.g. to set savepoints inside a step.
    #[must_use]
    pub fn transaction(&self) -> &'a SqlTransaction {
        self.tx
    }

    #[must_use]
    pub fn runner(&self) -> SqlRunner<'a> {
        self.runner
    }

    #[must_use]
    pub fn helper(&self) -> SqlHelper<'a> {
        self.helper
    }

    #[must_use]
    pub fn mode(&self) -> MigrationMode {
        self.mode
    }

    #[must_use]
    pub fn step_name(&self) -> &'a str {
        self.step
    }
}
