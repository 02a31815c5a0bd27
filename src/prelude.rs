//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and traits
//! to make it easier to get started with the library.

pub use crate::error::{DecodeError, SqlAccessError, SqlFault};
pub use crate::helper::SqlHelper;
pub use crate::migration::{
    MigrationContext, MigrationError, MigrationManager, MigrationMode, MigrationObserver,
    MigrationReport, MigrationStep, Migrator, StepOutcome, StepReport, TracingObserver,
};
pub use crate::params::{SqlParam, ToSqlObject};
pub use crate::query::SqlQuery;
pub use crate::record::{Column, RecordMapper, SqlRecord};
pub use crate::runner::{IteratorOptions, SqlIterator, SqlRunner, SqlStream};
pub use crate::source::ConnectionSource;
pub use crate::sqlite::{SqliteOptions, SqliteOptionsBuilder, SqliteSource};
pub use crate::transaction::{
    BeginMode, IsolationLevel, SqlSavepoint, SqlTransaction, TransactionOptions, TxState,
};
