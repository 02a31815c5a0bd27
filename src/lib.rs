//! Typed access to `SQLite` through `rusqlite`.
//!
//! * [`SqlRecord`] reads named columns as `Option<T>`, keeping SQL NULL apart from zero values.
//! * [`SqlParam`] binds dates, times, instants, domain objects and raw driver values.
//! * [`SqlRunner`] runs statements: materialized lists, single rows, lazy cursors,
//!   counts and updates.
//! * [`SqlTransaction`] owns one connection per unit of work, with savepoints.
//! * [`MigrationManager`] runs ordered migration steps, one unit of work per step.
//!
//! ```rust
//! use sql_access::prelude::*;
//!
//! # fn main() -> Result<(), SqlAccessError> {
//! let dir = std::env::temp_dir().join(format!("sql-access-doc-{}", std::process::id()));
//! std::fs::create_dir_all(&dir).map_err(|e| SqlAccessError::ConfigError(e.to_string()))?;
//! let source = SqliteSource::builder(dir.join("doc.db").to_string_lossy()).build()?;
//!
//! let mut tx = SqlTransaction::begin(&source)?;
//! let runner = tx.runner()?;
//! runner.execute_batch("CREATE TABLE IF NOT EXISTS USERS (NAME TEXT, AGE INTEGER)")?;
//! runner.execute(&SqlQuery::with_params(
//!     "INSERT INTO USERS (NAME, AGE) VALUES (?, ?)",
//!     [SqlParam::from("alice"), SqlParam::from(None::<i32>)],
//! ))?;
//! let age = runner.query_single(
//!     &|r: &SqlRecord<'_>| r.get_int("AGE"),
//!     &SqlQuery::new("SELECT AGE FROM USERS"),
//! )?;
//! assert_eq!(age, Some(None));
//! tx.rollback()?;
//! # Ok(())
//! # }
//! ```

mod decode;

pub mod error;
pub mod helper;
pub mod migration;
pub mod params;
pub mod prelude;
pub mod query;
pub mod record;
pub mod runner;
pub mod source;
pub mod sqlite;
pub mod transaction;

pub use rusqlite;

pub use error::{DecodeError, SqlAccessError, SqlFault};
pub use helper::SqlHelper;
pub use migration::{
    MigrationContext, MigrationError, MigrationManager, MigrationMode, MigrationObserver,
    MigrationReport, MigrationStep, Migrator, StepOutcome, StepReport, TracingObserver,
};
pub use params::{SqlParam, ToSqlObject, bind_params};
pub use query::SqlQuery;
pub use record::{Column, RecordMapper, SqlRecord};
pub use runner::{IteratorOptions, SqlIterator, SqlRunner, SqlStream};
pub use source::ConnectionSource;
pub use sqlite::{SqliteOptions, SqliteOptionsBuilder, SqliteSource};
pub use transaction::{
    BeginMode, IsolationLevel, SqlSavepoint, SqlTransaction, TransactionOptions, TxState,
};
