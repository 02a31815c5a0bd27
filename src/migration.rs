//! Ordered migration steps, each run in its own unit of work.
//!
//! Steps are executed in registration order for one [`MigrationMode`] at a time.
//! A step that returns [`MigrationError::Skipped`] is reported and its writes are
//! discarded; any other failure discards its writes and stops the run.
//!
//! ```rust
//! use sql_access::prelude::*;
//!
//! # fn main() -> Result<(), MigrationError> {
//! let source = || rusqlite::Connection::open("file:demo?mode=memory&cache=shared");
//! let mut manager = MigrationManager::new(source);
//! manager.register(MigrationStep::new("create-users").normal(|ctx| {
//!     if !ctx.helper().table_exists("USERS")? {
//!         ctx.runner()
//!             .execute_batch("CREATE TABLE USERS (UUID TEXT PRIMARY KEY, NAME TEXT NOT NULL)")?;
//!     }
//!     Ok(())
//! }));
//!
//! let report = manager.execute(MigrationMode::Normal)?;
//! assert_eq!(report.succeeded_count(), 1);
//! # Ok(())
//! # }
//! ```

mod context;
mod error;
mod manager;
mod migrator;
mod observer;

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub use context::MigrationContext;
pub use error::MigrationError;
pub use manager::{MigrationManager, MigrationReport, StepOutcome, StepReport};
pub use migrator::{MigrationStep, Migrator};
pub use observer::{MigrationObserver, TracingObserver};

/// Which phase of a deployment a run belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationMode {
    /// Before the new version goes live; the old version is still serving.
    LiveBefore,
    /// With the application stopped.
    Normal,
    /// After the new version is live.
    LiveAfter,
}

impl fmt::Display for MigrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MigrationMode::LiveBefore => "LIVE_BEFORE",
            MigrationMode::Normal => "NORMAL",
            MigrationMode::LiveAfter => "LIVE_AFTER",
        })
    }
}

impl FromStr for MigrationMode {
    type Err = MigrationError;

    /// Accepts `LIVE_BEFORE` style names as well as the `live-before` CLI spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(&s.replace('_', "-"), true)
            .map_err(|_| MigrationError::msg(format!("unknown migration mode '{s}'")))
    }
}
