use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SqlAccessError, SqlFault};
use crate::source::ConnectionSource;

fn default_true() -> bool {
    true
}

/// Options for opening `SQLite` connections.
///
/// Deserializes from JSON with only `db_path` required:
/// ```rust
/// use sql_access::prelude::*;
///
/// let opts: SqliteOptions = serde_json::from_str(r#"{"db_path": "app.db", "wal": true}"#).unwrap();
/// assert!(opts.create_if_missing);
/// assert!(opts.wal);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteOptions {
    pub db_path: String,
    #[serde(default = "default_true")]
    pub create_if_missing: bool,
    /// How long a connection waits on a locked database before failing, in milliseconds.
    #[serde(default)]
    pub busy_timeout_ms: Option<u64>,
    /// Switch the database to write-ahead logging when a connection opens.
    #[serde(default)]
    pub wal: bool,
    #[serde(default = "default_true")]
    pub foreign_keys: bool,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            create_if_missing: true,
            busy_timeout_ms: None,
            wal: false,
            foreign_keys: true,
        }
    }

    #[must_use]
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    #[must_use]
    pub fn with_wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }

    fn open_flags(&self) -> OpenFlags {
        let mut flags =
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if self.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        flags
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn create_if_missing(mut self, create_if_missing: bool) -> Self {
        self.opts.create_if_missing = create_if_missing;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts = self.opts.with_busy_timeout(timeout);
        self
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn foreign_keys(mut self, foreign_keys: bool) -> Self {
        self.opts.foreign_keys = foreign_keys;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Build a [`SqliteSource`], opening one connection as a smoke test.
    ///
    /// # Errors
    ///
    /// Returns [`SqlAccessError`] if the database cannot be opened or configured.
    pub fn build(self) -> Result<SqliteSource, SqlAccessError> {
        SqliteSource::open(self.finish())
    }
}

/// Connection source opening a new `SQLite` connection per unit of work.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    options: SqliteOptions,
}

impl SqliteSource {
    /// Wrap options without touching the database.
    #[must_use]
    pub fn new(options: SqliteOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn builder(db_path: impl Into<String>) -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new(db_path)
    }

    /// Wrap options after checking that a connection can be opened with them.
    ///
    /// # Errors
    /// Returns [`SqlAccessError`] if opening or configuring the test connection fails.
    pub fn open(options: SqliteOptions) -> Result<Self, SqlAccessError> {
        let source = Self::new(options);
        let conn = source.connection()?;
        conn.close()
            .map_err(|(_, e)| SqlFault::new("Error closing SQLite test connection", e))?;
        Ok(source)
    }

    #[must_use]
    pub fn options(&self) -> &SqliteOptions {
        &self.options
    }

    fn configure(&self, conn: &Connection) -> rusqlite::Result<()> {
        if let Some(ms) = self.options.busy_timeout_ms {
            conn.busy_timeout(Duration::from_millis(ms))?;
        }
        conn.pragma_update(None, "foreign_keys", self.options.foreign_keys)?;
        if self.options.wal {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            debug!(db_path = %self.options.db_path, journal_mode = %mode, "set SQLite journal mode");
        }
        Ok(())
    }
}

impl ConnectionSource for SqliteSource {
    fn connection(&self) -> Result<Connection, SqlAccessError> {
        let conn = Connection::open_with_flags(&self.options.db_path, self.options.open_flags())
            .map_err(|e| {
                SqlFault::new(
                    format!("Error opening SQLite database '{}'", self.options.db_path),
                    e,
                )
            })?;
        self.configure(&conn)
            .map_err(|e| SqlFault::new("Error configuring SQLite connection", e))?;
        Ok(conn)
    }
}
