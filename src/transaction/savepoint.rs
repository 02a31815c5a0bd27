use std::sync::LazyLock;

use regex::Regex;
use rusqlite::Connection;
use tracing::{debug, warn};

use crate::error::{SqlAccessError, SqlFault};

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("savepoint identifier pattern is valid")
});

/// Reject names that would need quoting inside a `SAVEPOINT` statement.
pub(crate) fn validate_identifier(name: &str) -> Result<(), SqlAccessError> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(SqlAccessError::InvalidIdentifier(name.to_owned()))
    }
}

/// Named rollback point inside a [`super::SqlTransaction`].
///
/// Rolling back to a savepoint keeps it in place, so it can be rolled back to
/// again. Once released it cannot be used. A savepoint dropped without being
/// released is released then.
#[derive(Debug)]
pub struct SqlSavepoint<'tx> {
    conn: &'tx Connection,
    name: String,
    released: bool,
}

impl<'tx> SqlSavepoint<'tx> {
    pub(super) fn create(conn: &'tx Connection, name: &str) -> Result<Self, SqlAccessError> {
        validate_identifier(name)?;
        conn.execute_batch(&format!("SAVEPOINT {name}"))
            .map_err(|e| SqlFault::new("Error creating SQL savepoint", e))?;
        debug!(savepoint = name, "created SQL savepoint");
        Ok(Self {
            conn,
            name: name.to_owned(),
            released: false,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Undo every change made since the savepoint was set.
    ///
    /// # Errors
    /// [`SqlAccessError::SavepointReleased`] after [`SqlSavepoint::release`]; a fault
    /// if the driver rejects the rollback.
    pub fn rollback(&self) -> Result<(), SqlAccessError> {
        self.ensure_open()?;
        self.conn
            .execute_batch(&format!("ROLLBACK TO SAVEPOINT {}", self.name))
            .map_err(|e| SqlFault::new("Error rolling back SQL savepoint", e))?;
        debug!(savepoint = %self.name, "rolled back to SQL savepoint");
        Ok(())
    }

    /// Forget the savepoint, keeping its changes in the enclosing transaction.
    ///
    /// # Errors
    /// [`SqlAccessError::SavepointReleased`] when called twice; a fault if the driver
    /// rejects the release.
    pub fn release(&mut self) -> Result<(), SqlAccessError> {
        self.ensure_open()?;
        self.conn
            .execute_batch(&format!("RELEASE SAVEPOINT {}", self.name))
            .map_err(|e| SqlFault::new("Error releasing SQL savepoint", e))?;
        self.released = true;
        debug!(savepoint = %self.name, "released SQL savepoint");
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), SqlAccessError> {
        if self.released {
            Err(SqlAccessError::SavepointReleased(self.name.clone()))
        } else {
            Ok(())
        }
    }
}

impl Drop for SqlSavepoint<'_> {
    fn drop(&mut self) {
        if !self.released
            && let Err(err) = self.release()
        {
            warn!(savepoint = %self.name, error = %err, "failed to release SQL savepoint");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(validate_identifier("before_insert").is_ok());
        assert!(validate_identifier("_sp1").is_ok());
        assert!(validate_identifier("Sp_2024").is_ok());
        for bad in ["", "1st", "sp-1", "sp 1", "sp;DROP TABLE T", "sp\n"] {
            assert!(
                matches!(
                    validate_identifier(bad),
                    Err(SqlAccessError::InvalidIdentifier(_))
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn released_savepoint_is_unusable() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("BEGIN").unwrap();
        let mut sp = SqlSavepoint::create(&conn, "sp").unwrap();
        sp.rollback().unwrap();
        sp.rollback().unwrap();
        sp.release().unwrap();
        assert!(sp.is_released());
        assert!(matches!(
            sp.rollback(),
            Err(SqlAccessError::SavepointReleased(name)) if name == "sp"
        ));
        assert!(sp.release().is_err());
    }
}
