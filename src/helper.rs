use rusqlite::Connection;

use crate::error::SqlAccessError;
use crate::query::SqlQuery;
use crate::record::SqlRecord;
use crate::runner::SqlRunner;

/// Schema checks that let migration steps guard themselves.
///
/// Table and column names are matched case-insensitively, as `SQLite` resolves them.
#[derive(Debug, Clone, Copy)]
pub struct SqlHelper<'conn> {
    runner: SqlRunner<'conn>,
}

impl<'conn> SqlHelper<'conn> {
    #[must_use]
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            runner: SqlRunner::new(conn),
        }
    }

    /// # Errors
    /// Returns a fault if the schema cannot be read.
    pub fn table_exists(&self, table: &str) -> Result<bool, SqlAccessError> {
        self.runner
            .count(&SqlQuery::with_params(
                "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') \
                 AND name = ? COLLATE NOCASE",
                [table],
            ))
            .map(|n| n > 0)
    }

    /// # Errors
    /// Returns a fault if the schema cannot be read.
    pub fn column_exists(&self, table: &str, column: &str) -> Result<bool, SqlAccessError> {
        self.runner
            .count(&SqlQuery::with_params(
                "SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ? COLLATE NOCASE",
                [table, column],
            ))
            .map(|n| n > 0)
    }

    /// # Errors
    /// Returns a fault if the schema cannot be read.
    pub fn index_exists(&self, index: &str) -> Result<bool, SqlAccessError> {
        self.runner
            .count(&SqlQuery::with_params(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' \
                 AND name = ? COLLATE NOCASE",
                [index],
            ))
            .map(|n| n > 0)
    }

    /// User tables in name order, without `SQLite`'s internal tables.
    ///
    /// # Errors
    /// Returns a fault if the schema cannot be read.
    pub fn table_names(&self) -> Result<Vec<String>, SqlAccessError> {
        let names = self.runner.query(
            &|r: &SqlRecord<'_>| r.get_string("name"),
            &SqlQuery::new(
                "SELECT name FROM sqlite_master WHERE type = 'table' \
                 AND name NOT LIKE 'sqlite_%' ORDER BY name",
            ),
        )?;
        Ok(names.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_checks() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE USERS (ID INTEGER PRIMARY KEY, NAME TEXT);
             CREATE INDEX IDX_USERS_NAME ON USERS (NAME);
             CREATE TABLE ACCOUNTS (ID INTEGER);",
        )
        .unwrap();
        let helper = SqlHelper::new(&conn);

        assert!(helper.table_exists("users").unwrap());
        assert!(!helper.table_exists("GROUPS").unwrap());
        assert!(helper.column_exists("USERS", "name").unwrap());
        assert!(!helper.column_exists("USERS", "EMAIL").unwrap());
        assert!(!helper.column_exists("GROUPS", "ID").unwrap());
        assert!(helper.index_exists("IDX_USERS_NAME").unwrap());
        assert_eq!(helper.table_names().unwrap(), vec!["ACCOUNTS", "USERS"]);
    }
}
