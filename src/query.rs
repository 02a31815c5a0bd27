use crate::params::SqlParam;

/// A SQL string and its positional parameters bundled together.
///
/// Fragments can be appended while a statement is assembled, keeping the
/// parameter list aligned with the `?` placeholders in the text:
/// ```rust
/// use sql_access::prelude::*;
///
/// let mut query = SqlQuery::new("SELECT ID FROM USERS WHERE 1 = 1");
/// query.append(" AND NAME = ?", ["alice"]);
/// query.append(" AND AGE > ?", [30_i64]);
/// assert_eq!(query.sql(), "SELECT ID FROM USERS WHERE 1 = 1 AND NAME = ? AND AGE > ?");
/// assert_eq!(query.params().len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SqlQuery {
    sql: String,
    params: Vec<SqlParam>,
}

impl SqlQuery {
    /// Create a query with no parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Create a query with an initial parameter list.
    pub fn with_params<I, P>(sql: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<SqlParam>,
    {
        Self {
            sql: sql.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Append a text fragment and the parameters its placeholders consume.
    pub fn append<I, P>(&mut self, part: &str, params: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<SqlParam>,
    {
        self.sql.push_str(part);
        self.params.extend(params.into_iter().map(Into::into));
        self
    }

    /// Append a text fragment without parameters.
    pub fn push_sql(&mut self, part: &str) -> &mut Self {
        self.sql.push_str(part);
        self
    }

    /// Append a single parameter.
    pub fn param(&mut self, param: impl Into<SqlParam>) -> &mut Self {
        self.params.push(param.into());
        self
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }

    #[must_use]
    pub fn into_parts(self) -> (String, Vec<SqlParam>) {
        (self.sql, self.params)
    }
}

impl From<&str> for SqlQuery {
    fn from(sql: &str) -> Self {
        SqlQuery::new(sql)
    }
}

impl From<String> for SqlQuery {
    fn from(sql: String) -> Self {
        SqlQuery::new(sql)
    }
}
