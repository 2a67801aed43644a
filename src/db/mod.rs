//! Database connector contract.
//!
//! The engine only needs a narrow view of a relational driver: run a SQL
//! string, run a prepared statement with positional values, and read the
//! result as column names plus rows of nullable byte values. Anything that
//! can provide this shape can back a report run.

mod sqlite;

pub use sqlite::SqliteConnector;

use thiserror::Error;

/// Errors reported by a connector.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("can't connect to database '{database}': {message}")]
    Connect { database: String, message: String },

    #[error("database is not connected")]
    NotConnected,

    #[error("prepared statement expects {expected} values, got {actual}")]
    BindCount { expected: usize, actual: usize },
}

pub type DbResult<T> = Result<T, DbError>;

/// A single column value; `None` is SQL NULL.
pub type Value = Option<Vec<u8>>;

/// One fetched row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Raw bytes of column `idx`; NULL and missing columns read as empty.
    pub fn value(&self, idx: usize) -> &[u8] {
        self.values
            .get(idx)
            .and_then(|v| v.as_deref())
            .unwrap_or_default()
    }

    pub fn is_null(&self, idx: usize) -> bool {
        !matches!(self.values.get(idx), Some(Some(_)))
    }

    /// True when every column is NULL.
    pub fn is_all_null(&self) -> bool {
        (0..self.values.len()).all(|i| self.is_null(i))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Column names and rows returned by a statement.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A statement prepared by the driver.
///
/// `parameters` lists the placeholder names in bind order, including their
/// marker (`:name`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared {
    pub sql: String,
    pub parameters: Vec<String>,
}

/// A single logical database connection used for one report run.
pub trait Connector {
    /// Open the connection.
    fn connect(&mut self) -> DbResult<()>;

    /// Close the connection. Closing a closed connection is a no-op.
    fn close(&mut self);

    /// Execute a literal SQL string.
    fn execute(&mut self, sql: &str) -> DbResult<ResultSet>;

    /// Prepare a statement containing named placeholders.
    fn prepare(&mut self, sql: &str) -> DbResult<Prepared>;

    /// Execute a prepared statement; `values` are bound positionally in the
    /// order of [`Prepared::parameters`].
    fn execute_prepared(&mut self, statement: &Prepared, values: &[Value]) -> DbResult<ResultSet>;

    /// Prefix for table names, exposed to templates as `${_tableprefix}`.
    fn table_prefix(&self) -> &str {
        ""
    }
}
