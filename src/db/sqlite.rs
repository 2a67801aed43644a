//! SQLite connector backed by `rusqlite`.

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

use super::{Connector, DbError, DbResult, Prepared, ResultSet, Row, Value};

/// Connector for a SQLite database file or an in-memory database.
pub struct SqliteConnector {
    database: String,
    table_prefix: String,
    read_only: bool,
    init_sql: Option<String>,
    conn: Option<Connection>,
}

impl SqliteConnector {
    /// Create a connector for a database file. The file must exist.
    ///
    /// An empty path or `:memory:` opens a fresh in-memory database.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table_prefix: String::new(),
            read_only: false,
            init_sql: None,
            conn: None,
        }
    }

    /// Create a connector for a fresh in-memory database.
    pub fn in_memory() -> Self {
        Self::new(":memory:")
    }

    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Statements executed once right after the connection is opened.
    pub fn with_init_sql(mut self, sql: impl Into<String>) -> Self {
        self.init_sql = Some(sql.into());
        self
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Execute one or more statements without returning rows.
    pub fn execute_batch(&mut self, sql: &str) -> DbResult<()> {
        self.connection()?.execute_batch(sql)?;
        Ok(())
    }

    fn connection(&self) -> DbResult<&Connection> {
        self.conn.as_ref().ok_or(DbError::NotConnected)
    }

    fn open(&self) -> rusqlite::Result<Connection> {
        if self.database.is_empty() || self.database == ":memory:" {
            return Connection::open_in_memory();
        }
        let access = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };
        Connection::open_with_flags(
            &self.database,
            access | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }
}

impl Connector for SqliteConnector {
    fn connect(&mut self) -> DbResult<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        let conn = self.open().map_err(|e| DbError::Connect {
            database: self.database.clone(),
            message: e.to_string(),
        })?;
        if let Some(sql) = &self.init_sql {
            conn.execute_batch(sql)?;
        }
        log::debug!("connected to sqlite database '{}'", self.database);
        self.conn = Some(conn);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, e)) = conn.close() {
                log::warn!("closing sqlite database '{}': {}", self.database, e);
            }
        }
    }

    fn execute(&mut self, sql: &str) -> DbResult<ResultSet> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt.query([])?;
        collect_rows(columns, rows)
    }

    fn prepare(&mut self, sql: &str) -> DbResult<Prepared> {
        let conn = self.connection()?;
        let stmt = conn.prepare_cached(sql)?;
        let parameters = (1..=stmt.parameter_count())
            .map(|i| {
                stmt.parameter_name(i)
                    .map(String::from)
                    .unwrap_or_else(|| format!("?{}", i))
            })
            .collect();
        Ok(Prepared {
            sql: sql.to_string(),
            parameters,
        })
    }

    fn execute_prepared(&mut self, statement: &Prepared, values: &[Value]) -> DbResult<ResultSet> {
        if values.len() != statement.parameters.len() {
            return Err(DbError::BindCount {
                expected: statement.parameters.len(),
                actual: values.len(),
            });
        }
        let conn = self.connection()?;
        let mut stmt = conn.prepare_cached(&statement.sql)?;
        for (idx, value) in values.iter().enumerate() {
            let text = value
                .as_deref()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned());
            stmt.raw_bind_parameter(idx + 1, text)?;
        }
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt.raw_query();
        collect_rows(columns, rows)
    }

    fn table_prefix(&self) -> &str {
        &self.table_prefix
    }
}

impl Drop for SqliteConnector {
    fn drop(&mut self) {
        self.close();
    }
}

fn collect_rows(columns: Vec<String>, mut rows: rusqlite::Rows<'_>) -> DbResult<ResultSet> {
    let count = columns.len();
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(count);
        for idx in 0..count {
            values.push(to_bytes(row.get_ref(idx)?));
        }
        out.push(Row::new(values));
    }
    Ok(ResultSet::new(columns, out))
}

fn to_bytes(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string().into_bytes()),
        ValueRef::Real(f) => Some(f.to_string().into_bytes()),
        ValueRef::Text(t) => Some(t.to_vec()),
        ValueRef::Blob(b) => Some(b.to_vec()),
    }
}
