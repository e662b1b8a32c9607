//! Statement execution with logging.
//!
//! Every statement the store issues goes through the helpers in this module,
//! which log the statement with a timestamp and its parameters before running
//! it. Parameters marked [`SqlParam::Secret`] are never written to the log.

use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, ToSql, TransactionBehavior, params_from_iter};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(i64),
    Real(f64),
    Text(String),
    Bool(bool),
    /// Bound like `Text` but rendered as `[redacted]` in logs.
    Secret(String),
    Null,
}

impl fmt::Display for SqlParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlParam::Int(v) => write!(f, "{v}"),
            SqlParam::Real(v) => write!(f, "{v}"),
            SqlParam::Text(v) => write!(f, "{v:?}"),
            SqlParam::Bool(v) => write!(f, "{v}"),
            SqlParam::Secret(_) => f.write_str("[redacted]"),
            SqlParam::Null => f.write_str("NULL"),
        }
    }
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            SqlParam::Int(v) => v.to_sql(),
            SqlParam::Real(v) => v.to_sql(),
            SqlParam::Text(v) | SqlParam::Secret(v) => v.to_sql(),
            SqlParam::Bool(v) => v.to_sql(),
            SqlParam::Null => Ok(ToSqlOutput::Owned(SqlValue::Null)),
        }
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::Int(v)
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        SqlParam::Bool(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

impl From<Option<String>> for SqlParam {
    fn from(v: Option<String>) -> Self {
        v.map_or(SqlParam::Null, SqlParam::Text)
    }
}

/// A row keyed by column name.
pub type Record = Map<String, Value>;

#[derive(Debug, Default)]
pub struct QueryResult {
    pub rows: Vec<Record>,
    /// Rows returned for queries, rows changed for everything else.
    pub row_count: usize,
}

fn render_params(params: &[SqlParam]) -> String {
    let rendered: Vec<String> = params.iter().map(ToString::to_string).collect();
    format!("[{}]", rendered.join(", "))
}

fn log_statement(statement: &str, params: &[SqlParam]) {
    let statement = statement.split_whitespace().collect::<Vec<_>>().join(" ");
    tracing::debug!(
        at = %Utc::now().to_rfc3339(),
        params = %render_params(params),
        "{statement}"
    );
}

fn map_db_error(statement: &str, err: rusqlite::Error) -> Error {
    tracing::error!("Error executing query `{}`: {err}", statement.trim());
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            Error::AlreadyExists
        }
        _ => Error::Database(err),
    }
}

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(hex::encode(bytes)),
    }
}

/// Executes a statement and returns its rows (if it produces any) plus the
/// row count.
pub fn execute(conn: &Connection, statement: &str, params: &[SqlParam]) -> Result<QueryResult> {
    log_statement(statement, params);

    let run = || -> rusqlite::Result<QueryResult> {
        let mut stmt = conn.prepare(statement)?;

        if stmt.column_count() == 0 {
            let changed = stmt.execute(params_from_iter(params.iter()))?;
            return Ok(QueryResult {
                rows: Vec::new(),
                row_count: changed,
            });
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Record::new();
            for (idx, column) in columns.iter().enumerate() {
                record.insert(column.clone(), value_to_json(row.get_ref(idx)?));
            }
            records.push(record);
        }

        Ok(QueryResult {
            row_count: records.len(),
            rows: records,
        })
    };

    run().map_err(|e| map_db_error(statement, e))
}

/// Runs a query and maps every row.
pub fn query_map<T, F>(
    conn: &Connection,
    statement: &str,
    params: &[SqlParam],
    f: F,
) -> Result<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    log_statement(statement, params);

    let run = || -> rusqlite::Result<Vec<T>> {
        let mut stmt = conn.prepare(statement)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), f)?;
        rows.collect()
    };

    run().map_err(|e| map_db_error(statement, e))
}

/// Runs a query expected to produce at most one row.
pub fn query_opt<T, F>(
    conn: &Connection,
    statement: &str,
    params: &[SqlParam],
    f: F,
) -> Result<Option<T>>
where
    F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
{
    log_statement(statement, params);

    conn.query_row(statement, params_from_iter(params.iter()), f)
        .optional()
        .map_err(|e| map_db_error(statement, e))
}

/// Runs a query that always produces exactly one row (aggregates).
pub fn query_one<T, F>(conn: &Connection, statement: &str, params: &[SqlParam], f: F) -> Result<T>
where
    F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
{
    log_statement(statement, params);

    conn.query_row(statement, params_from_iter(params.iter()), f)
        .map_err(|e| map_db_error(statement, e))
}

/// Owns the database connection and hands it out for single statements or
/// whole transactions.
pub struct QueryExecutor {
    conn: Mutex<Connection>,
}

impl QueryExecutor {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Returns a guard to the underlying connection.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn execute(&self, statement: &str, params: &[SqlParam]) -> Result<QueryResult> {
        execute(&self.conn(), statement, params)
    }

    /// Runs `f` inside an immediate transaction. The transaction commits when
    /// `f` returns `Ok` and rolls back otherwise.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tracing::debug!("BEGIN");

        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                tracing::debug!("COMMIT");
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::warn!("Failed to roll back transaction: {rollback_err}");
                } else {
                    tracing::debug!("ROLLBACK");
                }
                Err(e)
            }
        }
    }
}
