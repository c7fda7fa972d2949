//! Access to the relational mirror of the Cloud Foundry database.
//!
//! Filter values are always bound as `?` parameters, never spliced into the
//! SQL text.
use crate::metrics_defs::ROW_SHAPE_MISMATCH;
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde_json::{Map, Value};
use shared::counter;
use std::path::Path;
use std::sync::Arc;

pub type Row = Vec<Value>;
pub type Record = Map<String, Value>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("query worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Runs `sql` with `params` bound positionally and returns every row.
    async fn query(&self, sql: &str, params: &[String]) -> Result<Vec<Row>, StoreError>;
}

/// Zips a row with its column names. A row of the wrong width becomes an
/// empty record.
pub fn row_to_record(row: &[Value], columns: &[&str]) -> Record {
    if row.len() != columns.len() {
        tracing::warn!(
            items = row.len(),
            expected = columns.len(),
            "Query row width does not match the column list"
        );
        counter!(ROW_SHAPE_MISMATCH).increment(1);
        return Record::new();
    }

    columns
        .iter()
        .map(|column| column.to_string())
        .zip(row.iter().cloned())
        .collect()
}

/// SQLite-backed store. One connection, queries run on the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens an existing database read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path.as_ref(), flags)?;
        tracing::debug!(path = %path.as_ref().display(), "Opened database");
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs a batch of statements, used to load schemas and fixtures into
    /// in-memory databases.
    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

#[async_trait]
impl RelationalStore for SqliteStore {
    async fn query(&self, sql: &str, params: &[String]) -> Result<Vec<Row>, StoreError> {
        tracing::debug!(%sql, params = params.len(), "Run SQL query");
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let params = params.to_vec();

        tokio::task::spawn_blocking(move || -> Result<Vec<Row>, StoreError> {
            let conn = conn.lock();
            let mut stmt = conn.prepare(&sql).inspect_err(|err| {
                tracing::warn!(error = %err, %sql, "SQL query failed");
            })?;
            let width = stmt.column_count();
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                    (0..width)
                        .map(|i| row.get_ref(i).map(to_json))
                        .collect::<rusqlite::Result<Row>>()
                })?
                .collect::<rusqlite::Result<Vec<Row>>>()?;
            Ok(rows)
        })
        .await?
    }
}
