//! Storage engine: connection gateway, table bootstrap, CRUD, mirrored index.

pub mod crud;
pub mod mirror;

pub use mirror::{Candidate, MirrorStore};

use crate::error::Result;
use crate::query::Statement;
use crate::schema::Schema;
use crate::types::{Row, decode_field};
use log::{debug, warn};
use rusqlite::Connection;
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Single-file table store. Opens a fresh connection per gateway call and
/// owns all direct I/O with the backing file; everything above it works on
/// fragments and decoded rows.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    schema: Schema,
    column_maps: HashMap<String, HashMap<String, usize>>,
}

impl Store {
    /// Open or create the backing file. A zero-length file is the bootstrap
    /// signal: the declared tables are created and WAL is enabled. Opening an
    /// already-populated file changes nothing.
    pub fn open(path: impl Into<PathBuf>, schema: Schema) -> Result<Store> {
        let path = path.into();
        let conn = Connection::open(&path)?;
        let column_maps = schema
            .tables()
            .iter()
            .map(|t| (t.name.clone(), t.column_index_map()))
            .collect();
        let store = Store {
            path,
            schema,
            column_maps,
        };
        if std::fs::metadata(&store.path)?.len() == 0 {
            store.bootstrap(&conn)?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn column_map(&self, table: &str) -> Result<&HashMap<String, usize>> {
        self.column_maps
            .get(table)
            .ok_or_else(|| crate::error::StoreError::UnknownTable(table.to_string()))
    }

    /// Emit `CREATE TABLE IF NOT EXISTS` for every declared table and apply
    /// the WAL pragmas. Idempotent.
    fn bootstrap(&self, conn: &Connection) -> Result<()> {
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.execute_batch(
            r#"
            PRAGMA synchronous = NORMAL;
            PRAGMA journal_size_limit = 67108864;
            "#,
        )?;
        for table in self.schema.tables() {
            let sql = table.create_table_sql();
            debug!("{sql}");
            conn.execute_batch(&sql)?;
        }
        Ok(())
    }

    /// Fresh connection for one gateway call. Dropped (and therefore closed)
    /// when the calling scope ends, on every exit path.
    fn connect(&self) -> Result<Connection> {
        Ok(Connection::open(&self.path)?)
    }

    /// Execute one statement; returns rows changed.
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        let conn = self.connect()?;
        debug!("{sql}");
        let n = conn.execute(sql, rusqlite::params_from_iter(params.iter().map(bind)))?;
        Ok(n)
    }

    /// Execute one prepared statement for every parameter row, inside a
    /// single transaction; returns total rows changed.
    pub fn execute_batch_rows(&self, sql: &str, param_rows: &[Vec<Value>]) -> Result<usize> {
        let mut conn = self.connect()?;
        debug!("{sql} ({} rows)", param_rows.len());
        let tx = conn.transaction()?;
        let mut changed = 0;
        {
            let mut stmt = tx.prepare(sql)?;
            for row in param_rows {
                changed += stmt.execute(rusqlite::params_from_iter(row.iter().map(bind)))?;
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    /// Execute one statement and report the generated rowid, `None` when the
    /// statement changed nothing (e.g. an ignored insert).
    pub(crate) fn execute_returning_id(&self, sql: &str, params: &[Value]) -> Result<Option<i64>> {
        let conn = self.connect()?;
        debug!("{sql}");
        let n = conn.execute(sql, rusqlite::params_from_iter(params.iter().map(bind)))?;
        Ok((n > 0).then(|| conn.last_insert_rowid()))
    }

    /// Run a select and decode every result row through its index map.
    /// The cursor is scoped to this call; no open handle escapes.
    pub fn query(&self, stmt: &Statement) -> Result<Vec<Row>> {
        let conn = self.connect()?;
        debug!("{}", stmt.sql);
        let mut prepared = conn.prepare(&stmt.sql)?;
        let mut rows = prepared.query(rusqlite::params_from_iter(stmt.params.iter().map(bind)))?;
        let mut out = Vec::new();
        while let Some(r) = rows.next()? {
            out.push(decode_row(r, &stmt.indices)?);
        }
        Ok(out)
    }
}

/// Bind a JSON value as a SQL parameter. Objects and arrays persist as JSON
/// text; bools as 0/1.
pub(crate) fn bind(v: &Value) -> ToSqlOutput<'_> {
    match v {
        Value::Null => ToSqlOutput::Owned(SqlValue::Null),
        Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(*b as i64)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => ToSqlOutput::Owned(SqlValue::Integer(i)),
            None => ToSqlOutput::Owned(SqlValue::Real(n.as_f64().unwrap_or(0.0))),
        },
        Value::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        other => ToSqlOutput::Owned(SqlValue::Text(other.to_string())),
    }
}

/// Decode one positional result row into a named map, JSON-sniffing text
/// fields on the way in.
fn decode_row(r: &rusqlite::Row<'_>, indices: &HashMap<String, usize>) -> Result<Row> {
    let mut out = Row::new();
    for (name, idx) in indices {
        let v: SqlValue = r.get(*idx)?;
        let json = match v {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(i) => Value::from(i),
            SqlValue::Real(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            SqlValue::Text(s) => decode_field(Value::String(s)),
            SqlValue::Blob(_) => {
                warn!("column `{name}` holds a blob; no JSON mapping, decoding as null");
                Value::Null
            }
        };
        out.insert(name.clone(), json);
    }
    Ok(out)
}
