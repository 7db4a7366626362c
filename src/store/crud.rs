//! Row CRUD primitives on top of the fragment builders and the gateway.
//! Encapsulates primary-key protection: `id` is stripped from inserts and
//! relocated to the WHERE clause on update.

use super::Store;
use crate::error::Result;
use crate::query::{self, ColumnSpec, Limit, OrderSpec, Statement, WhereSpec};
use crate::schema::PRIMARY_KEY;
use crate::types::{Row, UpdateOutcome};
use serde_json::Value;

impl Store {
    /// Compose a SELECT for `table`; pure, storage untouched.
    pub fn select_stmt(
        &self,
        table: &str,
        cols: &ColumnSpec,
        wheres: &WhereSpec,
        orders: &OrderSpec,
        limit: Option<Limit>,
    ) -> Result<Statement> {
        let map = self.column_map(table)?;
        query::select(table, map, cols, wheres, orders, limit)
    }

    /// Insert rows, silently skipping any that violate a uniqueness
    /// constraint. Primary keys are stripped (never client-assigned), fields
    /// are restricted to declared columns, and the column set is taken from
    /// the first row. Returns how many rows were actually inserted.
    pub fn insert_ignore(&self, table: &str, rows: &[Row]) -> Result<usize> {
        match self.insert_ignore_sql(table, rows)? {
            Some((sql, param_rows)) => self.execute_batch_rows(&sql, &param_rows),
            None => Ok(0),
        }
    }

    /// Non-batched insert that reports the generated rowid, for callers that
    /// must thread a fresh id into a later value. `None` when the insert was
    /// ignored on conflict.
    pub fn insert_ignore_returning_id(&self, table: &str, row: &Row) -> Result<Option<i64>> {
        match self.insert_ignore_sql(table, std::slice::from_ref(row))? {
            Some((sql, param_rows)) => self.execute_returning_id(&sql, &param_rows[0]),
            None => Ok(None),
        }
    }

    fn insert_ignore_sql(
        &self,
        table: &str,
        rows: &[Row],
    ) -> Result<Option<(String, Vec<Vec<Value>>)>> {
        let schema = self.schema().table(table)?;
        let Some(first) = rows.first() else {
            return Ok(None);
        };
        let keys: Vec<&String> = first
            .keys()
            .filter(|k| k.as_str() != PRIMARY_KEY && schema.has_column(k))
            .collect();
        if keys.is_empty() {
            return Ok(None);
        }
        let marks = vec!["?"; keys.len()].join(", ");
        let cols = keys
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join("`, `");
        let sql = format!("INSERT OR IGNORE INTO `{table}` (`{cols}`) VALUES ({marks})");
        let param_rows = rows
            .iter()
            .map(|r| {
                keys.iter()
                    .map(|k| r.get(*k).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Ok(Some((sql, param_rows)))
    }

    /// DELETE with the same condition and limit grammar as `select_stmt`.
    /// A limited delete targets rowids through a subselect; stock SQLite
    /// does not parse `DELETE ... LIMIT` directly.
    pub fn delete_where(
        &self,
        table: &str,
        wheres: &WhereSpec,
        limit: Option<Limit>,
    ) -> Result<usize> {
        self.schema().table(table)?;
        let (w, params) = query::where_clause(wheres)?;
        let sql = match limit {
            None => format!("DELETE FROM `{table}`{w};"),
            Some(l) => {
                let l = query::limit_clause(Some(l));
                format!(
                    "DELETE FROM `{table}` WHERE rowid IN \
                     (SELECT rowid FROM `{table}`{w}{l});"
                )
            }
        };
        self.execute(&sql, &params)
    }

    /// UPDATE one logical row. A primary key present in `sets` is moved into
    /// the WHERE clause — identity columns are update-immutable. Undeclared
    /// columns are dropped; an empty residual payload issues no SQL and
    /// reports [`UpdateOutcome::NoFields`].
    pub fn update_one(
        &self,
        table: &str,
        sets: &Row,
        wheres: &WhereSpec,
    ) -> Result<UpdateOutcome> {
        let schema = self.schema().table(table)?;
        let mut wheres = wheres.clone();
        let mut assoc = Row::new();
        for (k, v) in sets {
            if k == PRIMARY_KEY {
                wheres = wheres.eq(k.clone(), v.clone());
                continue;
            }
            if schema.has_column(k) {
                assoc.insert(k.clone(), v.clone());
            }
        }
        let Some((set_sql, mut params)) = query::set_clause(&assoc)? else {
            return Ok(UpdateOutcome::NoFields);
        };
        let (w, where_params) = query::where_clause(&wheres)?;
        params.extend(where_params);
        let n = self.execute(&format!("UPDATE `{table}` SET {set_sql}{w}"), &params)?;
        Ok(UpdateOutcome::Applied(n))
    }

    /// SELECT with `LIMIT 1`, decoded into a row object. An empty row means
    /// nothing matched; that is the only "not found" signal.
    pub fn get_one(
        &self,
        table: &str,
        cols: &ColumnSpec,
        wheres: &WhereSpec,
        orders: &OrderSpec,
    ) -> Result<Row> {
        let stmt = self.select_stmt(table, cols, wheres, orders, Some(Limit::Count(1)))?;
        let mut rows = self.query(&stmt)?;
        Ok(rows.pop().unwrap_or_default())
    }

    /// Every row of `table`, decoded. The full-reload scan.
    pub fn rows(&self, table: &str) -> Result<Vec<Row>> {
        let stmt = self.select_stmt(
            table,
            &ColumnSpec::All,
            &WhereSpec::new(),
            &OrderSpec::new(),
            None,
        )?;
        self.query(&stmt)
    }
}
