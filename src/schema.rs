//! Table declarations: columns, uniqueness constraints, natural keys.
//! Validated once at startup, immutable afterwards.

use crate::error::{Result, StoreError};
use crate::query::is_identifier;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Auto-assigned identity column. Present in every table, never
/// client-settable, immune to update.
pub const PRIMARY_KEY: &str = "id";

/// SQLite storage class of a declared column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StorageType {
    Integer,
    Real,
    Text,
}

impl StorageType {
    pub fn sql(&self) -> &'static str {
        match self {
            StorageType::Integer => "INTEGER",
            StorageType::Real => "REAL",
            StorageType::Text => "TEXT",
        }
    }
}

/// Nullability policy of a declared column.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ColumnPolicy {
    /// `NOT NULL`, caller must always supply a value.
    Required,
    /// `DEFAULT <literal>`. `CURRENT_TIMESTAMP` / `CURRENT_DATE` /
    /// `CURRENT_TIME` strings render unquoted.
    Default(Value),
    /// No constraint.
    #[default]
    Loose,
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub storage: StorageType,
    pub policy: ColumnPolicy,
}

/// Named uniqueness group over one or more columns.
#[derive(Debug, Clone)]
pub struct UniqueConstraint {
    pub name: String,
    pub columns: Vec<String>,
}

/// Whether a natural key maps to one row or to an ordered group of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Scalar,
    List,
}

/// How mirror entries of a table are keyed: the first column names the key,
/// the full column set forms the WHERE clause on update.
#[derive(Debug, Clone)]
pub struct KeySpec {
    pub columns: Vec<String>,
    pub kind: KeyKind,
}

/// Declaration of one table. Build with the chained methods, then hand a set
/// of tables to [`Schema::new`] for validation.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub constraints: Vec<UniqueConstraint>,
    key: Option<KeySpec>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        TableSchema {
            name: name.into(),
            columns: Vec::new(),
            constraints: Vec::new(),
            key: None,
        }
    }

    pub fn column(
        mut self,
        name: impl Into<String>,
        storage: StorageType,
        policy: ColumnPolicy,
    ) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            storage,
            policy,
        });
        self
    }

    pub fn unique<I, S>(mut self, name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraints.push(UniqueConstraint {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Override the natural key instead of deriving it from the first
    /// uniqueness constraint.
    pub fn key<I, S>(mut self, columns: I, kind: KeyKind) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key = Some(KeySpec {
            columns: columns.into_iter().map(Into::into).collect(),
            kind,
        });
        self
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Natural key, resolved by [`Schema::new`]. `None` only on an
    /// unvalidated declaration.
    pub fn natural_key(&self) -> Option<&KeySpec> {
        self.key.as_ref()
    }

    /// Column → position over `[id] + declared columns`, matching the
    /// physical column order of the bootstrapped table.
    pub fn column_index_map(&self) -> HashMap<String, usize> {
        std::iter::once(PRIMARY_KEY.to_string())
            .chain(self.columns.iter().map(|c| c.name.clone()))
            .enumerate()
            .map(|(i, n)| (n, i))
            .collect()
    }

    /// Bootstrap DDL for this table. `IF NOT EXISTS` keeps re-issue a no-op
    /// against a populated file.
    pub fn create_table_sql(&self) -> String {
        let mut cols = format!("`{PRIMARY_KEY}` INTEGER PRIMARY KEY");
        for c in &self.columns {
            let suffix = match &c.policy {
                ColumnPolicy::Required => " NOT NULL".to_string(),
                ColumnPolicy::Default(v) => format!(" DEFAULT {}", default_literal(v)),
                ColumnPolicy::Loose => String::new(),
            };
            cols.push_str(&format!(",`{}` {}{}", c.name, c.storage.sql(), suffix));
        }
        for u in &self.constraints {
            cols.push_str(&format!(
                ",CONSTRAINT `{}` UNIQUE (`{}`)",
                u.name,
                u.columns.join("`,`")
            ));
        }
        format!("CREATE TABLE IF NOT EXISTS `{}` ({});", self.name, cols)
    }

    fn validate(&mut self) -> Result<()> {
        let fail = |msg: String| Err(StoreError::InvalidSchema(msg));

        if !is_identifier(&self.name) {
            return Err(StoreError::InvalidIdentifier(self.name.clone()));
        }
        let mut seen = HashSet::new();
        for c in &self.columns {
            if !is_identifier(&c.name) {
                return Err(StoreError::InvalidIdentifier(c.name.clone()));
            }
            if c.name == PRIMARY_KEY {
                return fail(format!(
                    "table `{}` declares reserved column `{PRIMARY_KEY}`",
                    self.name
                ));
            }
            if !seen.insert(c.name.as_str()) {
                return fail(format!(
                    "table `{}` declares column `{}` twice",
                    self.name, c.name
                ));
            }
        }
        for u in &self.constraints {
            if !is_identifier(&u.name) {
                return Err(StoreError::InvalidIdentifier(u.name.clone()));
            }
            if u.columns.is_empty() {
                return fail(format!(
                    "constraint `{}` on `{}` names no columns",
                    u.name, self.name
                ));
            }
            for col in &u.columns {
                if !self.has_column(col) {
                    return Err(StoreError::UnknownColumn {
                        table: self.name.clone(),
                        column: col.clone(),
                    });
                }
            }
        }

        // Resolve the natural key: explicit override wins, else the first
        // column of the first declared constraint, scalar.
        match &self.key {
            Some(spec) => {
                if spec.columns.is_empty() {
                    return fail(format!("table `{}` key override names no columns", self.name));
                }
                for col in &spec.columns {
                    if !self.has_column(col) {
                        return Err(StoreError::UnknownColumn {
                            table: self.name.clone(),
                            column: col.clone(),
                        });
                    }
                }
            }
            None => match self.constraints.first() {
                Some(u) => {
                    self.key = Some(KeySpec {
                        columns: vec![u.columns[0].clone()],
                        kind: KeyKind::Scalar,
                    });
                }
                None => {
                    return fail(format!(
                        "table `{}` has no uniqueness constraint and no key override",
                        self.name
                    ));
                }
            },
        }
        Ok(())
    }
}

/// The full table set of one store. Built and validated once at startup.
#[derive(Debug, Clone)]
pub struct Schema {
    tables: Vec<TableSchema>,
    by_name: HashMap<String, usize>,
}

impl Schema {
    pub fn new(tables: Vec<TableSchema>) -> Result<Schema> {
        let mut tables = tables;
        let mut by_name = HashMap::new();
        for (i, t) in tables.iter_mut().enumerate() {
            t.validate()?;
            if by_name.insert(t.name.clone(), i).is_some() {
                return Err(StoreError::InvalidSchema(format!(
                    "table `{}` declared twice",
                    t.name
                )));
            }
        }
        Ok(Schema { tables, by_name })
    }

    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.by_name.get(name).map(|&i| &self.tables[i])
    }

    pub fn table(&self, name: &str) -> Result<&TableSchema> {
        self.get(name)
            .ok_or_else(|| StoreError::UnknownTable(name.to_string()))
    }

    /// Resolved natural key of `table`.
    pub fn key_spec(&self, table: &str) -> Result<&KeySpec> {
        self.table(table)?.natural_key().ok_or_else(|| {
            StoreError::InvalidSchema(format!("table `{table}` has no natural key"))
        })
    }
}

/// Render a default value as a DDL literal. The SQL time keywords stay raw so
/// `DEFAULT CURRENT_TIMESTAMP` works as declared.
fn default_literal(v: &Value) -> String {
    match v {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => (*b as i64).to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => match s.as_str() {
            "CURRENT_TIMESTAMP" | "CURRENT_DATE" | "CURRENT_TIME" => s.clone(),
            _ => format!("'{}'", s.replace('\'', "''")),
        },
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}
