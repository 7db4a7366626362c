//! Declarative store settings loaded from TOML. The host can declare its
//! table set in a config file instead of in code; the shape mirrors the
//! in-code builder:
//!
//! ```toml
//! path = "main.db"
//!
//! [[tables]]
//! name = "accounts"
//!
//! [[tables.columns]]
//! name = "auth"
//! type = "TEXT"
//! required = true
//!
//! [[tables.columns]]
//! name = "basic"
//! type = "INTEGER"
//! default = 0
//!
//! [[tables.unique]]
//! name = "auth"
//! columns = ["auth"]
//! ```

use crate::error::Result;
use crate::schema::{ColumnPolicy, KeyKind, Schema, StorageType, TableSchema};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Backing database file.
    pub path: PathBuf,
    #[serde(default)]
    pub tables: Vec<TableDecl>,
}

#[derive(Debug, Deserialize)]
pub struct TableDecl {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnDecl>,
    #[serde(default)]
    pub unique: Vec<UniqueDecl>,
    pub key: Option<KeyDecl>,
}

#[derive(Debug, Deserialize)]
pub struct ColumnDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub storage: StorageType,
    #[serde(default)]
    pub required: bool,
    pub default: Option<toml::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UniqueDecl {
    pub name: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct KeyDecl {
    pub columns: Vec<String>,
    /// One-to-many key: the mirror accumulates a row sequence per key.
    #[serde(default)]
    pub list: bool,
}

/// Load settings from `path` if present and well-formed. Parse problems are
/// logged, not raised.
pub fn load_settings(path: &Path) -> Option<Settings> {
    let s = std::fs::read_to_string(path).ok()?;
    toml::from_str(&s)
        .map_err(|e| log::warn!("{}: {e}", path.display()))
        .ok()
}

impl Settings {
    /// Parse a TOML string directly.
    pub fn from_str(s: &str) -> std::result::Result<Settings, toml::de::Error> {
        toml::from_str(s)
    }

    /// Turn the declarations into a validated [`Schema`].
    pub fn into_schema(self) -> Result<Schema> {
        let mut tables = Vec::with_capacity(self.tables.len());
        for decl in self.tables {
            let mut table = TableSchema::new(decl.name);
            for c in decl.columns {
                let policy = if c.required {
                    ColumnPolicy::Required
                } else if let Some(d) = c.default {
                    ColumnPolicy::Default(toml_to_json(d))
                } else {
                    ColumnPolicy::Loose
                };
                table = table.column(c.name, c.storage, policy);
            }
            for u in decl.unique {
                table = table.unique(u.name, u.columns);
            }
            if let Some(k) = decl.key {
                let kind = if k.list { KeyKind::List } else { KeyKind::Scalar };
                table = table.key(k.columns, kind);
            }
            tables.push(table);
        }
        Schema::new(tables)
    }
}

fn toml_to_json(v: toml::Value) -> Value {
    match v {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Array(a) => Value::Array(a.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(t) => {
            Value::Object(t.into_iter().map(|(k, v)| (k, toml_to_json(v))).collect())
        }
    }
}
