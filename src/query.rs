//! SQL fragment builders: column lists, conditions, ordering, limits.
//! Pure string and parameter assembly, no storage I/O. The only failure mode
//! is a malformed identifier, reported as a checked error.

use crate::error::{Result, StoreError};
use crate::types::Row;
use serde_json::Value;
use std::collections::HashMap;

/// True for a bare SQL identifier (what gets backtick-quoted).
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Column specification for a select.
#[derive(Debug, Clone, Default)]
pub enum ColumnSpec {
    /// `SELECT *`; result positions come from the table's column index map.
    #[default]
    All,
    /// Raw comma-separated fragment list, e.g. `"name, COUNT(id) cnt"`.
    Raw(String),
    /// `(alias, expression)` pairs, rendered `expression alias`.
    Aliased(Vec<(String, String)>),
    /// Bare column names.
    Names(Vec<String>),
}

/// Rendered column list plus the output-alias → position map used to decode
/// positional result rows.
#[derive(Debug, Clone)]
pub struct ColumnFragment {
    pub select: String,
    pub indices: HashMap<String, usize>,
}

/// One condition value: equality for a scalar, `IN (…)` for a list.
#[derive(Debug, Clone)]
pub enum WhereValue {
    One(Value),
    In(Vec<Value>),
}

/// Ordered condition set, AND-joined.
#[derive(Debug, Clone, Default)]
pub struct WhereSpec {
    entries: Vec<(String, WhereValue)>,
}

impl WhereSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push((column.into(), WhereValue::One(value.into())));
        self
    }

    pub fn any_of(mut self, column: impl Into<String>, values: Vec<Value>) -> Self {
        self.entries.push((column.into(), WhereValue::In(values)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Sort direction for one ordering entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDir {
    Asc,
    Desc,
}

impl OrderDir {
    fn sql(&self) -> &'static str {
        match self {
            OrderDir::Asc => "ASC",
            OrderDir::Desc => "DESC",
        }
    }
}

pub type OrderSpec = Vec<(String, OrderDir)>;

/// Row limit: a plain count, or the SQLite `LIMIT a, b` pair as given.
#[derive(Debug, Clone, Copy)]
pub enum Limit {
    Count(u64),
    Pair(u64, u64),
}

/// A complete parameterized statement plus its result index map.
#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
    pub indices: HashMap<String, usize>,
}

/// Build the select-clause fragment for `spec`.
///
/// Quoting rule: any whitespace token of a fragment that is not a dotted path
/// or function call (no `.`, `(`, `)`) must be a bare identifier and gets
/// backtick-quoted. The output alias of a fragment is its last token;
/// duplicate aliases keep their first position, last rendering wins.
pub fn column_fragment(
    index_map: &HashMap<String, usize>,
    spec: &ColumnSpec,
) -> Result<ColumnFragment> {
    let joined = match spec {
        ColumnSpec::All => {
            return Ok(ColumnFragment {
                select: "*".to_string(),
                indices: index_map.clone(),
            });
        }
        ColumnSpec::Raw(s) => s.clone(),
        ColumnSpec::Aliased(pairs) => pairs
            .iter()
            .map(|(alias, expr)| format!("{expr} {alias}"))
            .collect::<Vec<_>>()
            .join(","),
        ColumnSpec::Names(names) => names.join(","),
    };

    let clean: String = joined.chars().filter(|c| !"`\"'".contains(*c)).collect();

    // alias → (position, rendered fragment), insertion-ordered
    let mut fragments: Vec<(String, String)> = Vec::new();
    for piece in clean.split(',') {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        let tokens: Vec<&str> = piece.split_whitespace().collect();
        let mut rendered = Vec::with_capacity(tokens.len());
        for tok in &tokens {
            if tok.contains(['.', '(', ')']) {
                rendered.push((*tok).to_string());
            } else if is_identifier(tok) {
                rendered.push(format!("`{tok}`"));
            } else {
                return Err(StoreError::InvalidIdentifier((*tok).to_string()));
            }
        }
        let alias = tokens[tokens.len() - 1].to_string();
        let formatted = rendered.join(" ");
        match fragments.iter_mut().find(|(a, _)| *a == alias) {
            Some((_, f)) => *f = formatted,
            None => fragments.push((alias, formatted)),
        }
    }

    let select = fragments
        .iter()
        .map(|(_, f)| f.as_str())
        .collect::<Vec<_>>()
        .join(",");
    let indices = fragments
        .iter()
        .enumerate()
        .map(|(i, (a, _))| (a.clone(), i))
        .collect();
    Ok(ColumnFragment { select, indices })
}

/// Render a condition set: `" WHERE a = ? AND b IN (?,?)"` plus its ordered
/// parameters. Empty spec yields an empty clause and no parameters.
pub fn where_clause(spec: &WhereSpec) -> Result<(String, Vec<Value>)> {
    if spec.is_empty() {
        return Ok((String::new(), Vec::new()));
    }
    let mut conds = Vec::with_capacity(spec.entries.len());
    let mut params = Vec::new();
    for (col, v) in &spec.entries {
        if !is_identifier(col) {
            return Err(StoreError::InvalidIdentifier(col.clone()));
        }
        match v {
            WhereValue::One(val) => {
                conds.push(format!("`{col}` = ?"));
                params.push(val.clone());
            }
            WhereValue::In(vals) => {
                let marks = vec!["?"; vals.len()].join(",");
                conds.push(format!("`{col}` IN ({marks})"));
                params.extend(vals.iter().cloned());
            }
        }
    }
    Ok((format!(" WHERE {}", conds.join(" AND ")), params))
}

/// Render an UPDATE set list. `None` when the payload is empty.
pub fn set_clause(sets: &Row) -> Result<Option<(String, Vec<Value>)>> {
    if sets.is_empty() {
        return Ok(None);
    }
    let mut parts = Vec::with_capacity(sets.len());
    let mut params = Vec::with_capacity(sets.len());
    for (col, v) in sets {
        if !is_identifier(col) {
            return Err(StoreError::InvalidIdentifier(col.clone()));
        }
        parts.push(format!("`{col}` = ?"));
        params.push(v.clone());
    }
    Ok(Some((parts.join(", "), params)))
}

/// Render an ordering clause; empty spec yields no clause.
pub fn order_clause(orders: &OrderSpec) -> Result<String> {
    if orders.is_empty() {
        return Ok(String::new());
    }
    let mut parts = Vec::with_capacity(orders.len());
    for (col, dir) in orders {
        if !is_identifier(col) {
            return Err(StoreError::InvalidIdentifier(col.clone()));
        }
        parts.push(format!("`{col}` {}", dir.sql()));
    }
    Ok(format!(" ORDER BY {}", parts.join(", ")))
}

/// Render a limit clause; `None` yields no clause.
pub fn limit_clause(limit: Option<Limit>) -> String {
    match limit {
        None => String::new(),
        Some(Limit::Count(n)) => format!(" LIMIT {n}"),
        Some(Limit::Pair(a, b)) => format!(" LIMIT {a}, {b}"),
    }
}

/// Compose a full SELECT statement from the fragment builders.
pub fn select(
    table: &str,
    index_map: &HashMap<String, usize>,
    cols: &ColumnSpec,
    wheres: &WhereSpec,
    orders: &OrderSpec,
    limit: Option<Limit>,
) -> Result<Statement> {
    if !is_identifier(table) {
        return Err(StoreError::InvalidIdentifier(table.to_string()));
    }
    let c = column_fragment(index_map, cols)?;
    let (w, params) = where_clause(wheres)?;
    let o = order_clause(orders)?;
    let l = limit_clause(limit);
    Ok(Statement {
        sql: format!("SELECT {} FROM `{table}`{w}{o}{l}", c.select),
        params,
        indices: c.indices,
    })
}
