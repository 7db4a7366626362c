//! Row values, natural keys, and operation outcomes.

use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// One table row as a column → value map. Ordered by column name, so two rows
/// with the same fields always iterate identically.
pub type Row = BTreeMap<String, Value>;

/// Natural key of a mirrored row: the scalar stored in the table's key column.
///
/// Totally ordered so it can key a `BTreeMap`; floats compare via
/// [`f64::total_cmp`]. Cross-type keys order Int < Real < Text.
#[derive(Debug, Clone)]
pub enum Key {
    Int(i64),
    Real(f64),
    Text(String),
}

impl Key {
    /// Extract a key from a column value. Bools map to 0/1; null, objects and
    /// arrays are not keyable.
    pub fn from_value(v: &Value) -> Option<Key> {
        match v {
            Value::Bool(b) => Some(Key::Int(*b as i64)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Key::Int(i)),
                None => n.as_f64().map(Key::Real),
            },
            Value::String(s) => Some(Key::Text(s.clone())),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Key::Int(_) => 0,
            Key::Real(_) => 1,
            Key::Text(_) => 2,
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Int(a), Key::Int(b)) => a.cmp(b),
            (Key::Real(a), Key::Real(b)) => a.total_cmp(b),
            (Key::Text(a), Key::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{i}"),
            Key::Real(r) => write!(f, "{r}"),
            Key::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Mirror slot for one natural key: a single row, or a positional sequence of
/// rows for tables with a one-to-many key.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    One(Row),
    Many(Vec<Row>),
}

impl Slot {
    pub fn as_row(&self) -> Option<&Row> {
        match self {
            Slot::One(row) => Some(row),
            Slot::Many(_) => None,
        }
    }

    pub fn as_rows(&self) -> Option<&[Row]> {
        match self {
            Slot::One(_) => None,
            Slot::Many(rows) => Some(rows),
        }
    }
}

/// What one `upsert` did against the backing store.
///
/// `rejected` counts inserts swallowed by a uniqueness conflict and updates
/// that matched no row; both mean the mirror and the file have diverged for
/// that row until the next full reload.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SetOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub rejected: usize,
}

impl SetOutcome {
    /// True when at least one row actually reached the backing store.
    pub fn wrote(&self) -> bool {
        self.inserted + self.updated > 0
    }
}

/// Outcome of `update_one`. `NoFields` is the declared no-op: every field of
/// the payload was either the primary key or undeclared, so no SQL was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied(usize),
    NoFields,
}

/// Decode a stored column value: TEXT that looks like a JSON object or array
/// is parsed; a parse failure keeps the opaque string.
pub fn decode_field(v: Value) -> Value {
    if let Value::String(ref s) = v {
        let t = s.trim();
        if (t.starts_with('{') && t.ends_with('}')) || (t.starts_with('[') && t.ends_with(']')) {
            if let Ok(parsed) = serde_json::from_str::<Value>(t) {
                return parsed;
            }
        }
    }
    v
}

/// Encode a field for persistence: objects and arrays become JSON text,
/// scalars pass through. `decode_field(encode_field(v)) == v` for
/// JSON-compatible `v`.
pub fn encode_field(v: &Value) -> Value {
    match v {
        Value::Object(_) | Value::Array(_) => Value::String(v.to_string()),
        _ => v.clone(),
    }
}

/// Copy of `row` with every field in persisted form.
pub fn encode_row(row: &Row) -> Row {
    row.iter()
        .map(|(k, v)| (k.clone(), encode_field(v)))
        .collect()
}

/// True when `new` differs from `old` on any field both rows declare.
/// Driven by `new`: fields only the old row has are ignored. Both sides are
/// compared in persisted form so a decoded mirror entry never spuriously
/// differs from its own encoding.
pub fn row_changed(old: &Row, new: &Row) -> bool {
    new.iter().any(|(k, v)| match old.get(k) {
        Some(o) => encode_field(o) != encode_field(v),
        None => false,
    })
}

/// Fields of `a` whose column also exists in `b`.
pub fn intersect_keys(a: &Row, b: &Row) -> Row {
    a.iter()
        .filter(|(k, _)| b.contains_key(*k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Truncate a float to its first seven printed characters (e.g. 3.14159265 →
/// 3.14159). Falls back to the input when the prefix does not reparse.
pub fn trunc7(num: f64) -> f64 {
    let s = format!("{num}");
    let cut = s.len().min(7);
    s[..cut].parse().unwrap_or(num)
}
