//! In-memory mirrored index and the merge-on-write synchronization algorithm.
//!
//! Each table mirrors into an ordered key → slot map, loaded wholesale at
//! construction. `upsert` reconciles a candidate against the mirror, writes
//! to the backing store only when something actually changed, and then
//! unconditionally writes the candidate into the mirror (write-through,
//! last-writer-wins in memory).

use super::Store;
use crate::error::{Result, StoreError};
use crate::lock::{CoarseLock, LockStrategy, lock_or_recover, read_or_recover, write_or_recover};
use crate::query::WhereSpec;
use crate::schema::{KeyKind, KeySpec, Schema};
use crate::types::{Key, Row, SetOutcome, Slot, UpdateOutcome, encode_row, row_changed};
use log::{error, warn};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

/// Candidate for one `upsert`: a single row for scalar-keyed tables, or a
/// sequence of rows sharing one key for list-keyed tables.
#[derive(Debug, Clone)]
pub enum Candidate {
    One(Row),
    Many(Vec<Row>),
}

impl From<Row> for Candidate {
    fn from(row: Row) -> Self {
        Candidate::One(row)
    }
}

impl From<Vec<Row>> for Candidate {
    fn from(rows: Vec<Row>) -> Self {
        Candidate::Many(rows)
    }
}

/// Ordered key → slot map of one mirrored table.
pub type TableMirror = BTreeMap<Key, Slot>;

/// A [`Store`] plus the mirrored index of every declared table.
pub struct MirrorStore {
    store: Store,
    mirror: Mutex<HashMap<String, TableMirror>>,
    strategy: Arc<dyn LockStrategy>,
    // upserts hold this shared, reload exclusively: a wholesale swap never
    // interleaves with an in-flight write-through
    gate: RwLock<()>,
}

impl MirrorStore {
    /// Open the store and load every table into the mirror. The default
    /// serialization strategy is one coarse lock for the whole instance.
    pub fn open(path: impl Into<PathBuf>, schema: Schema) -> Result<MirrorStore> {
        Self::open_with(path, schema, Arc::new(CoarseLock::default()))
    }

    /// Open with an explicit serialization strategy.
    pub fn open_with(
        path: impl Into<PathBuf>,
        schema: Schema,
        strategy: Arc<dyn LockStrategy>,
    ) -> Result<MirrorStore> {
        let store = Store::open(path, schema)?;
        let mirrored = MirrorStore {
            store,
            mirror: Mutex::new(HashMap::new()),
            strategy,
            gate: RwLock::new(()),
        };
        mirrored.reload()?;
        Ok(mirrored)
    }

    /// The underlying CRUD store. Writes made through it bypass the mirror;
    /// follow them with [`reload`](Self::reload) if mirrored tables are
    /// affected.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Full reload: rescan every table and rebuild its mirror wholesale.
    /// Rows whose key column is absent or not keyable are skipped with a
    /// warning. Runs exclusively: in-flight upserts finish first, new ones
    /// wait until the swap is done.
    pub fn reload(&self) -> Result<()> {
        let _excl = write_or_recover(&self.gate);
        let mut fresh = HashMap::new();
        for table in self.store.schema().tables() {
            let spec = self.store.schema().key_spec(&table.name)?;
            let col = &spec.columns[0];
            let mut map = TableMirror::new();
            for row in self.store.rows(&table.name)? {
                let Some(key) = row.get(col).and_then(Key::from_value) else {
                    warn!(
                        "table `{}`: row without keyable `{col}` skipped during reload",
                        table.name
                    );
                    continue;
                };
                match spec.kind {
                    KeyKind::Scalar => {
                        map.insert(key, Slot::One(row));
                    }
                    KeyKind::List => {
                        let slot = map.entry(key).or_insert_with(|| Slot::Many(Vec::new()));
                        if let Slot::Many(rows) = slot {
                            rows.push(row);
                        }
                    }
                }
            }
            fresh.insert(table.name.clone(), map);
        }
        *lock_or_recover(&self.mirror) = fresh;
        Ok(())
    }

    /// Reconcile `candidate` against the mirror and the backing store, under
    /// the table's serialization lock.
    ///
    /// A mirrored key whose row differs (on fields the candidate declares)
    /// issues an UPDATE restricted to the key columns; an unmirrored key
    /// issues an insert-or-ignore. The mirror then takes the candidate as
    /// given — even when the backing write was skipped, rejected by a
    /// uniqueness conflict, or failed outright. Divergence is observable in
    /// the returned [`SetOutcome`] and repairable only by `reload`.
    pub fn upsert(&self, table: &str, candidate: impl Into<Candidate>) -> Result<SetOutcome> {
        let candidate = candidate.into();
        let _shared = read_or_recover(&self.gate);
        let lock = self.strategy.lock_for(table);
        let _guard = lock_or_recover(&lock);

        let spec = self.store.schema().key_spec(table)?.clone();
        let col = spec.columns[0].clone();
        let key = candidate_key(table, &spec, &col, &candidate)?;

        let persisted = match &candidate {
            Candidate::One(row) => self.persist_one(table, &spec, &key, row),
            Candidate::Many(rows) => self.persist_many(table, &spec, &key, rows),
        };
        if let Err(ref e) = persisted {
            error!("upsert `{table}` key {key} failed: {e}; candidate {candidate:?}");
        }

        // Write-through: the mirror reflects the caller's object no matter
        // what the backing store did.
        {
            let mut mirror = lock_or_recover(&self.mirror);
            let slot = match candidate {
                Candidate::One(row) => Slot::One(row),
                Candidate::Many(rows) => Slot::Many(rows),
            };
            mirror.entry(table.to_string()).or_default().insert(key, slot);
        }
        persisted
    }

    fn persist_one(
        &self,
        table: &str,
        spec: &KeySpec,
        key: &Key,
        row: &Row,
    ) -> Result<SetOutcome> {
        let encoded = encode_row(row);
        let old = self
            .mirrored_slot(table, key)
            .and_then(|slot| slot.as_row().cloned());
        let mut out = SetOutcome::default();
        match old {
            Some(old) => {
                if row_changed(&old, &encoded) {
                    self.push_update(table, spec, &encoded, &mut out)?;
                } else {
                    out.unchanged += 1;
                }
            }
            None => self.push_insert(table, &encoded, &mut out)?,
        }
        Ok(out)
    }

    fn persist_many(
        &self,
        table: &str,
        spec: &KeySpec,
        key: &Key,
        rows: &[Row],
    ) -> Result<SetOutcome> {
        let mirrored: Vec<Row> = self
            .mirrored_slot(table, key)
            .map(|slot| match slot {
                Slot::Many(rows) => rows,
                Slot::One(row) => vec![row],
            })
            .unwrap_or_default();
        let mut out = SetOutcome::default();
        for (i, row) in rows.iter().enumerate() {
            let encoded = encode_row(row);
            match mirrored.get(i) {
                Some(old) => {
                    if row_changed(old, &encoded) {
                        self.push_update(table, spec, &encoded, &mut out)?;
                    } else {
                        out.unchanged += 1;
                    }
                }
                None => self.push_insert(table, &encoded, &mut out)?,
            }
        }
        Ok(out)
    }

    fn push_update(
        &self,
        table: &str,
        spec: &KeySpec,
        encoded: &Row,
        out: &mut SetOutcome,
    ) -> Result<()> {
        let wheres = key_wheres(&spec.columns, encoded);
        match self.store.update_one(table, encoded, &wheres)? {
            // matched no row: the mirror knows a row the file does not
            UpdateOutcome::Applied(0) => out.rejected += 1,
            UpdateOutcome::Applied(_) => out.updated += 1,
            UpdateOutcome::NoFields => out.unchanged += 1,
        }
        Ok(())
    }

    fn push_insert(&self, table: &str, encoded: &Row, out: &mut SetOutcome) -> Result<()> {
        let n = self.store.insert_ignore(table, std::slice::from_ref(encoded))?;
        if n > 0 {
            out.inserted += 1;
        } else {
            // uniqueness conflict swallowed by OR IGNORE
            out.rejected += 1;
        }
        Ok(())
    }

    fn mirrored_slot(&self, table: &str, key: &Key) -> Option<Slot> {
        let mirror = lock_or_recover(&self.mirror);
        mirror.get(table).and_then(|m| m.get(key)).cloned()
    }

    /// Mirrored slot for `key`, if loaded.
    pub fn get(&self, table: &str, key: &Key) -> Option<Slot> {
        self.mirrored_slot(table, key)
    }

    /// Mirrored single row for `key` (scalar-keyed tables).
    pub fn get_row(&self, table: &str, key: &Key) -> Option<Row> {
        self.mirrored_slot(table, key)
            .and_then(|slot| slot.as_row().cloned())
    }

    /// Keys of a table's mirror, in order.
    pub fn keys(&self, table: &str) -> Vec<Key> {
        let mirror = lock_or_recover(&self.mirror);
        mirror
            .get(table)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of mirrored keys for `table`.
    pub fn len(&self, table: &str) -> usize {
        let mirror = lock_or_recover(&self.mirror);
        mirror.get(table).map(|m| m.len()).unwrap_or(0)
    }

    /// Snapshot of a table's mirror.
    pub fn snapshot(&self, table: &str) -> TableMirror {
        let mirror = lock_or_recover(&self.mirror);
        mirror.get(table).cloned().unwrap_or_default()
    }
}

/// WHERE over the key columns, with values taken from the encoded row.
fn key_wheres(columns: &[String], row: &Row) -> WhereSpec {
    columns
        .iter()
        .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
        .fold(WhereSpec::new(), |w, (c, v)| w.eq(c, v))
}

/// Key of a candidate, with shape checks: scalar tables take one row, list
/// tables a non-empty sequence keyed by the first element.
fn candidate_key(
    table: &str,
    spec: &KeySpec,
    col: &str,
    candidate: &Candidate,
) -> Result<Key> {
    let row = match (spec.kind, candidate) {
        (KeyKind::Scalar, Candidate::One(row)) => row,
        (KeyKind::List, Candidate::Many(rows)) => {
            rows.first().ok_or_else(|| StoreError::MissingKey {
                table: table.to_string(),
                column: col.to_string(),
            })?
        }
        (KeyKind::Scalar, Candidate::Many(_)) => {
            return Err(StoreError::KindMismatch {
                table: table.to_string(),
                expected: "single-row",
            });
        }
        (KeyKind::List, Candidate::One(_)) => {
            return Err(StoreError::KindMismatch {
                table: table.to_string(),
                expected: "row-sequence",
            });
        }
    };
    row.get(col)
        .and_then(Key::from_value)
        .ok_or_else(|| StoreError::MissingKey {
            table: table.to_string(),
            column: col.to_string(),
        })
}
