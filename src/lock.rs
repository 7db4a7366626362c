//! Keyed mutual exclusion and the store serialization strategy.
//!
//! The same facility backs two uses: external callers serializing access to a
//! shared resource path, and the mirror store guarding its upsert critical
//! section. Guards are plain `MutexGuard`s, so release happens on every exit
//! path.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Keyed lock registry: same key → same mutex, different keys independent.
/// Mutexes are created on first use and live for the registry's lifetime.
#[derive(Debug, Default)]
pub struct LockManager {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutex for `key`. Callers hold the guard for the critical section:
    ///
    /// ```
    /// let locks = sqlmirror::lock::LockManager::new();
    /// let m = locks.acquire("/some/resource");
    /// let _guard = m.lock().unwrap();
    /// // exclusive for "/some/resource" until _guard drops
    /// ```
    pub fn acquire(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = lock_or_recover(&self.locks);
        locks.entry(key.to_string()).or_default().clone()
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock_or_recover<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

pub(crate) fn read_or_recover<T>(l: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(|e| e.into_inner())
}

pub(crate) fn write_or_recover<T>(l: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(|e| e.into_inner())
}

/// How upsert critical sections are serialized. The default is one lock per
/// store instance; swap in a finer strategy to stop unrelated tables from
/// serializing against each other.
pub trait LockStrategy: Send + Sync {
    fn lock_for(&self, table: &str) -> Arc<Mutex<()>>;
}

/// One mutex for the whole store: every table serializes against every other.
/// The correctness baseline.
#[derive(Debug, Default)]
pub struct CoarseLock {
    inner: Arc<Mutex<()>>,
}

impl LockStrategy for CoarseLock {
    fn lock_for(&self, _table: &str) -> Arc<Mutex<()>> {
        Arc::clone(&self.inner)
    }
}

/// One mutex per table name; operations on different tables proceed
/// independently.
#[derive(Debug, Default)]
pub struct PerTableLock {
    keys: LockManager,
}

impl LockStrategy for PerTableLock {
    fn lock_for(&self, table: &str) -> Arc<Mutex<()>> {
        self.keys.acquire(table)
    }
}
