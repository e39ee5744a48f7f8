//! In-memory entry store with lazy expiry
//!
//! Owns every [`CacheEntry`]; mutation is whole-entry replace or
//! delete, and an expired entry is evicted at the moment a lookup
//! observes it. There is no background sweep. The engine keeps the
//! store behind its state mutex, so nothing here is reachable without
//! the lock.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::CacheEntry;

#[derive(Debug)]
pub(crate) struct Store<T> {
    entries: HashMap<String, CacheEntry<T>>,
}

impl<T: Clone> Store<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Fresh value for `key`, evicting the entry if it has expired
    pub fn get(&mut self, key: &str, now: DateTime<Utc>) -> Option<T> {
        match self.entries.get(key) {
            Some(entry) if entry.is_fresh(now) => Some(entry.value.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Replace any existing entry for `key` wholesale
    pub fn put(&mut self, key: String, value: T, now: DateTime<Utc>, ttl: Duration) {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        // Absurdly large TTLs saturate to the far future
        let expires_at = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                expires_at,
            },
        );
    }

    pub fn delete(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Remove every entry whose key starts with `prefix`
    pub fn delete_prefix(&mut self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries still fresh at `now`; the rest are expired but unswept
    pub fn count_fresh(&self, now: DateTime<Utc>) -> usize {
        self.entries.values().filter(|e| e.is_fresh(now)).count()
    }
}
