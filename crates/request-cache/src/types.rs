//! Cache types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cached value and its freshness window
///
/// Entries are replaced wholesale on recomputation, never mutated in
/// place.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry<T> {
    pub value: T,
    /// When the value was computed
    #[allow(dead_code)]
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// Fresh iff `now` is strictly before the expiry instant
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Statistics about the cache
///
/// Entry counts are evaluated against "now" at the time of the call;
/// `hits`, `misses` and `coalesced` are lifetime counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub pending_count: usize,
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
}
