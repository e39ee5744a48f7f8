//! Request cache engine
//!
//! [`RequestCache`] fronts expensive async fetch operations: repeat
//! requests inside an operation's freshness window are served from
//! memory, and concurrent requests for the same key are coalesced into
//! a single underlying call whose outcome every caller shares.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::key::{derive_key, operation_prefix};
use crate::store::Store;
use crate::ttl::TtlPolicy;
use crate::types::CacheStats;

/// Outcome of a settled call, shared with every attached waiter
type Settled<T, E> = Option<Result<T, Arc<E>>>;

struct State<T, E> {
    store: Store<T>,
    in_flight: HashMap<String, watch::Receiver<Settled<T, E>>>,
    hits: u64,
    misses: u64,
    coalesced: u64,
}

/// What a caller ends up doing after the check-then-register step
enum Role<T, E> {
    Hit(T),
    Leader(watch::Sender<Settled<T, E>>),
    Follower(watch::Receiver<Settled<T, E>>),
}

/// Request-coalescing cache with per-operation TTLs
///
/// Values are cached and delivered by clone; failures are delivered to
/// every waiter as a shared `Arc<E>` and are never cached. Share the
/// cache itself behind an `Arc` like any other service.
pub struct RequestCache<T, E> {
    state: Mutex<State<T, E>>,
    ttl: TtlPolicy,
    clock: Arc<dyn Clock>,
}

impl<T, E> RequestCache<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Cache with the default TTL policy and the system clock
    pub fn new() -> Self {
        Self::with_policy(TtlPolicy::default())
    }

    /// Cache with a custom TTL policy
    pub fn with_policy(ttl: TtlPolicy) -> Self {
        Self::with_policy_and_clock(ttl, Arc::new(SystemClock))
    }

    /// Cache with a custom TTL policy and time source
    pub fn with_policy_and_clock(ttl: TtlPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State {
                store: Store::new(),
                in_flight: HashMap::new(),
                hits: 0,
                misses: 0,
                coalesced: 0,
            }),
            ttl,
            clock,
        }
    }

    /// Fetch through the cache.
    ///
    /// Returns the cached value if a fresh one exists. Otherwise
    /// attaches to an in-flight call for the same key, or starts
    /// `fetch` as the leader and settles it for every attached caller.
    /// Failures propagate to all current waiters and are never cached;
    /// the next call for the key starts over.
    ///
    /// `fetch` runs once per coalesced group. The one exception is a
    /// leader whose caller was cancelled before settling: waiters then
    /// retry from the top and one of them starts a new call.
    pub async fn execute<F, Fut>(
        &self,
        operation: &str,
        args: &[Value],
        fetch: F,
    ) -> Result<T, Arc<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if operation.is_empty() {
            warn!("empty operation identity; keys may collide across operations");
        }
        let key = derive_key(operation, args);

        loop {
            let role = {
                let mut state = self.state.lock().unwrap();
                let now = self.clock.now();
                if let Some(value) = state.store.get(&key, now) {
                    state.hits += 1;
                    Role::Hit(value)
                } else if let Some(pending) = state.in_flight.get(&key) {
                    let rx = pending.clone();
                    state.coalesced += 1;
                    Role::Follower(rx)
                } else {
                    let (tx, rx) = watch::channel(None);
                    state.in_flight.insert(key.clone(), rx);
                    state.misses += 1;
                    Role::Leader(tx)
                }
            };

            match role {
                Role::Hit(value) => {
                    debug!(key = %key, "cache hit");
                    return Ok(value);
                }
                Role::Leader(tx) => return self.lead(operation, &key, tx, &fetch).await,
                Role::Follower(mut rx) => {
                    debug!(key = %key, "awaiting in-flight call");
                    if rx.changed().await.is_ok() {
                        if let Some(settled) = rx.borrow().clone() {
                            return settled;
                        }
                    }
                    // Leader was dropped before settling; start over
                    // (this caller may become the new leader).
                    warn!(key = %key, "in-flight call vanished before settling; retrying");
                }
            }
        }
    }

    /// Run the fetch as leader and settle every attached waiter
    async fn lead<F, Fut>(
        &self,
        operation: &str,
        key: &str,
        tx: watch::Sender<Settled<T, E>>,
        fetch: &F,
    ) -> Result<T, Arc<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        debug!(key = %key, "starting fetch");
        // Clears the registration if this future is dropped mid-fetch,
        // so the key cannot stay in-flight forever.
        let mut guard = InFlightGuard {
            state: &self.state,
            key,
            armed: true,
        };

        let result = fetch().await;

        let settled: Result<T, Arc<E>> = {
            let mut state = self.state.lock().unwrap();
            let outcome = match result {
                Ok(value) => {
                    let now = self.clock.now();
                    let ttl = self.ttl.ttl_for(operation);
                    state.store.put(key.to_string(), value.clone(), now, ttl);
                    debug!(key = %key, ttl_secs = ttl.as_secs(), "fetch settled");
                    Ok(value)
                }
                Err(e) => {
                    debug!(key = %key, "fetch failed");
                    Err(Arc::new(e))
                }
            };
            state.in_flight.remove(key);
            outcome
        };
        guard.armed = false;

        // Wake attached followers; nobody listening is fine
        let _ = tx.send(Some(settled.clone()));

        settled
    }

    /// Drop the cached entry for one (operation, args) pair.
    ///
    /// A call already in flight for the key is unaffected and will
    /// repopulate the cache when it settles (invalidate-before-settle
    /// is a no-op). Callers that need "invalidate and block until
    /// fresh" should re-`execute` after invalidating.
    pub fn invalidate(&self, operation: &str, args: &[Value]) {
        let key = derive_key(operation, args);
        let mut state = self.state.lock().unwrap();
        state.store.delete(&key);
        debug!(key = %key, "invalidated entry");
    }

    /// Drop every cached entry derived from one operation identity
    pub fn invalidate_operation(&self, operation: &str) {
        let prefix = operation_prefix(operation);
        let mut state = self.state.lock().unwrap();
        let removed = state.store.delete_prefix(&prefix);
        debug!(operation = %operation, removed, "invalidated operation entries");
    }

    /// Drop every cached entry.
    ///
    /// In-flight calls are left to finish and will write their results
    /// normally.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.store.clear();
        debug!("cleared cache");
    }

    /// Entry counts and lifetime counters.
    ///
    /// The valid/expired split is computed by sweeping the store
    /// against "now" at call time, so the numbers are never stale even
    /// though no background timer runs.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock().unwrap();
        let now = self.clock.now();
        let total_entries = state.store.len();
        let valid_entries = state.store.count_fresh(now);
        CacheStats {
            total_entries,
            valid_entries,
            expired_entries: total_entries - valid_entries,
            pending_count: state.in_flight.len(),
            hits: state.hits,
            misses: state.misses,
            coalesced: state.coalesced,
        }
    }
}

impl<T, E> Default for RequestCache<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Removes the in-flight registration if the leader never settles
struct InFlightGuard<'a, T, E> {
    state: &'a Mutex<State<T, E>>,
    key: &'a str,
    armed: bool,
}

impl<T, E> Drop for InFlightGuard<'_, T, E> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut state) = self.state.lock() {
            state.in_flight.remove(self.key);
        }
    }
}
