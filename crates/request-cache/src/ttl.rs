//! Per-operation TTL policy
//!
//! Freshness windows are registered explicitly per operation identity;
//! anything unregistered gets the default tier. Long-lived lookups
//! (profile-style data that rarely changes) are opted in by the caller
//! with [`TtlPolicy::with_operation`] rather than inferred from the
//! identity string.

use std::collections::HashMap;
use std::time::Duration;

/// Freshness window for operations without an override
const DEFAULT_TTL_SECS: u64 = 300; // 5 minutes

/// TTL lookup table for operation identities
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    default_ttl: Duration,
    overrides: HashMap<String, Duration>,
}

impl TtlPolicy {
    /// Policy with the given default tier and no overrides
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            overrides: HashMap::new(),
        }
    }

    /// Register a dedicated freshness window for one operation
    pub fn with_operation(mut self, operation: &str, ttl: Duration) -> Self {
        self.overrides.insert(operation.to_string(), ttl);
        self
    }

    /// Freshness window for an operation identity
    pub fn ttl_for(&self, operation: &str) -> Duration {
        self.overrides
            .get(operation)
            .copied()
            .unwrap_or(self.default_ttl)
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TTL_SECS))
    }
}
