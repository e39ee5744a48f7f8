//! Cache key derivation
//!
//! Keys are `"{operation}:{args as compact JSON}"`. The operation
//! identity is an explicit caller-supplied tag, and `serde_json` maps
//! keep their keys sorted, so semantically equal argument lists always
//! produce the same key.

use serde_json::Value;

/// Derive the cache key for an operation identity and its arguments
pub fn derive_key(operation: &str, args: &[Value]) -> String {
    let args_json = Value::Array(args.to_vec()).to_string();
    format!("{operation}:{args_json}")
}

/// Key prefix shared by every entry of one operation
///
/// The trailing separator keeps `get` from matching `getProfile` keys.
pub(crate) fn operation_prefix(operation: &str) -> String {
    format!("{operation}:")
}
