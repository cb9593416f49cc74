//! Cache Key Module
//!
//! Builds deterministic cache keys from an operation prefix and its
//! arguments.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Combined argument length beyond which keys switch to a digest.
///
/// Short keys stay human-readable for debugging; long argument lists
/// would otherwise blow past sane key sizes in the shared store.
pub const KEY_HASH_THRESHOLD: usize = 100;

// == Key Derivation ==
/// Derives the cache key for an operation call.
///
/// Keys take the form `cache:{prefix}:{args}:{kwargs}` with named
/// arguments sorted by name, so equivalent calls collide regardless of
/// the order names were given in. When the serialized arguments exceed
/// [`KEY_HASH_THRESHOLD`] bytes the argument part is replaced with its
/// SHA-256 hex digest.
///
/// # Arguments
/// * `prefix` - Operation namespace (e.g. `market_data`)
/// * `args` - Positional arguments, serialized in order
/// * `kwargs` - Named arguments as `(name, value)` pairs
pub fn derive_key(prefix: &str, args: &[Value], kwargs: &[(&str, Value)]) -> String {
    let args_repr = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(",");

    let mut sorted: Vec<&(&str, Value)> = kwargs.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let kwargs_repr = sorted
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(",");

    if args_repr.len() + kwargs_repr.len() > KEY_HASH_THRESHOLD {
        let mut hasher = Sha256::new();
        hasher.update(args_repr.as_bytes());
        hasher.update(b":");
        hasher.update(kwargs_repr.as_bytes());
        let digest = hex::encode(hasher.finalize());
        format!("cache:{prefix}:{digest}")
    } else {
        format!("cache:{prefix}:{args_repr}:{kwargs_repr}")
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_short_keys_are_readable() {
        let key = derive_key("market_data", &[json!("AAPL"), json!(30)], &[]);
        assert_eq!(key, "cache:market_data:\"AAPL\",30:");
    }

    #[test]
    fn test_kwargs_sorted_by_name() {
        let a = derive_key(
            "model",
            &[],
            &[("period", json!(30)), ("currency", json!("USD"))],
        );
        let b = derive_key(
            "model",
            &[],
            &[("currency", json!("USD")), ("period", json!(30))],
        );
        assert_eq!(a, b);
        assert_eq!(a, "cache:model::currency=\"USD\",period=30");
    }

    #[test]
    fn test_distinct_args_distinct_keys() {
        let a = derive_key("quote", &[json!("AAPL")], &[]);
        let b = derive_key("quote", &[json!("MSFT")], &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_long_args_hashed() {
        let long = "x".repeat(200);
        let key = derive_key("bulk", &[json!(long)], &[]);

        // "cache:bulk:" plus a 64-char hex digest
        assert_eq!(key.len(), "cache:bulk:".len() + 64);
        let digest = key.rsplit(':').next().unwrap();
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hashed_keys_still_deterministic() {
        let long = "y".repeat(200);
        let a = derive_key("bulk", &[json!(long.clone())], &[]);
        let b = derive_key("bulk", &[json!(long)], &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_threshold_boundary() {
        // Exactly at the threshold stays literal, one byte over hashes.
        // A JSON string of n chars serializes to n + 2 bytes with quotes.
        let at = "a".repeat(KEY_HASH_THRESHOLD - 2);
        let over = "a".repeat(KEY_HASH_THRESHOLD - 1);

        assert!(derive_key("t", &[json!(at)], &[]).contains("aaa"));
        assert!(!derive_key("t", &[json!(over)], &[]).contains("aaa"));
    }
}
