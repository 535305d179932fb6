//! Sharded in-memory key/value engine.
//!
//! The key space is split into a fixed number of independently-locked
//! shards, chosen by an FNV-1a hash of the key. Operations on different
//! shards proceed without contending on a single lock; there is no
//! cross-shard atomicity.

use parking_lot::RwLock;
use std::collections::HashMap;

/// Default number of shards when not overridden by configuration.
pub const DEFAULT_PARTITIONS: usize = 256;

const FNV_OFFSET_BASIS: u32 = 0x811c9dc5;
const FNV_PRIME: u32 = 0x01000193;

/// FNV-1a 32-bit hash over UTF-8 bytes.
fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// One independently-locked slice of the key space.
struct Shard {
    map: RwLock<HashMap<String, String>>,
}

impl Shard {
    fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }
}

/// A concurrent key/value store, sharded by key hash.
///
/// Shard count is fixed for the engine's lifetime; all operations are
/// total and infallible.
pub struct Engine {
    shards: Vec<Shard>,
}

impl Engine {
    /// Creates a new engine with `partitions` independently-locked shards.
    ///
    /// `partitions` must be at least 1; a value of 0 is coerced up to 1
    /// rather than panicking, since the engine must always have somewhere
    /// to put a key.
    pub fn new(partitions: usize) -> Self {
        let partitions = partitions.max(1);
        let mut shards = Vec::with_capacity(partitions);
        shards.resize_with(partitions, Shard::new);
        Self { shards }
    }

    /// Number of shards backing this engine.
    pub fn partitions(&self) -> usize {
        self.shards.len()
    }

    fn shard_for(&self, key: &str) -> &Shard {
        let index = (fnv1a_32(key.as_bytes()) as usize) % self.shards.len();
        &self.shards[index]
    }

    /// Reads the value for `key`. Returns `None` if absent.
    pub fn get(&self, key: &str) -> Option<String> {
        self.shard_for(key).map.read().get(key).cloned()
    }

    /// Sets `key` to `value`, overwriting any existing value.
    pub fn set(&self, key: &str, value: &str) {
        self.shard_for(key)
            .map
            .write()
            .insert(key.to_string(), value.to_string());
    }

    /// Deletes `key`. No-op if absent.
    pub fn delete(&self, key: &str) {
        self.shard_for(key).map.write().remove(key);
    }

    /// Total number of keys across all shards. For diagnostics/tests only.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.map.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_matches_known_vector() {
        // FNV-1a 32-bit of the empty string is the offset basis.
        assert_eq!(fnv1a_32(b""), FNV_OFFSET_BASIS);
    }

    #[test]
    fn round_trip_set_get() {
        let engine = Engine::new(4);
        engine.set("k", "v");
        assert_eq!(engine.get("k"), Some("v".to_string()));
    }

    #[test]
    fn overwrite_replaces_value() {
        let engine = Engine::new(4);
        engine.set("k", "v1");
        engine.set("k", "v2");
        assert_eq!(engine.get("k"), Some("v2".to_string()));
    }

    #[test]
    fn get_missing_key_is_none() {
        let engine = Engine::new(4);
        assert_eq!(engine.get("missing"), None);
    }

    #[test]
    fn delete_removes_key() {
        let engine = Engine::new(4);
        engine.set("k", "v");
        engine.delete("k");
        assert_eq!(engine.get("k"), None);
    }

    #[test]
    fn delete_missing_key_is_noop() {
        let engine = Engine::new(4);
        engine.delete("missing"); // must not panic
        assert_eq!(engine.len(), 0);
    }

    #[test]
    fn same_key_always_same_shard() {
        let engine = Engine::new(16);
        let a = engine.shard_for("repeat") as *const Shard;
        let b = engine.shard_for("repeat") as *const Shard;
        assert_eq!(a, b);
    }

    #[test]
    fn zero_partitions_coerced_to_one() {
        let engine = Engine::new(0);
        assert_eq!(engine.partitions(), 1);
        engine.set("k", "v");
        assert_eq!(engine.get("k"), Some("v".to_string()));
    }

    #[test]
    fn distinct_keys_independent() {
        let engine = Engine::new(64);
        for i in 0..100 {
            engine.set(&format!("key{i}"), &format!("val{i}"));
        }
        for i in 0..100 {
            assert_eq!(engine.get(&format!("key{i}")), Some(format!("val{i}")));
        }
        assert_eq!(engine.len(), 100);
    }
}
