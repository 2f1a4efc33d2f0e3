use std::hash::{Hash, Hasher};

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// 32-bit FNV-1a over raw bytes.
///
/// Use this when shard placement has to agree with data hashed elsewhere;
/// generic keys go through [`Fnv1aHasher`] instead, which sees the bytes
/// `K: Hash` chooses to emit (for `str` that includes a trailing `0xff`).
///
/// ```rust
/// assert_eq!(cmap::hash::fnv32(b""), 0x811c_9dc5);
/// assert_eq!(cmap::hash::fnv32(b"a"), 0xe40c_292c);
/// ```
#[inline]
pub fn fnv32(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// `Hasher` adapter that folds every written byte into an FNV-1a state.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1aHasher(u32);

impl Default for Fnv1aHasher {
    fn default() -> Self {
        Fnv1aHasher(FNV_OFFSET_BASIS)
    }
}

impl Hasher for Fnv1aHasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 ^= u32::from(byte);
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }

    #[inline]
    fn finish(&self) -> u64 {
        u64::from(self.0)
    }
}

/// Hash function implementation for shard assignment.
/// Uses an enum to avoid trait object limitations with generics.
#[derive(Debug, Clone, Copy, Default)]
pub enum ShardHasher {
    /// 32-bit FNV-1a (default, stable across runs).
    #[default]
    Fnv1a,
    /// AHash with fixed keys (fast, well-distributed).
    AHash,
    /// FxHash implementation (faster but potentially less distributed).
    #[cfg(feature = "fxhash")]
    FxHash,
}

impl ShardHasher {
    /// Hash a key to determine which shard it belongs to.
    pub fn hash_key<Q: Hash + ?Sized>(&self, key: &Q) -> u64 {
        match self {
            ShardHasher::Fnv1a => {
                let mut hasher = Fnv1aHasher::default();
                key.hash(&mut hasher);
                hasher.finish()
            }
            ShardHasher::AHash => {
                let mut hasher = ahash::AHasher::default();
                key.hash(&mut hasher);
                hasher.finish()
            }
            #[cfg(feature = "fxhash")]
            ShardHasher::FxHash => {
                let mut hasher = fxhash::FxHasher::default();
                key.hash(&mut hasher);
                hasher.finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv32_known_vectors() {
        assert_eq!(fnv32(b""), 0x811c_9dc5);
        assert_eq!(fnv32(b"a"), 0xe40c_292c);
        assert_eq!(fnv32(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn hasher_matches_fnv32_on_raw_writes() {
        let mut hasher = Fnv1aHasher::default();
        hasher.write(b"foo");
        hasher.write(b"bar");
        assert_eq!(hasher.finish(), u64::from(fnv32(b"foobar")));
    }

    #[test]
    fn hash_key_is_deterministic() {
        for hasher in [ShardHasher::Fnv1a, ShardHasher::AHash] {
            assert_eq!(hasher.hash_key("key"), hasher.hash_key("key"));
            assert_eq!(
                hasher.hash_key(&"key".to_string()),
                hasher.hash_key("key")
            );
        }
    }
}
