use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// A fixed-width key storable inside hash index pages.
///
/// Keys need equality, hashing, and a stable byte encoding of a known
/// width; the bucket page layout is computed from that width.
pub trait IndexKey: Copy + Eq + Hash {
    /// Encoded width of the key in bytes.
    const ENCODED_SIZE: usize;

    /// Writes the key into `buf` (exactly `ENCODED_SIZE` bytes).
    fn encode_to(&self, buf: &mut [u8]);

    /// Reads a key back from `buf` (exactly `ENCODED_SIZE` bytes).
    fn decode_from(buf: &[u8]) -> Self;
}

impl IndexKey for u32 {
    const ENCODED_SIZE: usize = 4;

    fn encode_to(&self, buf: &mut [u8]) {
        buf[..4].copy_from_slice(&self.to_le_bytes());
    }

    fn decode_from(buf: &[u8]) -> Self {
        u32::from_le_bytes(buf[..4].try_into().unwrap())
    }
}

impl IndexKey for u64 {
    const ENCODED_SIZE: usize = 8;

    fn encode_to(&self, buf: &mut [u8]) {
        buf[..8].copy_from_slice(&self.to_le_bytes());
    }

    fn decode_from(buf: &[u8]) -> Self {
        u64::from_le_bytes(buf[..8].try_into().unwrap())
    }
}

/// An opaque fixed-width byte key, for indexing encoded tuple columns.
/// Wide instantiations are also handy in tests, where they shrink the
/// bucket capacity down to a handful of slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenericKey<const N: usize>([u8; N]);

impl<const N: usize> GenericKey<N> {
    /// Builds a key from a byte slice, zero-padding to the full width.
    /// Panics if the slice is wider than the key.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        assert!(bytes.len() <= N, "key data wider than key type");
        let mut data = [0u8; N];
        data[..bytes.len()].copy_from_slice(bytes);
        Self(data)
    }

    pub fn from_u64(v: u64) -> Self {
        Self::from_bytes(&v.to_le_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl<const N: usize> IndexKey for GenericKey<N> {
    const ENCODED_SIZE: usize = N;

    fn encode_to(&self, buf: &mut [u8]) {
        buf[..N].copy_from_slice(&self.0);
    }

    fn decode_from(buf: &[u8]) -> Self {
        let mut data = [0u8; N];
        data.copy_from_slice(&buf[..N]);
        Self(data)
    }
}

/// Hashes a key for directory indexing: the 64-bit hash downcast to
/// 32 bits by truncation.
pub fn hash_key<K: IndexKey>(key: &K) -> u32 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish() as u32
}
