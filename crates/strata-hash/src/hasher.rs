//! Incremental and one-shot content hashing.

use sha2::{Digest, Sha256};

use crate::oid::ObjectId;

/// Incremental SHA-256 hasher producing an [`ObjectId`].
pub struct Hasher {
    inner: Sha256,
}

impl Hasher {
    pub fn new() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    /// Feed more bytes into the digest.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finish and return the id.
    pub fn finalize(self) -> ObjectId {
        let digest = self.inner.finalize();
        let mut arr = [0u8; crate::oid::DIGEST_LEN];
        arr.copy_from_slice(&digest);
        ObjectId::from_array(arr)
    }

    /// One-shot digest of a byte slice.
    pub fn digest(data: &[u8]) -> ObjectId {
        let mut h = Self::new();
        h.update(data);
        h.finalize()
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash an object payload without storing it.
///
/// The digest covers the canonical envelope `"<kind> <size>\0"` followed by
/// the payload, so the id depends on both kind and content.
pub fn hash_object(kind: &str, payload: &[u8]) -> ObjectId {
    let mut h = Hasher::new();
    h.update(kind.as_bytes());
    h.update(b" ");
    h.update(payload.len().to_string().as_bytes());
    h.update(b"\0");
    h.update(payload);
    h.finalize()
}
