//! Object identifiers and content hashing for strata.
//!
//! An object's identity is the SHA-256 digest of its canonical serialized
//! form: `"<kind> <size>\0"` followed by the payload. Identity and content
//! are inseparable; the same bytes always hash to the same id.

pub mod hex;

mod hasher;
mod oid;

pub use hasher::{hash_object, Hasher};
pub use oid::{ObjectId, DIGEST_LEN, HEX_LEN};

/// Errors produced when constructing or parsing object ids.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("invalid digest length: expected {expected} bytes, got {actual}")]
    InvalidDigestLength { expected: usize, actual: usize },

    #[error("invalid hex length: expected {expected} chars, got {actual}")]
    InvalidHexLength { expected: usize, actual: usize },

    #[error("invalid hex byte {byte:#04x} at position {position}")]
    InvalidHex { byte: u8, position: usize },
}
