//! Object model: blobs, trees, commits, and tags.
//!
//! Objects are immutable and content-addressed. Each variant has a canonical
//! byte encoding; the object's id is the hash of `"<kind> <size>\0"` plus
//! that encoding, so identical content always yields the identical id.
//! Decoding is strict: malformed input is rejected, never stored.

mod blob;
mod commit;
pub mod header;
mod signature;
mod tag;
mod tree;

pub use blob::Blob;
pub use commit::Commit;
pub use signature::{Signature, Timestamp};
pub use tag::Tag;
pub use tree::{EntryMode, Tree, TreeEntry};

use bstr::BString;
use strata_hash::{HashError, ObjectId};

/// Errors produced by object encoding, decoding, and validation.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("invalid object kind: {0}")]
    InvalidKind(BString),

    #[error("invalid object header: {0}")]
    InvalidHeader(String),

    #[error("truncated object: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("invalid tree entry at offset {offset}: {reason}")]
    InvalidTreeEntry { offset: usize, reason: String },

    #[error("duplicate tree entry name: {0}")]
    DuplicateTreeEntry(BString),

    #[error("tree entries out of order at {0}")]
    UnsortedTreeEntry(BString),

    #[error("invalid commit: {0}")]
    InvalidCommit(String),

    #[error("invalid tag: {0}")]
    InvalidTag(String),

    #[error("invalid entry mode: {0}")]
    InvalidEntryMode(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error(transparent)]
    Hash(#[from] HashError),
}

/// The four kinds of objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectKind {
    /// Parse from the kind name used in object headers.
    pub fn from_bytes(s: &[u8]) -> Result<Self, ObjectError> {
        match s {
            b"blob" => Ok(Self::Blob),
            b"tree" => Ok(Self::Tree),
            b"commit" => Ok(Self::Commit),
            b"tag" => Ok(Self::Tag),
            _ => Err(ObjectError::InvalidKind(BString::from(s))),
        }
    }

    /// The canonical kind name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
            Self::Tag => "tag",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ObjectKind {
    type Err = ObjectError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes())
    }
}

/// A decoded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
    Tag(Tag),
}

impl Object {
    /// Decode from enveloped bytes (`"<kind> <size>\0"` + payload).
    pub fn decode(data: &[u8]) -> Result<Self, ObjectError> {
        let (kind, size, header_len) = header::parse_header(data)?;
        let payload = &data[header_len..];
        if payload.len() < size {
            return Err(ObjectError::Truncated {
                expected: size,
                actual: payload.len(),
            });
        }
        Self::decode_payload(kind, &payload[..size])
    }

    /// Decode a payload of known kind (no envelope).
    pub fn decode_payload(kind: ObjectKind, payload: &[u8]) -> Result<Self, ObjectError> {
        match kind {
            ObjectKind::Blob => Ok(Self::Blob(Blob::from_bytes(payload))),
            ObjectKind::Tree => Ok(Self::Tree(Tree::decode(payload)?)),
            ObjectKind::Commit => Ok(Self::Commit(Commit::decode(payload)?)),
            ObjectKind::Tag => Ok(Self::Tag(Tag::decode(payload)?)),
        }
    }

    /// Canonical payload encoding (no envelope).
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Blob(b) => b.data.to_vec(),
            Self::Tree(t) => t.encode(),
            Self::Commit(c) => c.encode(),
            Self::Tag(t) => t.encode(),
        }
    }

    /// Full envelope + payload encoding, the exact bytes the id is taken over.
    pub fn encode_enveloped(&self) -> Vec<u8> {
        let payload = self.encode();
        let hdr = header::write_header(self.kind(), payload.len());
        let mut out = Vec::with_capacity(hdr.len() + payload.len());
        out.extend_from_slice(&hdr);
        out.extend_from_slice(&payload);
        out
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Blob(_) => ObjectKind::Blob,
            Self::Tree(_) => ObjectKind::Tree,
            Self::Commit(_) => ObjectKind::Commit,
            Self::Tag(_) => ObjectKind::Tag,
        }
    }

    /// Compute this object's id from its canonical encoding.
    pub fn id(&self) -> ObjectId {
        strata_hash::hash_object(self.kind().as_str(), &self.encode())
    }

    pub fn as_commit(&self) -> Option<&Commit> {
        match self {
            Self::Commit(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&Tree> {
        match self {
            Self::Tree(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&Blob> {
        match self {
            Self::Blob(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> Option<&Tag> {
        match self {
            Self::Tag(t) => Some(t),
            _ => None,
        }
    }
}
