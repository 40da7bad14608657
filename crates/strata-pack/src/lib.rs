//! Pack storage: many objects in one delta-compressed container.
//!
//! A pack is immutable once written. Each member is stored either whole or
//! as a delta against another member of the same pack, with chain depth
//! bounded so reconstruction cost stays proportional to the bound. A
//! companion index sorted by id gives O(log n) membership tests and offset
//! lookup.
//!
//! Pack file layout:
//!
//! ```text
//! "STRA" u32-version u32-count
//! entry*:
//!   u8 tag          kind 1-4, high bit set for a delta entry
//!   [32-byte base]  delta entries only
//!   varint          uncompressed data length
//!   varint          compressed data length
//!   bytes           zlib(data)    -- data is the payload, or the delta stream
//! ```
//!
//! Index file layout:
//!
//! ```text
//! "STRX" u32-version u32-count
//! record*: 32-byte id, u64 offset, u32 crc32-of-compressed-data   (sorted by id)
//! ```

pub mod delta;

mod build;
mod file;
mod index;

pub use build::{PackBuilder, PackSource};
pub use file::PackFile;
pub use index::{IndexRecord, PackIndex};

use strata_hash::ObjectId;

/// Magic bytes opening a pack file.
pub const PACK_MAGIC: &[u8; 4] = b"STRA";
/// Magic bytes opening an index file.
pub const INDEX_MAGIC: &[u8; 4] = b"STRX";
/// Current format version for both files.
pub const FORMAT_VERSION: u32 = 1;

/// Longest allowed delta chain; resolution refuses deeper references.
pub const MAX_DELTA_DEPTH: usize = 10;
/// How many same-kind neighbors the builder tries as delta bases.
pub const DEFAULT_WINDOW: usize = 10;

/// Errors from pack building and reading.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("object not found in pack: {0}")]
    NotFound(ObjectId),

    #[error("corrupt pack: {0}")]
    Corrupt(String),

    #[error("corrupt pack entry {id}: {reason}")]
    CorruptEntry { id: ObjectId, reason: String },

    #[error("invalid delta at byte {offset}: {reason}")]
    InvalidDelta { offset: usize, reason: String },

    #[error("delta chain for {id} exceeds depth {max}")]
    ChainTooDeep { id: ObjectId, max: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
