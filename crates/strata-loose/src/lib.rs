//! Loose object storage: one zlib-compressed file per object.
//!
//! Each object lives at `<objects>/XX/YYYY...` where `XX` is the first byte
//! of the id in hex and `YYYY...` is the remainder. The file holds the zlib
//! compression of `"<kind> <size>\0payload"`. Files are written through a
//! temporary file and an atomic rename, so readers never observe a
//! half-written object and concurrent writers of identical content are
//! harmless.

mod enumerate;
mod read;
mod write;

pub use enumerate::LooseIter;

use std::path::{Path, PathBuf};

use strata_hash::ObjectId;

/// Handle to a loose object directory.
pub struct LooseStore {
    objects_dir: PathBuf,
    compression: flate2::Compression,
}

impl LooseStore {
    /// Open the loose store rooted at `objects_dir`. The directory is
    /// created lazily on first write.
    pub fn open(objects_dir: impl AsRef<Path>) -> Self {
        Self {
            objects_dir: objects_dir.as_ref().to_path_buf(),
            compression: flate2::Compression::default(),
        }
    }

    /// Set the zlib compression level (0-9).
    pub fn set_compression_level(&mut self, level: u32) {
        self.compression = flate2::Compression::new(level);
    }

    /// File path for a given id.
    pub fn object_path(&self, id: &ObjectId) -> PathBuf {
        self.objects_dir.join(id.loose_path())
    }

    /// The objects directory this store reads and writes.
    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }
}

/// Errors from loose object operations.
#[derive(Debug, thiserror::Error)]
pub enum LooseError {
    #[error("corrupt loose object {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("decompression failed for {id}: {source}")]
    Decompress {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("object parse error: {0}")]
    Object(#[from] strata_object::ObjectError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
