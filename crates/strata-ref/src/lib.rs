//! The reference store: mutable, named pointers into the object graph.
//!
//! A reference is either direct (names an object id) or symbolic (names
//! another reference, as HEAD usually does). References are the only
//! mutable state in the system, so their update path carries the one
//! mandatory synchronization point: every change goes through a per-ref
//! lock file and a compare-and-swap check against the caller's expected
//! old value. Two racing updates cannot both win; the loser sees
//! `CasMismatch` and must re-read.
//!
//! Every successful create, update, and delete appends one entry to the
//! reference's append-only reflog.

mod lockfile;
mod name;
mod packed;
mod reflog;
mod store;

pub use lockfile::LockFile;
pub use name::RefName;
pub use packed::PackedRefs;
pub use reflog::ReflogEntry;
pub use store::RefStore;

use strata_hash::ObjectId;

/// Symbolic chains longer than this fail with `TooManyRedirects`.
pub const MAX_SYMREF_HOPS: usize = 5;

/// A named pointer: direct to an object, or symbolic to another ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Direct { name: RefName, target: ObjectId },
    Symbolic { name: RefName, target: RefName },
}

impl Reference {
    pub fn name(&self) -> &RefName {
        match self {
            Reference::Direct { name, .. } => name,
            Reference::Symbolic { name, .. } => name,
        }
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, Reference::Symbolic { .. })
    }

    /// Target id, if direct.
    pub fn target_id(&self) -> Option<ObjectId> {
        match self {
            Reference::Direct { target, .. } => Some(*target),
            Reference::Symbolic { .. } => None,
        }
    }

    /// Target ref name, if symbolic.
    pub fn symbolic_target(&self) -> Option<&RefName> {
        match self {
            Reference::Symbolic { target, .. } => Some(target),
            Reference::Direct { .. } => None,
        }
    }
}

/// Errors from reference operations.
#[derive(Debug, thiserror::Error)]
pub enum RefError {
    #[error("reference not found: {0}")]
    NotFound(String),

    #[error("reference already exists: {0}")]
    AlreadyExists(String),

    #[error("compare-and-swap failed on {name}: expected {expected}, found {actual}")]
    CasMismatch {
        name: String,
        expected: ObjectId,
        actual: ObjectId,
    },

    #[error("symbolic chain from {0} exceeds {MAX_SYMREF_HOPS} hops")]
    TooManyRedirects(String),

    #[error("reference {0} is symbolic; resolve it before updating")]
    NotDirect(String),

    #[error("invalid reference name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("reference {0} is locked by another writer")]
    Locked(String),

    #[error("malformed reference data: {0}")]
    Parse(String),

    #[error(transparent)]
    Hash(#[from] strata_hash::HashError),

    #[error("invalid reflog signature: {0}")]
    Signature(#[from] strata_object::ObjectError),

    #[error("{path}: {source}")]
    IoPath {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
