//! Revision walking: lazy, ordered traversal of the commit graph.
//!
//! A [`Walk`] is an iterator seeded with starting commits; it pops commits
//! according to the requested sort, pushes their parents, and never visits
//! a commit twice (shared ancestors are common, the graph itself is
//! acyclic). Consumers stop pulling whenever they have enough — there is
//! no cancellation primitive and none is needed.

mod merge_base;
mod path_filter;
mod walk;

pub use merge_base::{is_ancestor, merge_base, merge_base_many, merge_base_one};
pub use path_filter::entry_at_path;
pub use walk::Walk;

use strata_hash::ObjectId;

bitflags::bitflags! {
    /// Sort modes, combinable: `TOPOLOGICAL | REVERSE` walks children
    /// before parents, then flips the produced order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Sort: u32 {
        /// Newest committer timestamp first. The default.
        const TIME = 1 << 0;
        /// A commit is emitted only after all its emitted children.
        const TOPOLOGICAL = 1 << 1;
        /// Reverse whatever order the other flags produce.
        const REVERSE = 1 << 2;
    }
}

/// Errors from revision walking.
#[derive(Debug, thiserror::Error)]
pub enum RevWalkError {
    #[error("commit not found: {0}")]
    CommitNotFound(ObjectId),

    #[error("object {0} is not a commit")]
    NotACommit(ObjectId),

    #[error(transparent)]
    Odb(#[from] strata_odb::OdbError),

    #[error(transparent)]
    Repo(#[from] strata_repo::RepoError),
}
