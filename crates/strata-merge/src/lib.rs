//! The merge engine.
//!
//! A merge runs as a small state machine: classify the topology (up to
//! date, fast-forwardable, or a real merge), resolve the caller's
//! fast-forward preference against that classification, then either move
//! the reference (fast-forward) or run a three-way tree merge and build a
//! merge commit. Conflicts are a normal terminal state — the outcome
//! carries them and no commit is created; only I/O and corruption abort.

mod analysis;
mod content;
mod driver;
mod tree_merge;

pub use analysis::{analyze, Analysis, Classification};
pub use content::{merge_content, ContentMergeOutcome, MergeLabels};
pub use driver::{merge, MergeOptions};
pub use tree_merge::{merge_trees, TreeMergeOutcome};

use bstr::BString;
use strata_hash::ObjectId;
use strata_object::EntryMode;

/// Caller preference for how a merge may resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preference {
    /// Fast-forward when possible, merge commit otherwise.
    #[default]
    Auto,
    /// Always create a merge commit, even when fast-forward is possible.
    NoFastForward,
    /// Only fast-forward; a merge that needs a commit is an error.
    FastForwardOnly,
}

/// Result of a merge invocation. Exactly one success shape holds: up to
/// date, fast-forward, a new merge commit, or conflicted.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub up_to_date: bool,
    pub fast_forward: bool,
    pub conflicted: bool,
    /// The commit the reference now points at (fast-forward target or the
    /// new merge commit); `None` when up to date or conflicted.
    pub resulting_commit: Option<ObjectId>,
    /// Conflict details when `conflicted`.
    pub conflicts: Vec<ConflictEntry>,
}

impl MergeOutcome {
    pub(crate) fn up_to_date() -> Self {
        Self {
            up_to_date: true,
            fast_forward: false,
            conflicted: false,
            resulting_commit: None,
            conflicts: Vec::new(),
        }
    }

    pub(crate) fn fast_forwarded(target: ObjectId) -> Self {
        Self {
            up_to_date: false,
            fast_forward: true,
            conflicted: false,
            resulting_commit: Some(target),
            conflicts: Vec::new(),
        }
    }

    pub(crate) fn merged(commit: ObjectId) -> Self {
        Self {
            up_to_date: false,
            fast_forward: false,
            conflicted: false,
            resulting_commit: Some(commit),
            conflicts: Vec::new(),
        }
    }

    pub(crate) fn conflicted(conflicts: Vec<ConflictEntry>) -> Self {
        Self {
            up_to_date: false,
            fast_forward: false,
            conflicted: true,
            resulting_commit: None,
            conflicts,
        }
    }
}

/// How a path conflicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Both sides edited the same region.
    Content,
    /// One side modified, the other deleted.
    ModifyDelete,
    /// Both sides added the path with different content.
    AddAdd,
    /// The entry kind diverged (file vs symlink).
    TypeChange,
    /// A file on one side collides with a directory on the other.
    DirectoryFile,
}

/// One side's version of a conflicted path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictSide {
    pub id: ObjectId,
    pub mode: EntryMode,
}

/// A file-level conflict.
#[derive(Debug, Clone)]
pub struct ConflictEntry {
    pub path: BString,
    pub kind: ConflictKind,
    pub base: Option<ConflictSide>,
    pub ours: Option<ConflictSide>,
    pub theirs: Option<ConflictSide>,
}

/// Errors from merge operations. Conflicts are NOT here — they are a
/// normal outcome.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("cannot fast-forward: {0}")]
    CannotFastForward(&'static str),

    #[error("no common ancestor; refusing to merge unrelated histories")]
    UnrelatedHistories,

    #[error("HEAD is unborn; nothing to merge into")]
    UnbornHead,

    #[error("no merge heads given")]
    NoHeads,

    #[error(transparent)]
    RevWalk(#[from] strata_revwalk::RevWalkError),

    #[error(transparent)]
    Diff(#[from] strata_diff::DiffError),

    #[error(transparent)]
    Odb(#[from] strata_odb::OdbError),

    #[error(transparent)]
    Ref(#[from] strata_ref::RefError),

    #[error(transparent)]
    Repo(#[from] strata_repo::RepoError),

    #[error("workspace error: {0}")]
    Workspace(#[from] strata_repo::WorkspaceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_shapes_are_mutually_exclusive() {
        let u = MergeOutcome::up_to_date();
        assert!(u.up_to_date && !u.fast_forward && !u.conflicted);
        assert!(u.resulting_commit.is_none());

        let id = ObjectId::from_bytes(&[1; 32]).unwrap();
        let f = MergeOutcome::fast_forwarded(id);
        assert!(!f.up_to_date && f.fast_forward && !f.conflicted);
        assert_eq!(f.resulting_commit, Some(id));

        let m = MergeOutcome::merged(id);
        assert!(!m.up_to_date && !m.fast_forward && !m.conflicted);
        assert_eq!(m.resulting_commit, Some(id));

        let c = MergeOutcome::conflicted(Vec::new());
        assert!(!c.up_to_date && !c.fast_forward && c.conflicted);
        assert!(c.resulting_commit.is_none());
    }

    #[test]
    fn default_preference_is_auto() {
        assert_eq!(Preference::default(), Preference::Auto);
    }
}
