//! The diff engine: structured deltas between trees, blobs, and the
//! workspace.
//!
//! A [`Diff`] is an ordered list of per-file changes; each text change
//! carries hunks of line-level edits computed by a Myers
//! longest-common-subsequence matcher. Binary content (NUL bytes early in
//! the payload, or anything over the size threshold) is flagged instead of
//! hunked.

pub mod myers;

mod binary;
mod hunks;
mod rename;
mod tree;
mod workspace;

pub use binary::looks_binary;
pub use hunks::{diff_lines, split_lines};
pub use tree::diff_trees;
pub use workspace::diff_tree_workspace;

use bstr::BString;
use strata_hash::ObjectId;
use strata_object::EntryMode;

/// Options controlling diff behavior.
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Unchanged lines shown around each hunk.
    pub context_lines: u32,
    /// Hunks separated by at most this many unchanged lines (beyond the
    /// shared context) are merged into one.
    pub interhunk_lines: u32,
    /// Restrict output to these paths (exact file match, or a directory
    /// prefix). Empty = everything.
    pub paths: Vec<BString>,
    /// Content larger than this is treated as binary.
    pub binary_threshold: usize,
    /// Pair up deleted and added files with similar content as renames.
    pub detect_renames: bool,
    /// Minimum similarity (percent) for a rename pair.
    pub rename_threshold: u8,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            context_lines: 3,
            interhunk_lines: 0,
            paths: Vec::new(),
            binary_threshold: 8 * 1024 * 1024,
            detect_renames: true,
            rename_threshold: 50,
        }
    }
}

impl DiffOptions {
    /// Does `path` pass the path filter?
    pub(crate) fn matches_path(&self, path: &[u8]) -> bool {
        if self.paths.is_empty() {
            return true;
        }
        self.paths.iter().any(|pattern| {
            let pattern: &[u8] = pattern.as_ref();
            path == pattern
                || (path.len() > pattern.len()
                    && path.starts_with(pattern)
                    && path[pattern.len()] == b'/')
        })
    }
}

/// File-level change classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaStatus {
    Added,
    Deleted,
    Modified,
    Renamed,
    TypeChanged,
}

/// Where a diff line comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOrigin {
    Context,
    Addition,
    Deletion,
}

/// One line of a hunk, with its position on each side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub origin: LineOrigin,
    /// 1-based line number in the old content; `None` for additions.
    pub old_lineno: Option<u32>,
    /// 1-based line number in the new content; `None` for deletions.
    pub new_lineno: Option<u32>,
    /// Line content including its newline, if it had one.
    pub content: BString,
}

/// A contiguous run of changes with surrounding context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    /// `@@ -a,b +c,d @@` rendering of the ranges.
    pub header: String,
    pub lines: Vec<DiffLine>,
}

/// The change record for one file.
#[derive(Debug, Clone)]
pub struct FileDelta {
    pub status: DeltaStatus,
    pub old_path: Option<BString>,
    pub new_path: Option<BString>,
    pub old_id: Option<ObjectId>,
    pub new_id: Option<ObjectId>,
    pub old_mode: Option<EntryMode>,
    pub new_mode: Option<EntryMode>,
    pub is_binary: bool,
    /// Similarity percentage, set on renames.
    pub similarity: Option<u8>,
    /// Empty for binary files.
    pub hunks: Vec<Hunk>,
}

impl FileDelta {
    /// The path to report: the new one when present.
    pub fn path(&self) -> &BString {
        self.new_path
            .as_ref()
            .or(self.old_path.as_ref())
            .expect("a delta always has at least one path")
    }

    pub fn additions(&self) -> usize {
        self.count_origin(LineOrigin::Addition)
    }

    pub fn deletions(&self) -> usize {
        self.count_origin(LineOrigin::Deletion)
    }

    fn count_origin(&self, origin: LineOrigin) -> usize {
        self.hunks
            .iter()
            .flat_map(|h| &h.lines)
            .filter(|l| l.origin == origin)
            .count()
    }
}

/// An ordered sequence of file deltas.
#[derive(Debug, Clone, Default)]
pub struct Diff {
    pub deltas: Vec<FileDelta>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    /// Deltas with the given status.
    pub fn with_status(&self, status: DeltaStatus) -> impl Iterator<Item = &FileDelta> {
        self.deltas.iter().filter(move |d| d.status == status)
    }
}

/// Errors from diff operations.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    #[error(transparent)]
    Odb(#[from] strata_odb::OdbError),

    #[error("workspace error: {0}")]
    Workspace(#[from] strata_repo::WorkspaceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_filter_semantics() {
        let mut opts = DiffOptions::default();
        assert!(opts.matches_path(b"anything"));

        opts.paths = vec![BString::from("src"), BString::from("README.md")];
        assert!(opts.matches_path(b"src/lib.rs"));
        assert!(opts.matches_path(b"src"));
        assert!(opts.matches_path(b"README.md"));
        assert!(!opts.matches_path(b"srcx/lib.rs"));
        assert!(!opts.matches_path(b"docs/README.md"));
    }

    #[test]
    fn delta_line_counts() {
        let delta = FileDelta {
            status: DeltaStatus::Modified,
            old_path: Some("f".into()),
            new_path: Some("f".into()),
            old_id: None,
            new_id: None,
            old_mode: None,
            new_mode: None,
            is_binary: false,
            similarity: None,
            hunks: vec![Hunk {
                old_start: 1,
                old_lines: 2,
                new_start: 1,
                new_lines: 2,
                header: "@@ -1,2 +1,2 @@".into(),
                lines: vec![
                    DiffLine {
                        origin: LineOrigin::Context,
                        old_lineno: Some(1),
                        new_lineno: Some(1),
                        content: "same\n".into(),
                    },
                    DiffLine {
                        origin: LineOrigin::Deletion,
                        old_lineno: Some(2),
                        new_lineno: None,
                        content: "old\n".into(),
                    },
                    DiffLine {
                        origin: LineOrigin::Addition,
                        old_lineno: None,
                        new_lineno: Some(2),
                        content: "new\n".into(),
                    },
                ],
            }],
        };
        assert_eq!(delta.additions(), 1);
        assert_eq!(delta.deletions(), 1);
        assert_eq!(delta.path(), "f");
    }
}
