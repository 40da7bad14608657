//! Merge classification: what kind of merge would this be?

use strata_hash::ObjectId;
use strata_repo::Repository;
use strata_revwalk::{is_ancestor, merge_base, merge_base_many};

use crate::MergeError;

/// Topological classification of a proposed merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Every merge head is already an ancestor of ours; nothing to do.
    UpToDate,
    /// Ours is an ancestor of the single merge head; the ref can simply
    /// move forward.
    FastForward,
    /// Histories diverged; a real merge is needed.
    Normal,
    /// No common ancestor at all.
    Unrelated,
}

/// The analysis result: classification plus the merge base(s) found.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub classification: Classification,
    /// Lowest common ancestors of ours and the heads. Empty for
    /// `Unrelated`; several entries mean criss-cross history.
    pub bases: Vec<ObjectId>,
}

/// Classify merging `heads` into `ours`.
pub fn analyze(
    repo: &Repository,
    ours: &ObjectId,
    heads: &[ObjectId],
) -> Result<Analysis, MergeError> {
    if heads.is_empty() {
        return Err(MergeError::NoHeads);
    }

    // Up to date: all heads already reachable from ours.
    let mut all_reachable = true;
    for head in heads {
        if !is_ancestor(repo, head, ours)? {
            all_reachable = false;
            break;
        }
    }
    if all_reachable {
        return Ok(Analysis {
            classification: Classification::UpToDate,
            bases: vec![*ours],
        });
    }

    // Fast-forward: ours is an ancestor of the single head.
    if heads.len() == 1 && is_ancestor(repo, ours, &heads[0])? {
        return Ok(Analysis {
            classification: Classification::FastForward,
            bases: vec![*ours],
        });
    }

    let bases = if heads.len() == 1 {
        merge_base(repo, ours, &heads[0])?
    } else {
        let mut all = vec![*ours];
        all.extend_from_slice(heads);
        merge_base_many(repo, &all)?.into_iter().collect()
    };

    if bases.is_empty() {
        return Ok(Analysis {
            classification: Classification::Unrelated,
            bases,
        });
    }

    Ok(Analysis {
        classification: Classification::Normal,
        bases,
    })
}
