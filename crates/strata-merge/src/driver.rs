//! The merge driver: analysis, preference handling, and finalization.

use strata_hash::ObjectId;
use strata_object::{Commit, Object, Signature};
use strata_odb::ObjectStore;
use strata_ref::RefName;
use strata_repo::{Repository, Workspace};

use crate::analysis::{analyze, Classification};
use crate::content::MergeLabels;
use crate::tree_merge::merge_trees;
use crate::{MergeError, MergeOutcome, Preference};

/// Options for a merge invocation.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    pub preference: Preference,
    /// Merge commit message; a default is derived from the heads.
    pub message: Option<String>,
}

/// Merge `heads` into HEAD.
///
/// The flow follows the analysis: up-to-date returns immediately;
/// fast-forward moves the reference and checks out the target tree; a
/// normal merge runs the three-way tree merge, and either reports
/// conflicts (no commit, conflict-marked files land in the workspace) or
/// writes a merge commit and advances the reference. The final reference
/// move re-validates the expected old value, so a racing update on the
/// same branch surfaces as a CAS failure rather than a lost update.
pub fn merge(
    repo: &Repository,
    workspace: &mut dyn Workspace,
    heads: &[ObjectId],
    who: &Signature,
    options: &MergeOptions,
) -> Result<MergeOutcome, MergeError> {
    if heads.is_empty() {
        return Err(MergeError::NoHeads);
    }
    let ours = repo.head_id()?.ok_or(MergeError::UnbornHead)?;

    // An explicit fast-forward-only request cannot be satisfied by an
    // octopus merge at all; fail before doing any work.
    if options.preference == Preference::FastForwardOnly && heads.len() > 1 {
        return Err(MergeError::CannotFastForward("multiple merge heads"));
    }

    let analysis = analyze(repo, &ours, heads)?;

    match analysis.classification {
        Classification::UpToDate => Ok(MergeOutcome::up_to_date()),
        Classification::Unrelated => Err(MergeError::UnrelatedHistories),
        Classification::FastForward if options.preference != Preference::NoFastForward => {
            fast_forward(repo, workspace, ours, heads[0], who)
        }
        Classification::FastForward | Classification::Normal => {
            if options.preference == Preference::FastForwardOnly {
                return Err(MergeError::CannotFastForward("histories have diverged"));
            }
            normal_merge(repo, workspace, ours, heads, &analysis.bases, who, options)
        }
    }
}

fn fast_forward(
    repo: &Repository,
    workspace: &mut dyn Workspace,
    ours: ObjectId,
    target: ObjectId,
    who: &Signature,
) -> Result<MergeOutcome, MergeError> {
    advance_head(
        repo,
        &ours,
        target,
        who,
        &format!("merge: fast-forward to {}", short(&target)),
    )?;

    let old_tree = repo.objects().get_commit(&ours)?.tree;
    let new_tree = repo.objects().get_commit(&target)?.tree;
    checkout_tree(repo.objects(), Some(&old_tree), &new_tree, workspace)?;

    Ok(MergeOutcome::fast_forwarded(target))
}

fn normal_merge(
    repo: &Repository,
    workspace: &mut dyn Workspace,
    ours: ObjectId,
    heads: &[ObjectId],
    bases: &[ObjectId],
    who: &Signature,
    options: &MergeOptions,
) -> Result<MergeOutcome, MergeError> {
    // Criss-cross histories produce several candidate bases; the first
    // (newest-found) one serves as the ancestor.
    let base_tree = match bases.first() {
        Some(base) => Some(repo.objects().get_commit(base)?.tree),
        None => None,
    };
    let our_tree = repo.objects().get_commit(&ours)?.tree;

    // Fold each head into the accumulated tree against the common base.
    let mut merged_tree = our_tree;
    for head in heads {
        let labels = MergeLabels {
            ours: "HEAD".into(),
            theirs: short(head),
        };
        let their_tree = repo.objects().get_commit(head)?.tree;
        let outcome = merge_trees(
            repo.objects(),
            base_tree.as_ref(),
            &merged_tree,
            &their_tree,
            &labels,
        )?;

        if !outcome.is_clean() {
            for (path, content) in &outcome.conflict_files {
                workspace.write_file(
                    path.as_ref(),
                    content,
                    strata_object::EntryMode::Regular,
                )?;
            }
            return Ok(MergeOutcome::conflicted(outcome.conflicts));
        }
        merged_tree = outcome.tree.unwrap_or(merged_tree);
    }

    let message = options.message.clone().unwrap_or_else(|| {
        let named: Vec<String> = heads.iter().map(short).collect();
        format!("Merge {}", named.join(", "))
    });

    let mut parents = Vec::with_capacity(1 + heads.len());
    parents.push(ours);
    parents.extend_from_slice(heads);

    let commit = Commit {
        tree: merged_tree,
        parents,
        author: who.clone(),
        committer: who.clone(),
        signature: None,
        message: message.clone().into(),
    };
    let commit_id = repo.objects().put_object(&Object::Commit(commit))?;

    advance_head(repo, &ours, commit_id, who, &format!("merge: {message}"))?;
    checkout_tree(repo.objects(), Some(&our_tree), &merged_tree, workspace)?;

    Ok(MergeOutcome::merged(commit_id))
}

/// CAS-move whatever HEAD designates from `expected` to `target`.
fn advance_head(
    repo: &Repository,
    expected: &ObjectId,
    target: ObjectId,
    who: &Signature,
    message: &str,
) -> Result<(), MergeError> {
    match repo.head()?.symbolic_target() {
        Some(branch) => repo.refs().update(branch, expected, target, who, message)?,
        None => {
            let head = RefName::new("HEAD")?;
            repo.refs().update(&head, expected, target, who, message)?;
        }
    }
    Ok(())
}

/// Materialize `new_tree` in the workspace, removing files that existed in
/// `old_tree` but not in the target.
fn checkout_tree(
    store: &ObjectStore,
    old_tree: Option<&ObjectId>,
    new_tree: &ObjectId,
    workspace: &mut dyn Workspace,
) -> Result<(), MergeError> {
    let new_files = collect_files(store, new_tree)?;
    for (path, id, mode) in &new_files {
        let content = store.get_blob(id)?;
        workspace.write_file(path.as_ref(), &content, *mode)?;
    }

    if let Some(old_tree) = old_tree {
        for (path, _, _) in collect_files(store, old_tree)? {
            if !new_files.iter().any(|(p, _, _)| *p == path) {
                workspace.remove(path.as_ref())?;
            }
        }
    }
    Ok(())
}

fn collect_files(
    store: &ObjectStore,
    tree_id: &ObjectId,
) -> Result<Vec<(bstr::BString, ObjectId, strata_object::EntryMode)>, MergeError> {
    let mut out = Vec::new();
    let mut stack = vec![(bstr::BString::from(""), *tree_id)];
    while let Some((prefix, id)) = stack.pop() {
        let tree = store.get_tree(&id)?;
        for entry in tree.entries() {
            let path = if prefix.is_empty() {
                entry.name.clone()
            } else {
                let mut p = prefix.clone();
                p.push(b'/');
                p.extend_from_slice(&entry.name);
                p
            };
            if entry.mode.is_directory() {
                stack.push((path, entry.id));
            } else {
                out.push((path, entry.id, entry.mode));
            }
        }
    }
    Ok(out)
}

fn short(id: &ObjectId) -> String {
    id.to_hex()[..8].to_string()
}
