//! Diffing a tree against the workspace collaborator.

use bstr::BString;
use strata_hash::ObjectId;
use strata_object::{EntryMode, Tree, TreeEntry};
use strata_odb::ObjectStore;
use strata_repo::{TrackedFile, Workspace, WorkspaceStatus};

use crate::tree::build_delta;
use crate::{DeltaStatus, Diff, DiffError, DiffOptions};

/// Diff a tree against a workspace.
///
/// The workspace reports which paths changed relative to the tracked set;
/// hunks come from comparing stored blobs against workspace bytes.
pub fn diff_tree_workspace(
    store: &ObjectStore,
    tree: Option<&ObjectId>,
    workspace: &dyn Workspace,
    options: &DiffOptions,
) -> Result<Diff, DiffError> {
    let mut tracked = Vec::new();
    if let Some(tree) = tree {
        flatten(store, tree, b"", &mut tracked)?;
    }

    let mut deltas = Vec::new();
    for status in workspace.list_changed(&tracked)? {
        if !options.matches_path(status.path()) {
            continue;
        }
        match status {
            WorkspaceStatus::Added(path) => {
                let content = workspace.read_file(path.as_ref())?.unwrap_or_default();
                let id = strata_hash::hash_object("blob", &content);
                deltas.push(build_delta(
                    DeltaStatus::Added,
                    None,
                    Some((path, id, EntryMode::Regular)),
                    &[],
                    &content,
                    options,
                )?);
            }
            WorkspaceStatus::Removed(path) => {
                let file = tracked_file(&tracked, &path)?;
                let content = store.get_blob(&file.id)?;
                deltas.push(build_delta(
                    DeltaStatus::Deleted,
                    Some((path, file.id, file.mode)),
                    None,
                    &content,
                    &[],
                    options,
                )?);
            }
            WorkspaceStatus::Modified(path) => {
                let file = tracked_file(&tracked, &path)?;
                let old_content = store.get_blob(&file.id)?;
                let new_content = workspace.read_file(path.as_ref())?.unwrap_or_default();
                let new_id = strata_hash::hash_object("blob", &new_content);
                deltas.push(build_delta(
                    DeltaStatus::Modified,
                    Some((path.clone(), file.id, file.mode)),
                    Some((path, new_id, file.mode)),
                    &old_content,
                    &new_content,
                    options,
                )?);
            }
        }
    }

    deltas.sort_by(|a, b| a.path().cmp(b.path()));
    Ok(Diff { deltas })
}

fn tracked_file<'a>(
    tracked: &'a [TrackedFile],
    path: &BString,
) -> Result<&'a TrackedFile, DiffError> {
    // list_changed may only report tracked paths as removed or modified.
    tracked.iter().find(|f| &f.path == path).ok_or_else(|| {
        DiffError::Workspace(strata_repo::WorkspaceError::NotFound(path.clone()))
    })
}

/// Flatten a tree into tracked files, depth first.
fn flatten(
    store: &ObjectStore,
    tree_id: &ObjectId,
    prefix: &[u8],
    out: &mut Vec<TrackedFile>,
) -> Result<(), DiffError> {
    let tree: Tree = store.get_tree(tree_id)?;
    for entry in tree.entries() {
        let path = join(prefix, entry);
        if entry.mode.is_directory() {
            flatten(store, &entry.id, &path, out)?;
        } else {
            out.push(TrackedFile {
                path,
                id: entry.id,
                mode: entry.mode,
            });
        }
    }
    Ok(())
}

fn join(prefix: &[u8], entry: &TreeEntry) -> BString {
    if prefix.is_empty() {
        entry.name.clone()
    } else {
        let mut path = BString::from(prefix);
        path.push(b'/');
        path.extend_from_slice(&entry.name);
        path
    }
}
