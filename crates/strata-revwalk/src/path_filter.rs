//! Path lookup inside trees, for path-filtered walks.

use bstr::{BStr, ByteSlice};
use strata_hash::ObjectId;
use strata_repo::Repository;

use crate::RevWalkError;

/// Resolve a (possibly nested) path inside a tree to the id stored there.
///
/// Returns `Ok(None)` when the path does not exist in the tree. A path
/// component that lands on a non-directory entry ends the search the same
/// way: nothing lives below a file.
pub fn entry_at_path(
    repo: &Repository,
    tree_id: &ObjectId,
    path: &BStr,
) -> Result<Option<ObjectId>, RevWalkError> {
    let mut current = *tree_id;
    let mut components = path.split_str("/").peekable();

    while let Some(component) = components.next() {
        let tree = repo.objects().get_tree(&current)?;
        let Some(entry) = tree.get(component.as_bstr()) else {
            return Ok(None);
        };
        if components.peek().is_none() {
            return Ok(Some(entry.id));
        }
        if !entry.mode.is_directory() {
            return Ok(None);
        }
        current = entry.id;
    }
    Ok(None)
}
