//! Three-way tree merge.
//!
//! Flattens base, ours, and theirs into path maps and decides each path by
//! the classic rules: one side unchanged takes the other side; both sides
//! identical take either; both sides diverged goes to content merge or a
//! conflict. A clean merge writes the combined tree back to the store.

use std::collections::BTreeMap;

use bstr::BString;
use strata_hash::ObjectId;
use strata_object::{EntryMode, Object, ObjectKind, Tree, TreeEntry};
use strata_odb::ObjectStore;

use crate::content::{merge_content, ContentMergeOutcome, MergeLabels};
use crate::{ConflictEntry, ConflictKind, ConflictSide, MergeError};

/// Result of merging three trees.
#[derive(Debug, Clone)]
pub struct TreeMergeOutcome {
    /// The merged tree, written to the store. `None` when conflicted.
    pub tree: Option<ObjectId>,
    /// All conflicts found.
    pub conflicts: Vec<ConflictEntry>,
    /// Content to place in the workspace for conflicted paths (marker
    /// blocks for content conflicts, the surviving side otherwise).
    pub conflict_files: Vec<(BString, Vec<u8>)>,
}

impl TreeMergeOutcome {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

type PathMap = BTreeMap<BString, ConflictSide>;

/// Merge `ours` and `theirs` against their common ancestor tree.
pub fn merge_trees(
    store: &ObjectStore,
    base: Option<&ObjectId>,
    ours: &ObjectId,
    theirs: &ObjectId,
    labels: &MergeLabels,
) -> Result<TreeMergeOutcome, MergeError> {
    let base_map = match base {
        Some(id) => flatten(store, id)?,
        None => PathMap::new(),
    };
    let our_map = flatten(store, ours)?;
    let their_map = flatten(store, theirs)?;

    let mut paths: Vec<BString> = base_map
        .keys()
        .chain(our_map.keys())
        .chain(their_map.keys())
        .cloned()
        .collect();
    paths.sort();
    paths.dedup();

    let mut kept: Vec<(BString, ConflictSide)> = Vec::new();
    let mut conflicts: Vec<ConflictEntry> = Vec::new();
    let mut conflict_files: Vec<(BString, Vec<u8>)> = Vec::new();

    for path in paths {
        let b = base_map.get(&path).copied();
        let o = our_map.get(&path).copied();
        let t = their_map.get(&path).copied();

        match decide(store, &path, b, o, t, labels)? {
            Decision::Keep(side) => kept.push((path, side)),
            Decision::Drop => {}
            Decision::Conflict { entry, workspace } => {
                if let Some(content) = workspace {
                    conflict_files.push((path, content));
                }
                conflicts.push(entry);
            }
        }
    }

    if !conflicts.is_empty() {
        return Ok(TreeMergeOutcome {
            tree: None,
            conflicts,
            conflict_files,
        });
    }

    let tree = write_nested(store, &kept)?;
    Ok(TreeMergeOutcome {
        tree: Some(tree),
        conflicts: Vec::new(),
        conflict_files: Vec::new(),
    })
}

enum Decision {
    Keep(ConflictSide),
    Drop,
    Conflict {
        entry: ConflictEntry,
        workspace: Option<Vec<u8>>,
    },
}

fn decide(
    store: &ObjectStore,
    path: &BString,
    base: Option<ConflictSide>,
    ours: Option<ConflictSide>,
    theirs: Option<ConflictSide>,
    labels: &MergeLabels,
) -> Result<Decision, MergeError> {
    // Identical on both sides (including both absent): nothing to merge.
    if ours == theirs {
        return Ok(match ours {
            Some(side) => Decision::Keep(side),
            None => Decision::Drop,
        });
    }
    // One side left the path alone: the other side's change wins.
    if base == ours {
        return Ok(match theirs {
            Some(side) => Decision::Keep(side),
            None => Decision::Drop,
        });
    }
    if base == theirs {
        return Ok(match ours {
            Some(side) => Decision::Keep(side),
            None => Decision::Drop,
        });
    }

    // Both sides changed, differently.
    let conflict = |kind, workspace| Decision::Conflict {
        entry: ConflictEntry {
            path: path.clone(),
            kind,
            base,
            ours,
            theirs,
        },
        workspace,
    };

    match (ours, theirs) {
        (Some(our_side), None) => {
            // We modified, they deleted. Our version stays in the workspace.
            let content = store.get_blob(&our_side.id)?;
            Ok(conflict(ConflictKind::ModifyDelete, Some(content)))
        }
        (None, Some(their_side)) => {
            let content = store.get_blob(&their_side.id)?;
            Ok(conflict(ConflictKind::ModifyDelete, Some(content)))
        }
        (Some(our_side), Some(their_side)) => {
            if our_side.mode.is_symlink() != their_side.mode.is_symlink() {
                let content = store.get_blob(&our_side.id)?;
                return Ok(conflict(ConflictKind::TypeChange, Some(content)));
            }

            let base_content = match base {
                Some(side) => store.get_blob(&side.id)?,
                None => Vec::new(),
            };
            let our_content = store.get_blob(&our_side.id)?;
            let their_content = store.get_blob(&their_side.id)?;

            match merge_content(&base_content, &our_content, &their_content, labels) {
                ContentMergeOutcome::Clean(merged) => {
                    let id = store.put(ObjectKind::Blob, &merged)?;
                    let base_mode = base.map(|s| s.mode);
                    let mode = if Some(our_side.mode) != base_mode {
                        our_side.mode
                    } else {
                        their_side.mode
                    };
                    Ok(Decision::Keep(ConflictSide { id, mode }))
                }
                ContentMergeOutcome::Conflicted { content, .. } => {
                    let kind = if base.is_none() {
                        ConflictKind::AddAdd
                    } else {
                        ConflictKind::Content
                    };
                    Ok(conflict(kind, Some(content)))
                }
            }
        }
        (None, None) => Ok(Decision::Drop),
    }
}

/// Flatten a tree to leaf paths. Directories vanish here and are rebuilt
/// from the merged path set afterwards.
fn flatten(store: &ObjectStore, tree_id: &ObjectId) -> Result<PathMap, MergeError> {
    let mut map = PathMap::new();
    let mut stack: Vec<(BString, ObjectId)> = vec![(BString::from(""), *tree_id)];

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
                map.insert(
                    path,
                    ConflictSide {
                        id: entry.id,
                        mode: entry.mode,
                    },
                );
            }
        }
    }
    Ok(map)
}

/// Rebuild a nested tree from flat paths and write every level.
fn write_nested(
    store: &ObjectStore,
    files: &[(BString, ConflictSide)],
) -> Result<ObjectId, MergeError> {
    let mut root = Tree::new();
    let mut subdirs: BTreeMap<BString, Vec<(BString, ConflictSide)>> = BTreeMap::new();

    for (path, side) in files {
        match path.iter().position(|&b| b == b'/') {
            None => {
                root.insert(TreeEntry::new(side.mode, path.clone(), side.id));
            }
            Some(cut) => {
                let dir = BString::from(&path[..cut]);
                let rest = BString::from(&path[cut + 1..]);
                subdirs.entry(dir).or_default().push((rest, *side));
            }
        }
    }

    for (dir, children) in subdirs {
        let child_id = write_nested(store, &children)?;
        root.insert(TreeEntry::new(EntryMode::Directory, dir, child_id));
    }

    Ok(store.put_object(&Object::Tree(root))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::open(dir.path().join("objects")).unwrap();
        (dir, store)
    }

    fn tree_with(store: &ObjectStore, files: &[(&str, &[u8])]) -> ObjectId {
        let flat: Vec<(BString, ConflictSide)> = files
            .iter()
            .map(|(path, content)| {
                let id = store.put(ObjectKind::Blob, content).unwrap();
                (
                    BString::from(*path),
                    ConflictSide {
                        id,
                        mode: EntryMode::Regular,
                    },
                )
            })
            .collect();
        write_nested(store, &flat).unwrap()
    }

    fn labels() -> MergeLabels {
        MergeLabels::default()
    }

    fn blob_at(store: &ObjectStore, tree: &ObjectId, path: &str) -> Vec<u8> {
        let map = flatten(store, tree).unwrap();
        let side = map.get(&BString::from(path)).unwrap();
        store.get_blob(&side.id).unwrap()
    }

    #[test]
    fn disjoint_file_edits_merge_clean() {
        let (_d, store) = store();
        let base = tree_with(&store, &[("a.txt", b"a\n"), ("b.txt", b"b\n")]);
        let ours = tree_with(&store, &[("a.txt", b"a-edited\n"), ("b.txt", b"b\n")]);
        let theirs = tree_with(&store, &[("a.txt", b"a\n"), ("b.txt", b"b-edited\n")]);

        let out = merge_trees(&store, Some(&base), &ours, &theirs, &labels()).unwrap();
        assert!(out.is_clean());
        let tree = out.tree.unwrap();
        assert_eq!(blob_at(&store, &tree, "a.txt"), b"a-edited\n");
        assert_eq!(blob_at(&store, &tree, "b.txt"), b"b-edited\n");
    }

    #[test]
    fn non_overlapping_edits_same_file_merge_clean() {
        let (_d, store) = store();
        let base = tree_with(&store, &[("f", b"1\n2\n3\n4\n5\n")]);
        let ours = tree_with(&store, &[("f", b"ONE\n2\n3\n4\n5\n")]);
        let theirs = tree_with(&store, &[("f", b"1\n2\n3\n4\nFIVE\n")]);

        let out = merge_trees(&store, Some(&base), &ours, &theirs, &labels()).unwrap();
        assert!(out.is_clean());
        assert_eq!(
            blob_at(&store, &out.tree.unwrap(), "f"),
            b"ONE\n2\n3\n4\nFIVE\n"
        );
    }

    #[test]
    fn overlapping_edits_conflict() {
        let (_d, store) = store();
        let base = tree_with(&store, &[("f", b"1\nmid\n3\n")]);
        let ours = tree_with(&store, &[("f", b"1\nours\n3\n")]);
        let theirs = tree_with(&store, &[("f", b"1\ntheirs\n3\n")]);

        let out = merge_trees(&store, Some(&base), &ours, &theirs, &labels()).unwrap();
        assert!(!out.is_clean());
        assert!(out.tree.is_none());
        assert_eq!(out.conflicts.len(), 1);
        assert_eq!(out.conflicts[0].kind, ConflictKind::Content);
        assert_eq!(out.conflicts[0].path, "f");

        let (_, content) = &out.conflict_files[0];
        let text = String::from_utf8_lossy(content);
        assert!(text.contains("<<<<<<<"));
        assert!(text.contains(">>>>>>>"));
    }

    #[test]
    fn addition_on_one_side_survives() {
        let (_d, store) = store();
        let base = tree_with(&store, &[("keep", b"k\n")]);
        let ours = tree_with(&store, &[("keep", b"k\n"), ("new.txt", b"fresh\n")]);
        let theirs = tree_with(&store, &[("keep", b"k\n")]);

        let out = merge_trees(&store, Some(&base), &ours, &theirs, &labels()).unwrap();
        assert!(out.is_clean());
        assert_eq!(blob_at(&store, &out.tree.unwrap(), "new.txt"), b"fresh\n");
    }

    #[test]
    fn deletion_on_one_side_wins_when_other_untouched() {
        let (_d, store) = store();
        let base = tree_with(&store, &[("keep", b"k\n"), ("gone", b"g\n")]);
        let ours = tree_with(&store, &[("keep", b"k\n")]);
        let theirs = tree_with(&store, &[("keep", b"k\n"), ("gone", b"g\n")]);

        let out = merge_trees(&store, Some(&base), &ours, &theirs, &labels()).unwrap();
        assert!(out.is_clean());
        let map = flatten(&store, &out.tree.unwrap()).unwrap();
        assert!(!map.contains_key(&BString::from("gone")));
    }

    #[test]
    fn modify_delete_conflicts() {
        let (_d, store) = store();
        let base = tree_with(&store, &[("f", b"original\n")]);
        let ours = tree_with(&store, &[("f", b"modified\n")]);
        let theirs = tree_with(&store, &[] as &[(&str, &[u8])]);

        let out = merge_trees(&store, Some(&base), &ours, &theirs, &labels()).unwrap();
        assert!(!out.is_clean());
        assert_eq!(out.conflicts[0].kind, ConflictKind::ModifyDelete);
        // The modified side's content is preserved for the workspace.
        assert_eq!(out.conflict_files[0].1, b"modified\n");
    }

    #[test]
    fn both_add_same_content_is_clean() {
        let (_d, store) = store();
        let base = tree_with(&store, &[] as &[(&str, &[u8])]);
        let ours = tree_with(&store, &[("new", b"same\n")]);
        let theirs = tree_with(&store, &[("new", b"same\n")]);

        let out = merge_trees(&store, Some(&base), &ours, &theirs, &labels()).unwrap();
        assert!(out.is_clean());
    }

    #[test]
    fn both_add_different_content_is_add_add() {
        let (_d, store) = store();
        let base = tree_with(&store, &[] as &[(&str, &[u8])]);
        let ours = tree_with(&store, &[("new", b"ours\n")]);
        let theirs = tree_with(&store, &[("new", b"theirs\n")]);

        let out = merge_trees(&store, Some(&base), &ours, &theirs, &labels()).unwrap();
        assert!(!out.is_clean());
        assert_eq!(out.conflicts[0].kind, ConflictKind::AddAdd);
    }

    #[test]
    fn nested_paths_merge_and_rebuild() {
        let (_d, store) = store();
        let base = tree_with(&store, &[("src/lib.rs", b"lib v1\n"), ("src/deep/a.rs", b"a\n")]);
        let ours = tree_with(&store, &[("src/lib.rs", b"lib v2\n"), ("src/deep/a.rs", b"a\n")]);
        let theirs = tree_with(
            &store,
            &[("src/lib.rs", b"lib v1\n"), ("src/deep/a.rs", b"a\n"), ("src/deep/b.rs", b"b\n")],
        );

        let out = merge_trees(&store, Some(&base), &ours, &theirs, &labels()).unwrap();
        assert!(out.is_clean());
        let tree = out.tree.unwrap();
        assert_eq!(blob_at(&store, &tree, "src/lib.rs"), b"lib v2\n");
        assert_eq!(blob_at(&store, &tree, "src/deep/b.rs"), b"b\n");
    }

    #[test]
    fn identical_trees_merge_to_themselves() {
        let (_d, store) = store();
        let base = tree_with(&store, &[("f", b"same\n")]);
        let out = merge_trees(&store, Some(&base), &base, &base, &labels()).unwrap();
        assert!(out.is_clean());
        assert_eq!(out.tree, Some(base));
    }
}
