//! Rename detection over a computed delta list.
//!
//! Pairs deleted files with added files: an exact content match (same id)
//! is a 100% rename; otherwise similarity is the proportion of shared
//! lines between the two sides. Pairs at or above the threshold collapse
//! into a single `Renamed` delta whose hunks run old to new.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use strata_odb::ObjectStore;

use crate::hunks::{diff_lines, split_lines};
use crate::{DeltaStatus, DiffError, DiffOptions, FileDelta};

pub(crate) fn pair_renames(
    store: &ObjectStore,
    deltas: &mut Vec<FileDelta>,
    options: &DiffOptions,
) -> Result<(), DiffError> {
    let deleted: Vec<usize> = indexes_with(deltas, DeltaStatus::Deleted);
    let added: Vec<usize> = indexes_with(deltas, DeltaStatus::Added);
    if deleted.is_empty() || added.is_empty() {
        return Ok(());
    }

    // Score all candidate pairs, best first.
    let mut scored: Vec<(u8, usize, usize)> = Vec::new();
    for &di in &deleted {
        for &ai in &added {
            if let Some(score) = similarity(store, &deltas[di], &deltas[ai])? {
                if score >= options.rename_threshold {
                    scored.push((score, di, ai));
                }
            }
        }
    }
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let mut taken_deletes: std::collections::HashSet<usize> = std::collections::HashSet::new();
    let mut taken_adds: std::collections::HashSet<usize> = std::collections::HashSet::new();
    for (score, di, ai) in scored {
        if taken_deletes.contains(&di) || taken_adds.contains(&ai) {
            continue;
        }
        taken_deletes.insert(di);
        taken_adds.insert(ai);

        let old_content = match deltas[di].old_id {
            Some(id) => store.get_blob(&id)?,
            None => Vec::new(),
        };
        let new_content = match deltas[ai].new_id {
            Some(id) => store.get_blob(&id)?,
            None => Vec::new(),
        };

        let renamed = FileDelta {
            status: DeltaStatus::Renamed,
            old_path: deltas[di].old_path.clone(),
            new_path: deltas[ai].new_path.clone(),
            old_id: deltas[di].old_id,
            new_id: deltas[ai].new_id,
            old_mode: deltas[di].old_mode,
            new_mode: deltas[ai].new_mode,
            is_binary: deltas[di].is_binary || deltas[ai].is_binary,
            similarity: Some(score),
            hunks: if deltas[di].is_binary || deltas[ai].is_binary {
                Vec::new()
            } else {
                diff_lines(
                    &old_content,
                    &new_content,
                    options.context_lines,
                    options.interhunk_lines,
                )
            },
        };
        // The add slot becomes the rename; the delete slot is dropped below.
        deltas[ai] = renamed;
    }

    // The add slot of each pair became the rename; its delete slot goes away.
    let mut index = 0;
    deltas.retain(|_| {
        let keep = !taken_deletes.contains(&index);
        index += 1;
        keep
    });

    Ok(())
}

fn indexes_with(deltas: &[FileDelta], status: DeltaStatus) -> Vec<usize> {
    deltas
        .iter()
        .enumerate()
        .filter(|(_, d)| d.status == status)
        .map(|(i, _)| i)
        .collect()
}

/// Similarity in percent, or `None` when the pair is not comparable.
fn similarity(
    store: &ObjectStore,
    deleted: &FileDelta,
    added: &FileDelta,
) -> Result<Option<u8>, DiffError> {
    let (Some(old_id), Some(new_id)) = (deleted.old_id, added.new_id) else {
        return Ok(None);
    };
    if old_id == new_id {
        return Ok(Some(100));
    }
    if deleted.is_binary || added.is_binary {
        return Ok(None);
    }

    let old_content = store.get_blob(&old_id)?;
    let new_content = store.get_blob(&new_id)?;
    if old_content.is_empty() && new_content.is_empty() {
        return Ok(Some(100));
    }

    let old_counts = line_counts(&old_content);
    let new_counts = line_counts(&new_content);
    let total = count_sum(&old_counts) + count_sum(&new_counts);
    if total == 0 {
        return Ok(Some(0));
    }

    let mut shared = 0usize;
    for (line, &count) in &old_counts {
        if let Some(&other) = new_counts.get(line) {
            shared += count.min(other);
        }
    }

    Ok(Some(((200 * shared) / total).min(100) as u8))
}

fn line_counts(data: &[u8]) -> HashMap<u64, usize> {
    let mut counts = HashMap::new();
    for line in split_lines(data) {
        let mut hasher = DefaultHasher::new();
        line.hash(&mut hasher);
        *counts.entry(hasher.finish()).or_insert(0) += 1;
    }
    counts
}

fn count_sum(counts: &HashMap<u64, usize>) -> usize {
    counts.values().sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::diff_trees;
    use strata_hash::ObjectId;
    use strata_object::{EntryMode, Object, ObjectKind, Tree, TreeEntry};

    fn store() -> (tempfile::TempDir, ObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::open(dir.path().join("objects")).unwrap();
        (dir, store)
    }

    fn tree_with(store: &ObjectStore, files: &[(&str, &[u8])]) -> ObjectId {
        let mut tree = Tree::new();
        for (name, content) in files {
            let blob = store.put(ObjectKind::Blob, content).unwrap();
            tree.insert(TreeEntry::new(EntryMode::Regular, *name, blob));
        }
        store.put_object(&Object::Tree(tree)).unwrap()
    }

    #[test]
    fn exact_rename_detected() {
        let (_d, store) = store();
        let old = tree_with(&store, &[("old-name.txt", b"identical content\n")]);
        let new = tree_with(&store, &[("new-name.txt", b"identical content\n")]);

        let diff = diff_trees(&store, Some(&old), Some(&new), &DiffOptions::default()).unwrap();
        assert_eq!(diff.len(), 1);
        let delta = &diff.deltas[0];
        assert_eq!(delta.status, DeltaStatus::Renamed);
        assert_eq!(delta.similarity, Some(100));
        assert_eq!(delta.old_path.as_ref().unwrap(), "old-name.txt");
        assert_eq!(delta.new_path.as_ref().unwrap(), "new-name.txt");
        assert!(delta.hunks.is_empty());
    }

    #[test]
    fn similar_rename_detected_with_edits() {
        let (_d, store) = store();
        let body = b"line1\nline2\nline3\nline4\nline5\nline6\nline7\nline8\n";
        let mut edited = body.to_vec();
        edited.extend_from_slice(b"line9\n");

        let old = tree_with(&store, &[("src.rs", body)]);
        let new = tree_with(&store, &[("moved.rs", &edited)]);

        let diff = diff_trees(&store, Some(&old), Some(&new), &DiffOptions::default()).unwrap();
        assert_eq!(diff.len(), 1);
        let delta = &diff.deltas[0];
        assert_eq!(delta.status, DeltaStatus::Renamed);
        assert!(delta.similarity.unwrap() >= 80);
        assert_eq!(delta.additions(), 1);
    }

    #[test]
    fn dissimilar_files_stay_delete_and_add() {
        let (_d, store) = store();
        let old = tree_with(&store, &[("a.txt", b"completely\ndifferent\ncontent\n")]);
        let new = tree_with(&store, &[("b.txt", b"nothing\nin\ncommon\nhere\n")]);

        let diff = diff_trees(&store, Some(&old), Some(&new), &DiffOptions::default()).unwrap();
        assert_eq!(diff.len(), 2);
        let statuses: Vec<_> = diff.deltas.iter().map(|d| d.status).collect();
        assert!(statuses.contains(&DeltaStatus::Deleted));
        assert!(statuses.contains(&DeltaStatus::Added));
    }

    #[test]
    fn rename_disabled_keeps_pair() {
        let (_d, store) = store();
        let old = tree_with(&store, &[("x", b"same\n")]);
        let new = tree_with(&store, &[("y", b"same\n")]);

        let mut opts = DiffOptions::default();
        opts.detect_renames = false;
        let diff = diff_trees(&store, Some(&old), Some(&new), &opts).unwrap();
        assert_eq!(diff.len(), 2);
    }

    #[test]
    fn best_pairing_wins_with_multiple_candidates() {
        let (_d, store) = store();
        let old = tree_with(
            &store,
            &[
                ("first.txt", b"alpha\nbeta\ngamma\ndelta\n"),
                ("second.txt", b"one\ntwo\nthree\nfour\n"),
            ],
        );
        let new = tree_with(
            &store,
            &[
                ("renamed-first.txt", b"alpha\nbeta\ngamma\ndelta\n"),
                ("renamed-second.txt", b"one\ntwo\nthree\nfour\nfive\n"),
            ],
        );

        let diff = diff_trees(&store, Some(&old), Some(&new), &DiffOptions::default()).unwrap();
        assert_eq!(diff.len(), 2);
        for delta in &diff.deltas {
            assert_eq!(delta.status, DeltaStatus::Renamed);
        }
        let exact = diff
            .deltas
            .iter()
            .find(|d| d.new_path.as_ref().unwrap() == "renamed-first.txt")
            .unwrap();
        assert_eq!(exact.old_path.as_ref().unwrap(), "first.txt");
        assert_eq!(exact.similarity, Some(100));
    }
}
