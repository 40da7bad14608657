//! Tree-to-tree structural diff.
//!
//! Walks two trees' sorted entries in parallel, recursing into
//! subdirectories, and emits one [`FileDelta`] per changed file. A
//! directory replacing a file (or the reverse) is a delete plus an add;
//! a blob changing between file and symlink at one path is a type change.

use bstr::BString;
use strata_hash::ObjectId;
use strata_object::{EntryMode, Tree, TreeEntry};
use strata_odb::ObjectStore;

use crate::binary::looks_binary;
use crate::hunks::diff_lines;
use crate::rename;
use crate::{DeltaStatus, Diff, DiffError, DiffOptions, FileDelta};

/// Diff two trees. `None` on either side stands for the empty tree (the
/// state before a root commit).
pub fn diff_trees(
    store: &ObjectStore,
    old: Option<&ObjectId>,
    new: Option<&ObjectId>,
    options: &DiffOptions,
) -> Result<Diff, DiffError> {
    let old_tree = match old {
        Some(id) => store.get_tree(id)?,
        None => Tree::new(),
    };
    let new_tree = match new {
        Some(id) => store.get_tree(id)?,
        None => Tree::new(),
    };

    let mut deltas = Vec::new();
    walk(store, old_tree.entries(), new_tree.entries(), b"", options, &mut deltas)?;

    if options.detect_renames {
        rename::pair_renames(store, &mut deltas, options)?;
    }

    deltas.sort_by(|a, b| a.path().cmp(b.path()));
    Ok(Diff { deltas })
}

fn walk(
    store: &ObjectStore,
    old_entries: &[TreeEntry],
    new_entries: &[TreeEntry],
    prefix: &[u8],
    options: &DiffOptions,
    deltas: &mut Vec<FileDelta>,
) -> Result<(), DiffError> {
    let mut oi = 0;
    let mut ni = 0;

    loop {
        match (old_entries.get(oi), new_entries.get(ni)) {
            (None, None) => return Ok(()),
            (Some(old), None) => {
                emit_side(store, old, prefix, options, DeltaStatus::Deleted, deltas)?;
                oi += 1;
            }
            (None, Some(new)) => {
                emit_side(store, new, prefix, options, DeltaStatus::Added, deltas)?;
                ni += 1;
            }
            (Some(old), Some(new)) => match old.name.cmp(&new.name) {
                std::cmp::Ordering::Less => {
                    emit_side(store, old, prefix, options, DeltaStatus::Deleted, deltas)?;
                    oi += 1;
                }
                std::cmp::Ordering::Greater => {
                    emit_side(store, new, prefix, options, DeltaStatus::Added, deltas)?;
                    ni += 1;
                }
                std::cmp::Ordering::Equal => {
                    emit_matched(store, old, new, prefix, options, deltas)?;
                    oi += 1;
                    ni += 1;
                }
            },
        }
    }
}

fn emit_matched(
    store: &ObjectStore,
    old: &TreeEntry,
    new: &TreeEntry,
    prefix: &[u8],
    options: &DiffOptions,
    deltas: &mut Vec<FileDelta>,
) -> Result<(), DiffError> {
    if old.id == new.id && old.mode == new.mode {
        return Ok(());
    }

    match (old.mode.is_directory(), new.mode.is_directory()) {
        (true, true) => {
            let old_tree = store.get_tree(&old.id)?;
            let new_tree = store.get_tree(&new.id)?;
            let child_prefix = join(prefix, &old.name);
            walk(
                store,
                old_tree.entries(),
                new_tree.entries(),
                &child_prefix,
                options,
                deltas,
            )
        }
        (false, false) => {
            let path = join(prefix, &old.name);
            if !options.matches_path(&path) {
                return Ok(());
            }
            let status = if old.mode.is_symlink() != new.mode.is_symlink() {
                DeltaStatus::TypeChanged
            } else {
                DeltaStatus::Modified
            };
            deltas.push(file_delta(store, status, Some((old, &path)), Some((new, &path)), options)?);
            Ok(())
        }
        // A file became a directory or vice versa: report both sides.
        (true, false) => {
            emit_side(store, old, prefix, options, DeltaStatus::Deleted, deltas)?;
            emit_side(store, new, prefix, options, DeltaStatus::Added, deltas)
        }
        (false, true) => {
            emit_side(store, old, prefix, options, DeltaStatus::Deleted, deltas)?;
            emit_side(store, new, prefix, options, DeltaStatus::Added, deltas)
        }
    }
}

/// Emit an entry present on only one side, recursing into directories.
fn emit_side(
    store: &ObjectStore,
    entry: &TreeEntry,
    prefix: &[u8],
    options: &DiffOptions,
    status: DeltaStatus,
    deltas: &mut Vec<FileDelta>,
) -> Result<(), DiffError> {
    let path = join(prefix, &entry.name);

    if entry.mode.is_directory() {
        let tree = store.get_tree(&entry.id)?;
        for child in tree.entries() {
            emit_side(store, child, &path, options, status, deltas)?;
        }
        return Ok(());
    }

    if !options.matches_path(&path) {
        return Ok(());
    }
    let (old, new) = match status {
        DeltaStatus::Deleted => (Some((entry, &path)), None),
        _ => (None, Some((entry, &path))),
    };
    deltas.push(file_delta(store, status, old, new, options)?);
    Ok(())
}

/// Build a delta record, computing hunks unless either side is binary.
pub(crate) fn file_delta(
    store: &ObjectStore,
    status: DeltaStatus,
    old: Option<(&TreeEntry, &BString)>,
    new: Option<(&TreeEntry, &BString)>,
    options: &DiffOptions,
) -> Result<FileDelta, DiffError> {
    let old_content = match old {
        Some((entry, _)) => store.get_blob(&entry.id)?,
        None => Vec::new(),
    };
    let new_content = match new {
        Some((entry, _)) => store.get_blob(&entry.id)?,
        None => Vec::new(),
    };

    build_delta(
        status,
        old.map(|(e, p)| ((*p).clone(), e.id, e.mode)),
        new.map(|(e, p)| ((*p).clone(), e.id, e.mode)),
        &old_content,
        &new_content,
        options,
    )
}

/// Shared assembly for tree and workspace diffs.
pub(crate) fn build_delta(
    status: DeltaStatus,
    old: Option<(BString, ObjectId, EntryMode)>,
    new: Option<(BString, ObjectId, EntryMode)>,
    old_content: &[u8],
    new_content: &[u8],
    options: &DiffOptions,
) -> Result<FileDelta, DiffError> {
    let is_binary = looks_binary(old_content, options.binary_threshold)
        || looks_binary(new_content, options.binary_threshold);

    let hunks = if is_binary {
        Vec::new()
    } else {
        diff_lines(
            old_content,
            new_content,
            options.context_lines,
            options.interhunk_lines,
        )
    };

    Ok(FileDelta {
        status,
        old_path: old.as_ref().map(|(p, _, _)| p.clone()),
        new_path: new.as_ref().map(|(p, _, _)| p.clone()),
        old_id: old.as_ref().map(|(_, id, _)| *id),
        new_id: new.as_ref().map(|(_, id, _)| *id),
        old_mode: old.as_ref().map(|(_, _, m)| *m),
        new_mode: new.as_ref().map(|(_, _, m)| *m),
        is_binary,
        similarity: None,
        hunks,
    })
}

fn join(prefix: &[u8], name: &BString) -> BString {
    if prefix.is_empty() {
        name.clone()
    } else {
        let mut path = BString::from(prefix);
        path.push(b'/');
        path.extend_from_slice(name);
        path
    }
}
