//! Merge-base computation via the paint-down algorithm.
//!
//! Both starting commits walk their ancestry painting flags; a commit
//! painted by both sides is a common ancestor. Date-ordered processing
//! keeps the walk near the frontier, and a redundancy pass drops common
//! ancestors that are themselves ancestors of other results, leaving the
//! lowest common ancestor(s).

use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use strata_hash::ObjectId;
use strata_repo::Repository;

use crate::RevWalkError;

const PAINT_OURS: u8 = 1;
const PAINT_THEIRS: u8 = 2;
const PAINT_BOTH: u8 = PAINT_OURS | PAINT_THEIRS;
const PAINT_STALE: u8 = 4;

struct PaintEntry {
    id: ObjectId,
    date: i64,
}

impl PartialEq for PaintEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for PaintEntry {}
impl PartialOrd for PaintEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PaintEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.date.cmp(&other.date)
    }
}

/// All lowest common ancestors of `a` and `b`. Usually one; criss-cross
/// histories can produce several. Empty means unrelated histories.
pub fn merge_base(
    repo: &Repository,
    a: &ObjectId,
    b: &ObjectId,
) -> Result<Vec<ObjectId>, RevWalkError> {
    if a == b {
        return Ok(vec![*a]);
    }
    let common = paint_down(repo, a, b)?;
    drop_redundant(repo, common)
}

/// The single preferred merge base, if any.
pub fn merge_base_one(
    repo: &Repository,
    a: &ObjectId,
    b: &ObjectId,
) -> Result<Option<ObjectId>, RevWalkError> {
    Ok(merge_base(repo, a, b)?.into_iter().next())
}

/// Merge base across several heads, folded pairwise.
pub fn merge_base_many(
    repo: &Repository,
    heads: &[ObjectId],
) -> Result<Option<ObjectId>, RevWalkError> {
    let mut heads = heads.iter();
    let Some(first) = heads.next() else {
        return Ok(None);
    };
    let mut base = *first;
    for head in heads {
        match merge_base_one(repo, &base, head)? {
            Some(next) => base = next,
            None => return Ok(None),
        }
    }
    Ok(Some(base))
}

/// Is `ancestor` reachable from `descendant`?
pub fn is_ancestor(
    repo: &Repository,
    ancestor: &ObjectId,
    descendant: &ObjectId,
) -> Result<bool, RevWalkError> {
    if ancestor == descendant {
        return Ok(true);
    }
    reachable(repo, ancestor, descendant)
}

fn paint_down(
    repo: &Repository,
    a: &ObjectId,
    b: &ObjectId,
) -> Result<Vec<ObjectId>, RevWalkError> {
    let mut paint: HashMap<ObjectId, u8> = HashMap::new();
    let mut queue: BinaryHeap<PaintEntry> = BinaryHeap::new();
    let mut common: Vec<ObjectId> = Vec::new();

    let date_of = |repo: &Repository, id: &ObjectId| -> Result<i64, RevWalkError> {
        Ok(commit_of(repo, id)?.committer.when.seconds)
    };

    paint.insert(*a, PAINT_OURS);
    paint.insert(*b, PAINT_THEIRS);
    queue.push(PaintEntry {
        id: *a,
        date: date_of(repo, a)?,
    });
    queue.push(PaintEntry {
        id: *b,
        date: date_of(repo, b)?,
    });

    while let Some(entry) = queue.pop() {
        let flags = paint.get(&entry.id).copied().unwrap_or(0);
        if flags & PAINT_STALE != 0 {
            continue;
        }

        let flags = if flags & PAINT_BOTH == PAINT_BOTH {
            paint.insert(entry.id, flags | PAINT_STALE);
            common.push(entry.id);
            // Ancestors of a common ancestor are common too, but never
            // *lowest*; paint them stale as well as both-sided.
            flags | PAINT_STALE
        } else {
            flags
        };

        let commit = commit_of(repo, &entry.id)?;
        for parent in &commit.parents {
            let current = paint.entry(*parent).or_insert(0);
            let merged = *current | (flags & (PAINT_BOTH | PAINT_STALE));
            if merged != *current {
                *current = merged;
                queue.push(PaintEntry {
                    id: *parent,
                    date: date_of(repo, parent)?,
                });
            }
        }

        if common.len() > 1 && queue.iter().all(|e| {
            paint.get(&e.id).copied().unwrap_or(0) & PAINT_STALE != 0
        }) {
            break;
        }
    }

    Ok(common)
}

/// Remove results that are ancestors of other results.
fn drop_redundant(
    repo: &Repository,
    bases: Vec<ObjectId>,
) -> Result<Vec<ObjectId>, RevWalkError> {
    if bases.len() <= 1 {
        return Ok(bases);
    }

    let mut dropped: HashSet<usize> = HashSet::new();
    for i in 0..bases.len() {
        if dropped.contains(&i) {
            continue;
        }
        for j in 0..bases.len() {
            if i == j || dropped.contains(&j) {
                continue;
            }
            if reachable(repo, &bases[i], &bases[j])? {
                dropped.insert(i);
                break;
            }
        }
    }

    Ok(bases
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !dropped.contains(i))
        .map(|(_, id)| id)
        .collect())
}

/// Plain BFS reachability: is `target` an ancestor of `from`?
fn reachable(
    repo: &Repository,
    target: &ObjectId,
    from: &ObjectId,
) -> Result<bool, RevWalkError> {
    let mut frontier = VecDeque::from([*from]);
    let mut visited: HashSet<ObjectId> = HashSet::from([*from]);

    while let Some(current) = frontier.pop_front() {
        if current == *target {
            return Ok(true);
        }
        let commit = commit_of(repo, &current)?;
        for parent in &commit.parents {
            if visited.insert(*parent) {
                frontier.push_back(*parent);
            }
        }
    }
    Ok(false)
}

fn commit_of(
    repo: &Repository,
    id: &ObjectId,
) -> Result<strata_object::Commit, RevWalkError> {
    match repo.objects().get_commit(id) {
        Ok(c) => Ok(c),
        Err(strata_odb::OdbError::NotFound(id)) => Err(RevWalkError::CommitNotFound(id)),
        Err(strata_odb::OdbError::UnexpectedKind { id, .. }) => Err(RevWalkError::NotACommit(id)),
        Err(e) => Err(e.into()),
    }
}
