//! Myers O(ND) shortest-edit-script computation over line sequences.
//!
//! Works on pre-hashed lines so the inner loop compares integers; actual
//! byte equality is re-checked only on hash matches. Common prefix and
//! suffix are peeled off before the quadratic part runs.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// One step of the edit script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    /// Line present on both sides.
    Equal,
    /// Line only in the new sequence.
    Insert,
    /// Line only in the old sequence.
    Delete,
}

/// An edit referencing lines by index into the two sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edit {
    pub op: EditOp,
    /// Index into the old sequence (valid for Equal and Delete).
    pub old_index: usize,
    /// Index into the new sequence (valid for Equal and Insert).
    pub new_index: usize,
}

fn line_hash(line: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    line.hash(&mut hasher);
    hasher.finish()
}

/// Compute the edit script transforming `old` into `new`.
pub fn diff(old: &[&[u8]], new: &[&[u8]]) -> Vec<Edit> {
    let old_hashes: Vec<u64> = old.iter().map(|l| line_hash(l)).collect();
    let new_hashes: Vec<u64> = new.iter().map(|l| line_hash(l)).collect();

    let eq = |i: usize, j: usize| old_hashes[i] == new_hashes[j] && old[i] == new[j];

    // Peel common prefix.
    let mut prefix = 0;
    while prefix < old.len() && prefix < new.len() && eq(prefix, prefix) {
        prefix += 1;
    }
    // Peel common suffix.
    let mut suffix = 0;
    while suffix < old.len() - prefix
        && suffix < new.len() - prefix
        && eq(old.len() - 1 - suffix, new.len() - 1 - suffix)
    {
        suffix += 1;
    }

    let mut edits = Vec::with_capacity(old.len().max(new.len()));
    for i in 0..prefix {
        edits.push(Edit {
            op: EditOp::Equal,
            old_index: i,
            new_index: i,
        });
    }

    let core = shortest_edit_script(
        &old[prefix..old.len() - suffix],
        &new[prefix..new.len() - suffix],
        &old_hashes[prefix..old.len() - suffix],
        &new_hashes[prefix..new.len() - suffix],
    );
    edits.extend(core.into_iter().map(|e| Edit {
        op: e.op,
        old_index: e.old_index + prefix,
        new_index: e.new_index + prefix,
    }));

    for i in 0..suffix {
        edits.push(Edit {
            op: EditOp::Equal,
            old_index: old.len() - suffix + i,
            new_index: new.len() - suffix + i,
        });
    }

    edits
}

/// Classic Myers with a saved trace for backtracking.
fn shortest_edit_script(
    old: &[&[u8]],
    new: &[&[u8]],
    old_hashes: &[u64],
    new_hashes: &[u64],
) -> Vec<Edit> {
    let n = old.len();
    let m = new.len();
    if n == 0 {
        return (0..m)
            .map(|j| Edit {
                op: EditOp::Insert,
                old_index: 0,
                new_index: j,
            })
            .collect();
    }
    if m == 0 {
        return (0..n)
            .map(|i| Edit {
                op: EditOp::Delete,
                old_index: i,
                new_index: 0,
            })
            .collect();
    }

    let eq = |i: usize, j: usize| old_hashes[i] == new_hashes[j] && old[i] == new[j];

    let max = n + m;
    let offset = max as isize;
    let width = 2 * max + 1;
    // frontier[k + offset] = furthest x reached on diagonal k.
    let mut frontier = vec![0usize; width];
    let mut trace: Vec<Vec<usize>> = Vec::new();

    'search: for d in 0..=max {
        let mut snapshot = frontier.clone();
        let mut k = -(d as isize);
        while k <= d as isize {
            let take_down = k == -(d as isize)
                || (k != d as isize
                    && frontier[(k - 1 + offset) as usize] < frontier[(k + 1 + offset) as usize]);
            let mut x = if take_down {
                frontier[(k + 1 + offset) as usize]
            } else {
                frontier[(k - 1 + offset) as usize] + 1
            };
            let mut y = (x as isize - k) as usize;

            while x < n && y < m && eq(x, y) {
                x += 1;
                y += 1;
            }

            snapshot[(k + offset) as usize] = x;

            if x >= n && y >= m {
                trace.push(snapshot);
                break 'search;
            }
            k += 2;
        }
        trace.push(snapshot.clone());
        frontier = snapshot;
    }

    backtrack(&trace, n, m, offset)
}

fn backtrack(trace: &[Vec<usize>], n: usize, m: usize, offset: isize) -> Vec<Edit> {
    let mut edits = Vec::new();
    let mut x = n;
    let mut y = m;

    for d in (0..trace.len()).rev() {
        let k = x as isize - y as isize;
        let came_down = d > 0
            && (k == -(d as isize)
                || (k != d as isize
                    && trace[d - 1][(k - 1 + offset) as usize]
                        < trace[d - 1][(k + 1 + offset) as usize]));
        let prev_k = if d == 0 {
            k
        } else if came_down {
            k + 1
        } else {
            k - 1
        };
        let prev_x = if d == 0 {
            0
        } else {
            trace[d - 1][(prev_k + offset) as usize]
        };
        let prev_y = (prev_x as isize - prev_k) as usize;

        // Walk back through the diagonal run.
        while x > prev_x && y > prev_y {
            x -= 1;
            y -= 1;
            edits.push(Edit {
                op: EditOp::Equal,
                old_index: x,
                new_index: y,
            });
        }

        if d > 0 {
            if came_down {
                y -= 1;
                edits.push(Edit {
                    op: EditOp::Insert,
                    old_index: x,
                    new_index: y,
                });
            } else {
                x -= 1;
                edits.push(Edit {
                    op: EditOp::Delete,
                    old_index: x,
                    new_index: y,
                });
            }
        }
    }

    edits.reverse();
    edits
}
