//! Assembling edit scripts into hunks with context.

use bstr::BString;

use crate::myers::{self, Edit, EditOp};
use crate::{DiffLine, Hunk, LineOrigin};

/// Split bytes into lines, keeping the trailing newline on each line. A
/// final line without a newline is kept as-is.
pub fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, &byte) in data.iter().enumerate() {
        if byte == b'\n' {
            lines.push(&data[start..=i]);
            start = i + 1;
        }
    }
    if start < data.len() {
        lines.push(&data[start..]);
    }
    lines
}

/// Diff two byte buffers into hunks.
///
/// Hunks closer than `2*context + interhunk` unchanged lines apart are
/// merged into one.
pub fn diff_lines(old: &[u8], new: &[u8], context: u32, interhunk: u32) -> Vec<Hunk> {
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);
    let edits = myers::diff(&old_lines, &new_lines);
    assemble(&edits, &old_lines, &new_lines, context as usize, interhunk as usize)
}

fn assemble(
    edits: &[Edit],
    old_lines: &[&[u8]],
    new_lines: &[&[u8]],
    context: usize,
    interhunk: usize,
) -> Vec<Hunk> {
    // Index ranges into `edits` holding at least one non-equal op.
    let mut groups: Vec<(usize, usize)> = Vec::new();
    let mut i = 0;
    while i < edits.len() {
        if edits[i].op == EditOp::Equal {
            i += 1;
            continue;
        }
        let start = i;
        while i < edits.len() && edits[i].op != EditOp::Equal {
            i += 1;
        }
        groups.push((start, i));
    }
    if groups.is_empty() {
        return Vec::new();
    }

    // Merge groups whose gap fits inside shared context plus slop.
    let max_gap = 2 * context + interhunk;
    let mut merged: Vec<(usize, usize)> = Vec::new();
    let mut current = groups[0];
    for &(start, end) in &groups[1..] {
        if start - current.1 <= max_gap {
            current.1 = end;
        } else {
            merged.push(current);
            current = (start, end);
        }
    }
    merged.push(current);

    merged
        .into_iter()
        .map(|(start, end)| {
            let lead = start.saturating_sub(context);
            let trail = (end + context).min(edits.len());
            build_hunk(&edits[lead..trail], old_lines, new_lines)
        })
        .collect()
}

fn build_hunk(edits: &[Edit], old_lines: &[&[u8]], new_lines: &[&[u8]]) -> Hunk {
    let mut lines = Vec::with_capacity(edits.len());
    let mut old_count = 0u32;
    let mut new_count = 0u32;

    for edit in edits {
        match edit.op {
            EditOp::Equal => {
                lines.push(DiffLine {
                    origin: LineOrigin::Context,
                    old_lineno: Some(edit.old_index as u32 + 1),
                    new_lineno: Some(edit.new_index as u32 + 1),
                    content: BString::from(old_lines[edit.old_index]),
                });
                old_count += 1;
                new_count += 1;
            }
            EditOp::Delete => {
                lines.push(DiffLine {
                    origin: LineOrigin::Deletion,
                    old_lineno: Some(edit.old_index as u32 + 1),
                    new_lineno: None,
                    content: BString::from(old_lines[edit.old_index]),
                });
                old_count += 1;
            }
            EditOp::Insert => {
                lines.push(DiffLine {
                    origin: LineOrigin::Addition,
                    old_lineno: None,
                    new_lineno: Some(edit.new_index as u32 + 1),
                    content: BString::from(new_lines[edit.new_index]),
                });
                new_count += 1;
            }
        }
    }

    // 1-based start lines; an empty side starts at the insertion point.
    let old_start = lines
        .iter()
        .find_map(|l| l.old_lineno)
        .unwrap_or_else(|| edits.first().map(|e| e.old_index as u32).unwrap_or(0));
    let new_start = lines
        .iter()
        .find_map(|l| l.new_lineno)
        .unwrap_or_else(|| edits.first().map(|e| e.new_index as u32).unwrap_or(0));

    let header = format!("@@ -{old_start},{old_count} +{new_start},{new_count} @@");

    Hunk {
        old_start,
        old_lines: old_count,
        new_start,
        new_lines: new_count,
        header,
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_keeps_newlines() {
        assert_eq!(split_lines(b"a\nb\n"), vec![b"a\n".as_slice(), b"b\n"]);
        assert_eq!(split_lines(b"a\nb"), vec![b"a\n".as_slice(), b"b"]);
        assert!(split_lines(b"").is_empty());
    }

    #[test]
    fn unchanged_content_has_no_hunks() {
        assert!(diff_lines(b"a\nb\n", b"a\nb\n", 3, 0).is_empty());
    }

    #[test]
    fn single_change_with_context() {
        let old = b"1\n2\n3\n4\n5\n6\n7\n";
        let new = b"1\n2\n3\nX\n5\n6\n7\n";
        let hunks = diff_lines(old, new, 2, 0);
        assert_eq!(hunks.len(), 1);

        let hunk = &hunks[0];
        assert_eq!(hunk.old_start, 2);
        assert_eq!(hunk.old_lines, 5); // 2 context + del + 2 context
        assert_eq!(hunk.new_lines, 5);
        assert_eq!(hunk.header, "@@ -2,5 +2,5 @@");

        let deletions: Vec<_> = hunk
            .lines
            .iter()
            .filter(|l| l.origin == LineOrigin::Deletion)
            .collect();
        assert_eq!(deletions.len(), 1);
        assert_eq!(deletions[0].content, "4\n");
        assert_eq!(deletions[0].old_lineno, Some(4));
        assert_eq!(deletions[0].new_lineno, None);
    }

    #[test]
    fn distant_changes_make_separate_hunks() {
        let old = b"1\n2\n3\n4\n5\n6\n7\n8\n9\n10\n11\n12\n";
        let new = b"X\n2\n3\n4\n5\n6\n7\n8\n9\n10\n11\nY\n";
        let hunks = diff_lines(old, new, 1, 0);
        assert_eq!(hunks.len(), 2);
    }

    #[test]
    fn interhunk_lines_merge_nearby_hunks() {
        let old = b"1\n2\n3\n4\n5\n6\n7\n8\n9\n";
        let new = b"X\n2\n3\n4\n5\n6\n7\n8\nY\n";
        // Gap of 7 unchanged lines; 2*2 context leaves 3 between.
        assert_eq!(diff_lines(old, new, 2, 0).len(), 2);
        assert_eq!(diff_lines(old, new, 2, 3).len(), 1);
    }

    #[test]
    fn pure_addition_to_empty() {
        let hunks = diff_lines(b"", b"a\nb\n", 3, 0);
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].old_lines, 0);
        assert_eq!(hunks[0].new_lines, 2);
        assert!(hunks[0]
            .lines
            .iter()
            .all(|l| l.origin == LineOrigin::Addition));
    }

    #[test]
    fn pure_deletion_to_empty() {
        let hunks = diff_lines(b"a\nb\n", b"", 3, 0);
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].old_lines, 2);
        assert_eq!(hunks[0].new_lines, 0);
        assert!(hunks[0]
            .lines
            .iter()
            .all(|l| l.origin == LineOrigin::Deletion));
    }

    #[test]
    fn line_numbers_are_one_based_and_consistent() {
        let old = b"a\nb\nc\n";
        let new = b"a\nB\nc\n";
        let hunks = diff_lines(old, new, 3, 0);
        let hunk = &hunks[0];
        assert_eq!(hunk.lines[0].old_lineno, Some(1));
        assert_eq!(hunk.lines[0].new_lineno, Some(1));
        let addition = hunk
            .lines
            .iter()
            .find(|l| l.origin == LineOrigin::Addition)
            .unwrap();
        assert_eq!(addition.new_lineno, Some(2));
    }
}
