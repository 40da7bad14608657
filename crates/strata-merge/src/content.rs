//! Three-way content merge.
//!
//! Diffs base against ours and base against theirs, then walks both change
//! sets in base order. Regions touched by one side only are taken as-is;
//! overlapping regions with identical replacements collapse; anything else
//! becomes a conflict block with inline markers.

use strata_diff::myers::{self, Edit, EditOp};
use strata_diff::split_lines;

/// Labels rendered into conflict markers.
#[derive(Debug, Clone)]
pub struct MergeLabels {
    pub ours: String,
    pub theirs: String,
}

impl Default for MergeLabels {
    fn default() -> Self {
        Self {
            ours: "ours".into(),
            theirs: "theirs".into(),
        }
    }
}

/// Outcome of merging one file's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentMergeOutcome {
    /// Merged without conflict.
    Clean(Vec<u8>),
    /// Merged with conflict markers inline.
    Conflicted {
        content: Vec<u8>,
        regions: usize,
    },
}

impl ContentMergeOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean(_))
    }

    pub fn content(&self) -> &[u8] {
        match self {
            Self::Clean(c) => c,
            Self::Conflicted { content, .. } => content,
        }
    }
}

/// A run of lines replaced relative to the base.
#[derive(Debug, Clone, Copy)]
struct Region {
    /// First replaced base line.
    base_start: usize,
    /// Number of base lines replaced.
    base_len: usize,
    /// First replacement line in the changed side.
    side_start: usize,
    /// Number of replacement lines.
    side_len: usize,
}

impl Region {
    fn base_end(&self) -> usize {
        self.base_start + self.base_len
    }
}

/// Merge `ours` and `theirs`, both derived from `base`.
pub fn merge_content(
    base: &[u8],
    ours: &[u8],
    theirs: &[u8],
    labels: &MergeLabels,
) -> ContentMergeOutcome {
    // Trivial resolutions first.
    if ours == theirs {
        return ContentMergeOutcome::Clean(ours.to_vec());
    }
    if base == ours {
        return ContentMergeOutcome::Clean(theirs.to_vec());
    }
    if base == theirs {
        return ContentMergeOutcome::Clean(ours.to_vec());
    }

    let base_lines = split_lines(base);
    let our_lines = split_lines(ours);
    let their_lines = split_lines(theirs);

    let our_regions = change_regions(&myers::diff(&base_lines, &our_lines));
    let their_regions = change_regions(&myers::diff(&base_lines, &their_lines));

    interleave(
        &base_lines,
        &our_lines,
        &their_lines,
        &our_regions,
        &their_regions,
        labels,
    )
}

/// Contract the edit script into contiguous replaced regions.
fn change_regions(edits: &[Edit]) -> Vec<Region> {
    let mut regions = Vec::new();
    let mut i = 0;

    while i < edits.len() {
        if edits[i].op == EditOp::Equal {
            i += 1;
            continue;
        }
        let base_start = edits[i].old_index;
        let side_start = edits[i].new_index;
        let mut base_end = base_start;
        let mut side_end = side_start;
        while i < edits.len() && edits[i].op != EditOp::Equal {
            match edits[i].op {
                EditOp::Delete => base_end = edits[i].old_index + 1,
                EditOp::Insert => side_end = edits[i].new_index + 1,
                EditOp::Equal => {}
            }
            i += 1;
        }
        regions.push(Region {
            base_start,
            base_len: base_end - base_start,
            side_start,
            side_len: side_end - side_start,
        });
    }

    regions
}

fn interleave(
    base: &[&[u8]],
    ours: &[&[u8]],
    theirs: &[&[u8]],
    our_regions: &[Region],
    their_regions: &[Region],
    labels: &MergeLabels,
) -> ContentMergeOutcome {
    let mut out: Vec<u8> = Vec::new();
    let mut conflicts = 0usize;
    let mut cursor = 0usize; // next base line not yet emitted
    let mut oi = 0;
    let mut ti = 0;

    enum Step {
        TakeOurs,
        TakeTheirs,
        Overlap,
    }

    while oi < our_regions.len() || ti < their_regions.len() {
        let step = match (our_regions.get(oi), their_regions.get(ti)) {
            (Some(o), Some(t)) if disjoint_before(o, t) => Step::TakeOurs,
            (Some(o), Some(t)) if disjoint_before(t, o) => Step::TakeTheirs,
            (Some(_), Some(_)) => Step::Overlap,
            (Some(_), None) => Step::TakeOurs,
            (None, Some(_)) => Step::TakeTheirs,
            (None, None) => break,
        };

        match step {
            Step::TakeOurs => {
                let region = our_regions[oi];
                oi += 1;
                // A widened conflict span may have consumed this region.
                if region.base_end() <= cursor && region.base_len > 0 {
                    continue;
                }
                copy_lines(&mut out, base, cursor, region.base_start.max(cursor));
                copy_lines(&mut out, ours, region.side_start, region.side_start + region.side_len);
                cursor = cursor.max(region.base_end());
                continue;
            }
            Step::TakeTheirs => {
                let region = their_regions[ti];
                ti += 1;
                if region.base_end() <= cursor && region.base_len > 0 {
                    continue;
                }
                copy_lines(&mut out, base, cursor, region.base_start.max(cursor));
                copy_lines(&mut out, theirs, region.side_start, region.side_start + region.side_len);
                cursor = cursor.max(region.base_end());
                continue;
            }
            Step::Overlap => {}
        }

        // Overlap: widen to cover both regions, then compare replacements.
        let o = our_regions[oi];
        let t = their_regions[ti];
        let span_start = o.base_start.min(t.base_start);
        let span_end = o.base_end().max(t.base_end());

        copy_lines(&mut out, base, cursor, span_start);

        let our_block = gather(ours, o.side_start, o.side_len);
        let their_block = gather(theirs, t.side_start, t.side_len);

        if our_block == their_block {
            out.extend_from_slice(&our_block);
        } else {
            conflicts += 1;
            out.extend_from_slice(b"<<<<<<< ");
            out.extend_from_slice(labels.ours.as_bytes());
            out.push(b'\n');
            out.extend_from_slice(&our_block);
            out.extend_from_slice(b"=======\n");
            out.extend_from_slice(&their_block);
            out.extend_from_slice(b">>>>>>> ");
            out.extend_from_slice(labels.theirs.as_bytes());
            out.push(b'\n');
        }

        cursor = span_end;
        oi += 1;
        ti += 1;
    }

    copy_lines(&mut out, base, cursor, base.len());

    if conflicts == 0 {
        ContentMergeOutcome::Clean(out)
    } else {
        ContentMergeOutcome::Conflicted {
            content: out,
            regions: conflicts,
        }
    }
}

/// Does `a` end strictly before `b` starts (no shared or adjacent-replace
/// base lines)?
fn disjoint_before(a: &Region, b: &Region) -> bool {
    a.base_end() < b.base_start || (a.base_end() == b.base_start && a.base_start < b.base_start)
}

fn copy_lines(out: &mut Vec<u8>, lines: &[&[u8]], from: usize, to: usize) {
    for line in lines.iter().take(to).skip(from) {
        out.extend_from_slice(line);
    }
}

fn gather(lines: &[&[u8]], start: usize, len: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    for line in lines.iter().skip(start).take(len) {
        buf.extend_from_slice(line);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> MergeLabels {
        MergeLabels {
            ours: "HEAD".into(),
            theirs: "feature".into(),
        }
    }

    #[test]
    fn identical_sides_win() {
        let out = merge_content(b"a\n", b"a\nb\n", b"a\nb\n", &labels());
        assert_eq!(out, ContentMergeOutcome::Clean(b"a\nb\n".to_vec()));
    }

    #[test]
    fn one_side_unchanged_takes_other() {
        let base = b"one\ntwo\n";
        assert_eq!(
            merge_content(base, b"one\nTWO\n", base, &labels()).content(),
            b"one\nTWO\n"
        );
        assert_eq!(
            merge_content(base, base, b"ONE\ntwo\n", &labels()).content(),
            b"ONE\ntwo\n"
        );
    }

    #[test]
    fn non_overlapping_edits_combine() {
        let base = b"1\n2\n3\n4\n5\n";
        let ours = b"ONE\n2\n3\n4\n5\n";
        let theirs = b"1\n2\n3\n4\nFIVE\n";
        let out = merge_content(base, ours, theirs, &labels());
        assert!(out.is_clean());
        assert_eq!(out.content(), b"ONE\n2\n3\n4\nFIVE\n");
    }

    #[test]
    fn overlapping_edits_conflict_with_markers() {
        let base = b"1\nmiddle\n3\n";
        let ours = b"1\nour version\n3\n";
        let theirs = b"1\ntheir version\n3\n";
        let out = merge_content(base, ours, theirs, &labels());
        assert!(!out.is_clean());

        let text = String::from_utf8_lossy(out.content()).to_string();
        assert!(text.contains("<<<<<<< HEAD\n"));
        assert!(text.contains("our version\n"));
        assert!(text.contains("=======\n"));
        assert!(text.contains("their version\n"));
        assert!(text.contains(">>>>>>> feature\n"));
        // Context survives around the conflict.
        assert!(text.starts_with("1\n"));
        assert!(text.ends_with("3\n"));
    }

    #[test]
    fn same_replacement_on_both_sides_is_clean() {
        let base = b"1\nold\n3\n";
        let ours = b"1\nnew\n3\n";
        let theirs = b"1\nnew\n3\n";
        let out = merge_content(base, ours, theirs, &labels());
        assert!(out.is_clean());
        assert_eq!(out.content(), b"1\nnew\n3\n");
    }

    #[test]
    fn both_added_from_empty_base_conflicts() {
        let out = merge_content(b"", b"ours\n", b"theirs\n", &labels());
        assert!(!out.is_clean());
        match out {
            ContentMergeOutcome::Conflicted { regions, .. } => assert_eq!(regions, 1),
            ContentMergeOutcome::Clean(_) => panic!("expected conflict"),
        }
    }

    #[test]
    fn multiple_conflict_regions_counted() {
        let base = b"a\nx\nb\nc\nd\ny\ne\n";
        let ours = b"a\nX1\nb\nc\nd\nY1\ne\n";
        let theirs = b"a\nX2\nb\nc\nd\nY2\ne\n";
        match merge_content(base, ours, theirs, &labels()) {
            ContentMergeOutcome::Conflicted { regions, content } => {
                assert_eq!(regions, 2);
                let text = String::from_utf8_lossy(&content).to_string();
                assert_eq!(text.matches("<<<<<<<").count(), 2);
            }
            ContentMergeOutcome::Clean(_) => panic!("expected conflicts"),
        }
    }

    #[test]
    fn deletion_on_one_side_merges_cleanly() {
        let base = b"keep\ndrop\nkeep2\n";
        let ours = b"keep\nkeep2\n";
        let theirs = b"keep\ndrop\nkeep2\nadded\n";
        let out = merge_content(base, ours, theirs, &labels());
        assert!(out.is_clean());
        assert_eq!(out.content(), b"keep\nkeep2\nadded\n");
    }
}
