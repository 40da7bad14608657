//! Delta computation.
//!
//! Indexes fixed-size blocks of the base in a hash map, then scans the
//! target: block hits become copy instructions (greedily extended forward),
//! misses accumulate into insert instructions.

use std::collections::HashMap;

use super::{encode_copy, encode_insert, write_varint};

/// Block granularity for base indexing.
const BLOCK: usize = 16;

/// Longest copy a single instruction can express.
const MAX_COPY: usize = 0x0100_0000;

/// Compute a delta stream that rebuilds `target` from `base`.
pub fn compute_delta(base: &[u8], target: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    write_varint(&mut out, base.len());
    write_varint(&mut out, target.len());

    if target.is_empty() {
        return out;
    }

    let index = index_blocks(base);
    let mut literal: Vec<u8> = Vec::new();
    let mut pos = 0;

    while pos < target.len() {
        let matched = if target.len() - pos >= BLOCK {
            index
                .get(&target[pos..pos + BLOCK])
                .map(|&base_off| (base_off, longest_match(base, base_off, target, pos)))
        } else {
            None
        };

        match matched {
            Some((base_off, len)) if len > 0 => {
                flush_literal(&mut out, &mut literal);
                let mut emitted = 0;
                while emitted < len {
                    let chunk = (len - emitted).min(MAX_COPY);
                    encode_copy(&mut out, base_off + emitted, chunk);
                    emitted += chunk;
                }
                pos += len;
            }
            _ => {
                literal.push(target[pos]);
                pos += 1;
                if literal.len() == 0x7f {
                    flush_literal(&mut out, &mut literal);
                }
            }
        }
    }

    flush_literal(&mut out, &mut literal);
    out
}

/// Map each non-overlapping BLOCK-sized chunk of the base to its offset.
/// First occurrence wins so repeated content prefers earlier offsets.
fn index_blocks(base: &[u8]) -> HashMap<&[u8], usize> {
    let mut index = HashMap::new();
    if base.len() >= BLOCK {
        for off in (0..=base.len() - BLOCK).step_by(BLOCK) {
            index.entry(&base[off..off + BLOCK]).or_insert(off);
        }
    }
    index
}

/// Length of the common run starting at `base[base_off]` / `target[tgt_off]`.
fn longest_match(base: &[u8], base_off: usize, target: &[u8], tgt_off: usize) -> usize {
    base[base_off..]
        .iter()
        .zip(&target[tgt_off..])
        .take_while(|(a, b)| a == b)
        .count()
}

fn flush_literal(out: &mut Vec<u8>, literal: &mut Vec<u8>) {
    for chunk in literal.chunks(0x7f) {
        encode_insert(out, chunk);
    }
    literal.clear();
}
