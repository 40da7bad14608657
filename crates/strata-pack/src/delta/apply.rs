//! Delta application with full bounds checking.

use crate::PackError;

use super::read_varint;

/// Rebuild a target object from `base` and a delta stream.
///
/// Every copy is bounds-checked against the base and the declared sizes are
/// verified on both ends; any violation is an error, never a partial result.
pub fn apply_delta(base: &[u8], delta: &[u8]) -> Result<Vec<u8>, PackError> {
    let mut pos = 0;

    let (base_len, n) = read_varint(delta).ok_or_else(|| truncated(0, "base length"))?;
    pos += n;
    let (target_len, n) =
        read_varint(&delta[pos..]).ok_or_else(|| truncated(pos, "target length"))?;
    pos += n;

    if base_len != base.len() {
        return Err(PackError::InvalidDelta {
            offset: 0,
            reason: format!("base length mismatch: stream says {base_len}, have {}", base.len()),
        });
    }

    let mut out = Vec::with_capacity(target_len);

    while pos < delta.len() {
        let cmd = delta[pos];
        pos += 1;

        if cmd & 0x80 != 0 {
            let offset = read_packed_le(delta, &mut pos, cmd, 0, 4)?;
            let mut size = read_packed_le(delta, &mut pos, cmd, 4, 3)?;
            if size == 0 {
                size = 0x10000;
            }
            let end = offset
                .checked_add(size)
                .filter(|&e| e <= base.len())
                .ok_or_else(|| PackError::InvalidDelta {
                    offset: pos,
                    reason: format!(
                        "copy out of bounds: offset={offset} size={size} base={}",
                        base.len()
                    ),
                })?;
            out.extend_from_slice(&base[offset..end]);
        } else if cmd != 0 {
            let len = cmd as usize;
            if pos + len > delta.len() {
                return Err(truncated(pos, "insert data"));
            }
            out.extend_from_slice(&delta[pos..pos + len]);
            pos += len;
        } else {
            return Err(PackError::InvalidDelta {
                offset: pos - 1,
                reason: "reserved opcode 0".into(),
            });
        }
    }

    if out.len() != target_len {
        return Err(PackError::InvalidDelta {
            offset: delta.len(),
            reason: format!("target length mismatch: stream says {target_len}, built {}", out.len()),
        });
    }

    Ok(out)
}

/// Read the little-endian field whose per-byte presence is flagged by
/// `count` bits of `cmd` starting at `first_bit`.
fn read_packed_le(
    delta: &[u8],
    pos: &mut usize,
    cmd: u8,
    first_bit: u32,
    count: u32,
) -> Result<usize, PackError> {
    let mut value = 0usize;
    for i in 0..count {
        if cmd & (1 << (first_bit + i)) != 0 {
            let byte = *delta
                .get(*pos)
                .ok_or_else(|| truncated(*pos, "copy field"))?;
            value |= (byte as usize) << (8 * i);
            *pos += 1;
        }
    }
    Ok(value)
}

fn truncated(offset: usize, what: &str) -> PackError {
    PackError::InvalidDelta {
        offset,
        reason: format!("truncated {what}"),
    }
}
