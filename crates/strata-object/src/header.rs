//! The `"<kind> <size>\0"` envelope shared by loose storage and hashing.

use crate::{ObjectError, ObjectKind};

/// Parse an envelope header. Returns `(kind, payload_size, header_len)`.
pub fn parse_header(data: &[u8]) -> Result<(ObjectKind, usize, usize), ObjectError> {
    let nul = data
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| ObjectError::InvalidHeader("missing NUL terminator".into()))?;
    let header = &data[..nul];

    let space = header
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| ObjectError::InvalidHeader("missing space separator".into()))?;

    let kind = ObjectKind::from_bytes(&header[..space])?;
    let size_str = std::str::from_utf8(&header[space + 1..])
        .map_err(|_| ObjectError::InvalidHeader("non-UTF8 size".into()))?;
    if size_str.is_empty() || size_str.starts_with('+') {
        return Err(ObjectError::InvalidHeader(format!("bad size: {size_str:?}")));
    }
    let size: usize = size_str
        .parse()
        .map_err(|_| ObjectError::InvalidHeader(format!("bad size: {size_str:?}")))?;

    Ok((kind, size, nul + 1))
}

/// Render an envelope header for the given kind and payload size.
pub fn write_header(kind: ObjectKind, size: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(16);
    out.extend_from_slice(kind.as_str().as_bytes());
    out.push(b' ');
    out.extend_from_slice(size.to_string().as_bytes());
    out.push(0);
    out
}
