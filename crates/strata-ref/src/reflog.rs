//! Append-only reflogs: one file per reference under `logs/`.
//!
//! Line format: `<old-hex> <new-hex> <signature>\t<message>\n`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use bstr::{BStr, BString, ByteSlice};
use strata_hash::{ObjectId, HEX_LEN};
use strata_object::Signature;

use crate::name::RefName;
use crate::RefError;

/// One recorded value change of a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflogEntry {
    pub old_id: ObjectId,
    pub new_id: ObjectId,
    pub committer: Signature,
    pub message: BString,
}

impl ReflogEntry {
    /// Parse one reflog line (without trailing newline).
    pub fn parse(line: &BStr) -> Result<Self, RefError> {
        let line = line.as_bytes();
        // Two hex ids, two separating spaces, then at least a signature.
        let min = HEX_LEN * 2 + 2;
        if line.len() < min {
            return Err(RefError::Parse(format!(
                "reflog line too short: {} bytes",
                line.len()
            )));
        }
        if line[HEX_LEN] != b' ' || line[HEX_LEN * 2 + 1] != b' ' {
            return Err(RefError::Parse("missing id separators".into()));
        }

        let old_hex = std::str::from_utf8(&line[..HEX_LEN])
            .map_err(|_| RefError::Parse("non-UTF8 old id".into()))?;
        let new_hex = std::str::from_utf8(&line[HEX_LEN + 1..HEX_LEN * 2 + 1])
            .map_err(|_| RefError::Parse("non-UTF8 new id".into()))?;

        let rest = &line[min..];
        let (sig_part, message) = match rest.find_byte(b'\t') {
            Some(tab) => (&rest[..tab], &rest[tab + 1..]),
            None => (rest, &b""[..]),
        };

        Ok(Self {
            old_id: ObjectId::from_hex(old_hex)?,
            new_id: ObjectId::from_hex(new_hex)?,
            committer: Signature::parse(sig_part.as_bstr())?,
            message: BString::from(message),
        })
    }

    /// Render to one line (without trailing newline).
    pub fn to_bytes(&self) -> BString {
        let mut out = BString::from(Vec::with_capacity(192));
        out.extend_from_slice(self.old_id.to_hex().as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.new_id.to_hex().as_bytes());
        out.push(b' ');
        out.extend_from_slice(&self.committer.to_bytes());
        out.push(b'\t');
        out.extend_from_slice(&self.message);
        out
    }
}

/// Path of the reflog file for `name`.
pub(crate) fn reflog_path(root: &Path, name: &RefName) -> PathBuf {
    root.join("logs").join(name.as_str())
}

/// Read all entries for a ref, newest first. Missing log = empty history.
pub(crate) fn read(root: &Path, name: &RefName) -> Result<Vec<ReflogEntry>, RefError> {
    let path = reflog_path(root, name);
    let contents = match fs::read(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(RefError::IoPath { path, source: e }),
    };

    let mut entries = Vec::new();
    for line in contents.lines() {
        if !line.is_empty() {
            entries.push(ReflogEntry::parse(line.as_bstr())?);
        }
    }
    entries.reverse();
    Ok(entries)
}

/// Append one entry to a ref's log.
pub(crate) fn append(root: &Path, name: &RefName, entry: &ReflogEntry) -> Result<(), RefError> {
    let path = reflog_path(root, name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| RefError::IoPath {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let mut line = entry.to_bytes();
    line.push(b'\n');

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| RefError::IoPath {
            path: path.clone(),
            source: e,
        })?;
    file.write_all(&line)
        .map_err(|e| RefError::IoPath { path, source: e })
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_object::Timestamp;

    fn sig() -> Signature {
        Signature::new("Log Writer", "log@example.com", Timestamp::new(1700000000, 0)).unwrap()
    }

    fn entry(old: u8, new: u8, msg: &str) -> ReflogEntry {
        ReflogEntry {
            old_id: ObjectId::from_bytes(&[old; 32]).unwrap(),
            new_id: ObjectId::from_bytes(&[new; 32]).unwrap(),
            committer: sig(),
            message: BString::from(msg),
        }
    }

    #[test]
    fn line_roundtrip() {
        let e = entry(0, 7, "commit: initial");
        let parsed = ReflogEntry::parse(e.to_bytes().as_ref()).unwrap();
        assert_eq!(parsed, e);
    }

    #[test]
    fn empty_message_roundtrip() {
        let e = entry(1, 2, "");
        let parsed = ReflogEntry::parse(e.to_bytes().as_ref()).unwrap();
        assert_eq!(parsed.message, "");
    }

    #[test]
    fn parse_rejects_short_line() {
        assert!(ReflogEntry::parse(BStr::new(b"too short")).is_err());
    }

    #[test]
    fn append_then_read_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let name = RefName::branch("main").unwrap();

        append(dir.path(), &name, &entry(0, 1, "first")).unwrap();
        append(dir.path(), &name, &entry(1, 2, "second")).unwrap();

        let entries = read(dir.path(), &name).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "second");
        assert_eq!(entries[1].message, "first");
        assert_eq!(entries[0].old_id, entries[1].new_id);
    }

    #[test]
    fn missing_log_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let name = RefName::branch("ghost").unwrap();
        assert!(read(dir.path(), &name).unwrap().is_empty());
    }
}
