use bstr::{BStr, BString, ByteSlice};
use strata_hash::ObjectId;

use crate::{ObjectError, Signature};

/// A commit: a tree snapshot plus parent links and identity metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Id of the root tree.
    pub tree: ObjectId,
    /// Parent commit ids: zero for a root commit, two or more for a merge.
    pub parents: Vec<ObjectId>,
    /// Who wrote the change.
    pub author: Signature,
    /// Who recorded it.
    pub committer: Signature,
    /// Optional attached PGP signature blob, carried opaquely.
    pub signature: Option<BString>,
    /// Commit message (everything after the blank separator line).
    pub message: BString,
}

impl Commit {
    /// Decode commit payload bytes.
    ///
    /// Headers come first, one per line, in fixed order (`tree`, `parent`*,
    /// `author`, `committer`, optional `signature` with space-continuation
    /// lines), then a blank line, then the message.
    pub fn decode(payload: &[u8]) -> Result<Self, ObjectError> {
        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;
        let mut signature: Option<BString> = None;

        let mut pos = 0;
        while pos < payload.len() {
            if payload[pos] == b'\n' {
                pos += 1;
                break;
            }

            let line_end = payload[pos..]
                .find_byte(b'\n')
                .map(|p| p + pos)
                .unwrap_or(payload.len());
            let line = &payload[pos..line_end];

            let space = line
                .find_byte(b' ')
                .ok_or_else(|| ObjectError::InvalidCommit("header without value".into()))?;
            let key = &line[..space];
            let value = &line[space + 1..];

            match key {
                b"tree" => {
                    if tree.is_some() {
                        return Err(ObjectError::InvalidCommit("duplicate tree header".into()));
                    }
                    tree = Some(parse_id(value)?);
                }
                b"parent" => parents.push(parse_id(value)?),
                b"author" => {
                    author = Some(Signature::parse(value.as_bstr())?);
                }
                b"committer" => {
                    committer = Some(Signature::parse(value.as_bstr())?);
                }
                b"signature" => {
                    // Multi-line: continuation lines start with a space.
                    let mut sig = Vec::from(value);
                    let mut next = line_end + 1;
                    while next < payload.len() && payload[next] == b' ' {
                        let cont_end = payload[next..]
                            .find_byte(b'\n')
                            .map(|p| p + next)
                            .unwrap_or(payload.len());
                        sig.push(b'\n');
                        sig.extend_from_slice(&payload[next + 1..cont_end]);
                        next = cont_end + 1;
                    }
                    signature = Some(BString::from(sig));
                    pos = next;
                    continue;
                }
                other => {
                    return Err(ObjectError::InvalidCommit(format!(
                        "unknown header: {:?}",
                        BString::from(other)
                    )));
                }
            }

            pos = line_end + 1;
        }

        let tree = tree.ok_or_else(|| ObjectError::InvalidCommit("missing tree".into()))?;
        let author =
            author.ok_or_else(|| ObjectError::InvalidCommit("missing author".into()))?;
        let committer =
            committer.ok_or_else(|| ObjectError::InvalidCommit("missing committer".into()))?;

        Ok(Self {
            tree,
            parents,
            author,
            committer,
            signature,
            message: BString::from(&payload[pos..]),
        })
    }

    /// Canonical payload encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256 + self.message.len());

        out.extend_from_slice(b"tree ");
        out.extend_from_slice(self.tree.to_hex().as_bytes());
        out.push(b'\n');

        for parent in &self.parents {
            out.extend_from_slice(b"parent ");
            out.extend_from_slice(parent.to_hex().as_bytes());
            out.push(b'\n');
        }

        out.extend_from_slice(b"author ");
        out.extend_from_slice(&self.author.to_bytes());
        out.push(b'\n');

        out.extend_from_slice(b"committer ");
        out.extend_from_slice(&self.committer.to_bytes());
        out.push(b'\n');

        if let Some(ref sig) = self.signature {
            out.extend_from_slice(b"signature ");
            for (i, line) in sig.split(|&b| b == b'\n').enumerate() {
                if i > 0 {
                    out.push(b'\n');
                    out.push(b' ');
                }
                out.extend_from_slice(line);
            }
            out.push(b'\n');
        }

        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }

    /// First parent, if any.
    pub fn first_parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    /// More than one parent?
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// No parents?
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// First line of the message.
    pub fn summary(&self) -> &BStr {
        let msg: &[u8] = self.message.as_ref();
        match msg.find_byte(b'\n') {
            Some(pos) => BStr::new(&msg[..pos]),
            None => BStr::new(msg),
        }
    }
}

fn parse_id(value: &[u8]) -> Result<ObjectId, ObjectError> {
    let hex = std::str::from_utf8(value)
        .map_err(|_| ObjectError::InvalidCommit("non-UTF8 object id".into()))?;
    Ok(ObjectId::from_hex(hex)?)
}
