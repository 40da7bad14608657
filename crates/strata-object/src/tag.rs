use bstr::{BString, ByteSlice};
use strata_hash::ObjectId;

use crate::{ObjectError, ObjectKind, Signature};

/// An annotated tag: a named, signed pointer at another object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// The object this tag points at.
    pub target: ObjectId,
    /// Kind of the target object.
    pub target_kind: ObjectKind,
    /// The tag's name.
    pub name: BString,
    /// Who created the tag.
    pub tagger: Signature,
    /// Tag message.
    pub message: BString,
}

impl Tag {
    /// Decode tag payload bytes.
    pub fn decode(payload: &[u8]) -> Result<Self, ObjectError> {
        let mut target = None;
        let mut target_kind = None;
        let mut name = None;
        let mut tagger = None;

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
                .ok_or_else(|| ObjectError::InvalidTag("header without value".into()))?;
            let key = &line[..space];
            let value = &line[space + 1..];

            match key {
                b"object" => {
                    let hex = std::str::from_utf8(value)
                        .map_err(|_| ObjectError::InvalidTag("non-UTF8 object id".into()))?;
                    target = Some(ObjectId::from_hex(hex)?);
                }
                b"kind" => {
                    target_kind = Some(ObjectKind::from_bytes(value)?);
                }
                b"tag" => {
                    name = Some(BString::from(value));
                }
                b"tagger" => {
                    tagger = Some(Signature::parse(value.as_bstr())?);
                }
                other => {
                    return Err(ObjectError::InvalidTag(format!(
                        "unknown header: {:?}",
                        BString::from(other)
                    )));
                }
            }

            pos = line_end + 1;
        }

        Ok(Self {
            target: target.ok_or_else(|| ObjectError::InvalidTag("missing object".into()))?,
            target_kind: target_kind
                .ok_or_else(|| ObjectError::InvalidTag("missing kind".into()))?,
            name: name.ok_or_else(|| ObjectError::InvalidTag("missing tag name".into()))?,
            tagger: tagger.ok_or_else(|| ObjectError::InvalidTag("missing tagger".into()))?,
            message: BString::from(&payload[pos..]),
        })
    }

    /// Canonical payload encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(192 + self.message.len());
        out.extend_from_slice(b"object ");
        out.extend_from_slice(self.target.to_hex().as_bytes());
        out.push(b'\n');
        out.extend_from_slice(b"kind ");
        out.extend_from_slice(self.target_kind.as_str().as_bytes());
        out.push(b'\n');
        out.extend_from_slice(b"tag ");
        out.extend_from_slice(&self.name);
        out.push(b'\n');
        out.extend_from_slice(b"tagger ");
        out.extend_from_slice(&self.tagger.to_bytes());
        out.push(b'\n');
        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Timestamp;

    fn sample() -> Tag {
        Tag {
            target: ObjectId::from_bytes(&[9; 32]).unwrap(),
            target_kind: ObjectKind::Commit,
            name: BString::from("v1.0.0"),
            tagger: Signature::new("Rel Eng", "rel@example.com", Timestamp::new(1700000000, 60))
                .unwrap(),
            message: BString::from("first stable release\n"),
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let tag = sample();
        let decoded = Tag::decode(&tag.encode()).unwrap();
        assert_eq!(decoded, tag);
    }

    #[test]
    fn tag_of_blob_roundtrips() {
        let mut tag = sample();
        tag.target_kind = ObjectKind::Blob;
        let decoded = Tag::decode(&tag.encode()).unwrap();
        assert_eq!(decoded.target_kind, ObjectKind::Blob);
    }

    #[test]
    fn missing_headers_rejected() {
        assert!(Tag::decode(b"").is_err());
        assert!(Tag::decode(b"tag v1\n\nmsg").is_err());
        let mut partial = Vec::new();
        partial.extend_from_slice(b"object ");
        partial.extend_from_slice(sample().target.to_hex().as_bytes());
        partial.extend_from_slice(b"\nkind commit\ntag v1\n\nmsg");
        // No tagger.
        assert!(Tag::decode(&partial).is_err());
    }

    #[test]
    fn unknown_header_rejected() {
        assert!(matches!(
            Tag::decode(b"extra stuff\n"),
            Err(ObjectError::InvalidTag(_))
        ));
    }
}
