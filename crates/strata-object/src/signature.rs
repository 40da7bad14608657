//! Author/committer/tagger identity lines.

use bstr::{BStr, BString, ByteSlice};

use crate::ObjectError;

/// A point in time with the author's UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    /// Seconds since the Unix epoch.
    pub seconds: i64,
    /// Offset from UTC in minutes (e.g. -300 for UTC-5).
    pub offset_minutes: i32,
}

impl Timestamp {
    pub fn new(seconds: i64, offset_minutes: i32) -> Self {
        Self {
            seconds,
            offset_minutes,
        }
    }

    /// Render the offset as `±HHMM`.
    fn offset_string(&self) -> String {
        let sign = if self.offset_minutes < 0 { '-' } else { '+' };
        let abs = self.offset_minutes.unsigned_abs();
        format!("{}{:02}{:02}", sign, abs / 60, abs % 60)
    }
}

/// Identity attached to commits and tags: name, email, and timestamp.
///
/// Rendered as `Name <email> <seconds> <±HHMM>`. Never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: BString,
    pub email: BString,
    pub when: Timestamp,
}

impl Signature {
    /// Build a signature, rejecting separator bytes in name and email.
    pub fn new(
        name: impl Into<BString>,
        email: impl Into<BString>,
        when: Timestamp,
    ) -> Result<Self, ObjectError> {
        let name = name.into();
        let email = email.into();
        validate_component(name.as_bstr(), "name")?;
        validate_component(email.as_bstr(), "email")?;
        Ok(Self { name, email, when })
    }

    /// Parse a signature line of the form `Name <email> <seconds> <±HHMM>`.
    pub fn parse(data: &BStr) -> Result<Self, ObjectError> {
        let open = data
            .find_byte(b'<')
            .ok_or_else(|| ObjectError::InvalidSignature("missing '<'".into()))?;
        let close = data
            .find_byte(b'>')
            .ok_or_else(|| ObjectError::InvalidSignature("missing '>'".into()))?;
        if close < open {
            return Err(ObjectError::InvalidSignature("'>' before '<'".into()));
        }

        let name = data[..open].trim_end_with(|c| c == ' ');
        let email = &data[open + 1..close];

        let rest = data[close + 1..].trim_start_with(|c| c == ' ');
        let mut parts = rest.split(|&b| b == b' ');

        let seconds_part = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ObjectError::InvalidSignature("missing timestamp".into()))?;
        let seconds: i64 = std::str::from_utf8(seconds_part)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ObjectError::InvalidSignature("bad timestamp".into()))?;

        let offset_part = parts
            .next()
            .ok_or_else(|| ObjectError::InvalidSignature("missing UTC offset".into()))?;
        let offset_minutes = parse_offset(offset_part)?;

        Self::new(name, email, Timestamp::new(seconds, offset_minutes))
    }

    /// Render to the canonical line form (no trailing newline).
    pub fn to_bytes(&self) -> BString {
        let mut out = BString::from(Vec::with_capacity(64));
        out.extend_from_slice(&self.name);
        out.extend_from_slice(b" <");
        out.extend_from_slice(&self.email);
        out.extend_from_slice(b"> ");
        out.extend_from_slice(self.when.seconds.to_string().as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.when.offset_string().as_bytes());
        out
    }
}

fn validate_component(value: &BStr, what: &str) -> Result<(), ObjectError> {
    if value.iter().any(|&b| b == b'<' || b == b'>' || b == b'\n') {
        return Err(ObjectError::InvalidSignature(format!(
            "{what} contains a separator byte"
        )));
    }
    Ok(())
}

/// Parse a `±HHMM` offset into minutes.
fn parse_offset(data: &[u8]) -> Result<i32, ObjectError> {
    if data.len() != 5 || (data[0] != b'+' && data[0] != b'-') {
        return Err(ObjectError::InvalidSignature(format!(
            "bad UTC offset: {:?}",
            BString::from(data)
        )));
    }
    let digits = std::str::from_utf8(&data[1..])
        .ok()
        .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| ObjectError::InvalidSignature("bad UTC offset digits".into()))?;
    let hours: i32 = digits[..2].parse().unwrap_or(0);
    let minutes: i32 = digits[2..].parse().unwrap_or(0);
    if minutes >= 60 {
        return Err(ObjectError::InvalidSignature("offset minutes >= 60".into()));
    }
    let total = hours * 60 + minutes;
    Ok(if data[0] == b'-' { -total } else { total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::BStr;

    #[test]
    fn parse_basic() {
        let sig = Signature::parse(BStr::new(
            b"Ada Lovelace <ada@example.com> 1234567890 +0000",
        ))
        .unwrap();
        assert_eq!(sig.name, "Ada Lovelace");
        assert_eq!(sig.email, "ada@example.com");
        assert_eq!(sig.when.seconds, 1234567890);
        assert_eq!(sig.when.offset_minutes, 0);
    }

    #[test]
    fn parse_negative_offset() {
        let sig =
            Signature::parse(BStr::new(b"A B <a@b.c> 1700000000 -0530")).unwrap();
        assert_eq!(sig.when.offset_minutes, -(5 * 60 + 30));
    }

    #[test]
    fn render_roundtrip() {
        let sig = Signature::new("A B", "a@b.c", Timestamp::new(1700000000, 90)).unwrap();
        let bytes = sig.to_bytes();
        assert_eq!(bytes, "A B <a@b.c> 1700000000 +0130");
        let parsed = Signature::parse(bytes.as_ref()).unwrap();
        assert_eq!(parsed, sig);
    }

    #[test]
    fn negative_offset_roundtrip() {
        let sig = Signature::new("X", "x@y.z", Timestamp::new(10, -330)).unwrap();
        let parsed = Signature::parse(sig.to_bytes().as_ref()).unwrap();
        assert_eq!(parsed.when.offset_minutes, -330);
    }

    #[test]
    fn empty_name_allowed() {
        let sig = Signature::parse(BStr::new(b" <a@b.c> 1 +0000")).unwrap();
        assert_eq!(sig.name, "");
    }

    #[test]
    fn rejects_angle_brackets_in_name() {
        assert!(Signature::new("a<b", "a@b.c", Timestamp::new(0, 0)).is_err());
    }

    #[test]
    fn rejects_missing_parts() {
        assert!(Signature::parse(BStr::new(b"no email here")).is_err());
        assert!(Signature::parse(BStr::new(b"A <a@b.c>")).is_err());
        assert!(Signature::parse(BStr::new(b"A <a@b.c> 123")).is_err());
        assert!(Signature::parse(BStr::new(b"A <a@b.c> 123 0000")).is_err());
        assert!(Signature::parse(BStr::new(b"A <a@b.c> 123 +00x0")).is_err());
    }

    #[test]
    fn rejects_offset_minutes_overflow() {
        assert!(Signature::parse(BStr::new(b"A <a@b.c> 123 +0099")).is_err());
    }
}
