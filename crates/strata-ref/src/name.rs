use std::fmt;

use crate::RefError;

/// A validated reference name, e.g. `refs/heads/main` or `HEAD`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefName(String);

impl RefName {
    /// Validate and wrap a reference name.
    ///
    /// Rejected: empty names and segments, `.`/`..` segments, control
    /// bytes, spaces, `..`, leading/trailing `/`, and a `.lock` suffix
    /// (which would collide with the lock protocol).
    pub fn new(name: impl Into<String>) -> Result<Self, RefError> {
        let name = name.into();
        let reason = Self::check(&name);
        match reason {
            None => Ok(Self(name)),
            Some(reason) => Err(RefError::InvalidName { name, reason }),
        }
    }

    fn check(name: &str) -> Option<&'static str> {
        if name.is_empty() {
            return Some("empty");
        }
        if name.starts_with('/') || name.ends_with('/') {
            return Some("leading or trailing slash");
        }
        if name.contains("//") {
            return Some("empty segment");
        }
        if name.contains("..") {
            return Some("'..' not allowed");
        }
        if name.ends_with(".lock") || name.split('/').any(|s| s.ends_with(".lock")) {
            return Some("'.lock' suffix reserved");
        }
        if name.split('/').any(|s| s == "." || s.is_empty()) {
            return Some("invalid segment");
        }
        if name
            .bytes()
            .any(|b| b.is_ascii_control() || b == b' ' || b == b'~' || b == b'^' || b == b':')
        {
            return Some("forbidden byte");
        }
        None
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The short human name: last segment for branches/tags, unchanged
    /// otherwise.
    pub fn shorthand(&self) -> &str {
        for prefix in ["refs/heads/", "refs/tags/", "refs/remotes/"] {
            if let Some(rest) = self.0.strip_prefix(prefix) {
                return rest;
            }
        }
        &self.0
    }

    /// Whether this is a branch under `refs/heads/`.
    pub fn is_branch(&self) -> bool {
        self.0.starts_with("refs/heads/")
    }

    /// Whether this is a tag under `refs/tags/`.
    pub fn is_tag(&self) -> bool {
        self.0.starts_with("refs/tags/")
    }

    /// Build the branch name `refs/heads/<short>`.
    pub fn branch(short: &str) -> Result<Self, RefError> {
        Self::new(format!("refs/heads/{short}"))
    }

    /// Build the tag name `refs/tags/<short>`.
    pub fn tag(short: &str) -> Result<Self, RefError> {
        Self::new(format!("refs/tags/{short}"))
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for RefName {
    type Err = RefError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_names() {
        for ok in [
            "HEAD",
            "refs/heads/main",
            "refs/heads/feature/nested-topic",
            "refs/tags/v1.0.0",
            "refs/remotes/origin/main",
        ] {
            assert!(RefName::new(ok).is_ok(), "{ok} should be valid");
        }
    }

    #[test]
    fn rejects_bad_names() {
        for bad in [
            "",
            "/leading",
            "trailing/",
            "a//b",
            "a/../b",
            "refs/heads/main.lock",
            "refs/heads/sp ace",
            "refs/heads/ctrl\x07",
            "refs/heads/.hidden/..",
            "refs/./x",
            "refs/heads/col:on",
            "refs/heads/ti~lde",
            "refs/heads/ca^ret",
        ] {
            assert!(RefName::new(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn shorthand() {
        assert_eq!(RefName::branch("main").unwrap().shorthand(), "main");
        assert_eq!(RefName::tag("v1").unwrap().shorthand(), "v1");
        assert_eq!(RefName::new("HEAD").unwrap().shorthand(), "HEAD");
    }

    #[test]
    fn classification() {
        assert!(RefName::branch("x").unwrap().is_branch());
        assert!(!RefName::branch("x").unwrap().is_tag());
        assert!(RefName::tag("x").unwrap().is_tag());
    }

    #[test]
    fn ordering_is_lexicographic() {
        let a = RefName::new("refs/heads/a").unwrap();
        let b = RefName::new("refs/heads/b").unwrap();
        assert!(a < b);
    }
}
