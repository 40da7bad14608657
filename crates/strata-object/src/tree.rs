use std::cmp::Ordering;

use bstr::{BStr, BString, ByteSlice};
use strata_hash::ObjectId;

use crate::{ObjectError, ObjectKind};

/// Mode of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryMode {
    /// Regular file (100644).
    Regular,
    /// Executable file (100755).
    Executable,
    /// Symbolic link (120000).
    Symlink,
    /// Subtree (040000).
    Directory,
}

impl EntryMode {
    /// Parse from octal ASCII bytes (e.g. `b"100644"`).
    pub fn from_bytes(s: &[u8]) -> Result<Self, ObjectError> {
        match s {
            b"100644" => Ok(Self::Regular),
            b"100755" => Ok(Self::Executable),
            b"120000" => Ok(Self::Symlink),
            b"40000" | b"040000" => Ok(Self::Directory),
            _ => Err(ObjectError::InvalidEntryMode(
                String::from_utf8_lossy(s).into(),
            )),
        }
    }

    /// Canonical octal rendering.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::Regular => b"100644",
            Self::Executable => b"100755",
            Self::Symlink => b"120000",
            Self::Directory => b"40000",
        }
    }

    /// The kind of object this entry points at.
    pub fn object_kind(&self) -> ObjectKind {
        match self {
            Self::Directory => ObjectKind::Tree,
            _ => ObjectKind::Blob,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory)
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::Regular | Self::Executable)
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self, Self::Symlink)
    }
}

/// A single named entry of a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: EntryMode,
    pub name: BString,
    pub id: ObjectId,
}

impl TreeEntry {
    pub fn new(mode: EntryMode, name: impl Into<BString>, id: ObjectId) -> Self {
        Self {
            mode,
            name: name.into(),
            id,
        }
    }
}

impl PartialOrd for TreeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TreeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Canonical order is plain byte order on the name; names are unique.
        self.name.cmp(&other.name)
    }
}

/// A tree: an ordered directory listing.
///
/// Entries are kept sorted by name and unique by name at all times, so the
/// canonical encoding is deterministic regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, keeping entries sorted. Replaces any entry with the
    /// same name.
    pub fn insert(&mut self, entry: TreeEntry) {
        match self
            .entries
            .binary_search_by(|e| e.name.cmp(&entry.name))
        {
            Ok(pos) => self.entries[pos] = entry,
            Err(pos) => self.entries.insert(pos, entry),
        }
    }

    /// Remove an entry by name. Returns the removed entry, if any.
    pub fn remove(&mut self, name: &BStr) -> Option<TreeEntry> {
        match self.entries.binary_search_by(|e| e.name.as_bstr().cmp(name)) {
            Ok(pos) => Some(self.entries.remove(pos)),
            Err(_) => None,
        }
    }

    /// Lookup an entry by name.
    pub fn get(&self, name: &BStr) -> Option<&TreeEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_bstr().cmp(name))
            .ok()
            .map(|pos| &self.entries[pos])
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode tree payload bytes.
    ///
    /// Each entry is `<mode-octal> <name>\0<32-byte id>`. Entries must be
    /// sorted by name and unique; anything else is rejected.
    pub fn decode(payload: &[u8]) -> Result<Self, ObjectError> {
        let mut entries: Vec<TreeEntry> = Vec::new();
        let mut pos = 0;

        while pos < payload.len() {
            let space = payload[pos..]
                .find_byte(b' ')
                .map(|p| p + pos)
                .ok_or_else(|| ObjectError::InvalidTreeEntry {
                    offset: pos,
                    reason: "missing space after mode".into(),
                })?;
            let mode = EntryMode::from_bytes(&payload[pos..space]).map_err(|_| {
                ObjectError::InvalidTreeEntry {
                    offset: pos,
                    reason: "invalid mode".into(),
                }
            })?;

            let name_start = space + 1;
            let nul = payload[name_start..]
                .find_byte(0)
                .map(|p| p + name_start)
                .ok_or_else(|| ObjectError::InvalidTreeEntry {
                    offset: name_start,
                    reason: "missing NUL after name".into(),
                })?;
            let name = BString::from(&payload[name_start..nul]);
            if name.is_empty() || name.contains(&b'/') {
                return Err(ObjectError::InvalidTreeEntry {
                    offset: name_start,
                    reason: "invalid entry name".into(),
                });
            }

            let id_start = nul + 1;
            let id_end = id_start + strata_hash::DIGEST_LEN;
            if id_end > payload.len() {
                return Err(ObjectError::InvalidTreeEntry {
                    offset: id_start,
                    reason: "truncated id".into(),
                });
            }
            let id = ObjectId::from_bytes(&payload[id_start..id_end])?;

            if let Some(last) = entries.last() {
                match last.name.cmp(&name) {
                    Ordering::Equal => {
                        return Err(ObjectError::DuplicateTreeEntry(name));
                    }
                    Ordering::Greater => {
                        return Err(ObjectError::UnsortedTreeEntry(name));
                    }
                    Ordering::Less => {}
                }
            }

            entries.push(TreeEntry { mode, name, id });
            pos = id_end;
        }

        Ok(Self { entries })
    }

    /// Canonical payload encoding: entries in name order.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.entries.len() * 48);
        for entry in &self.entries {
            out.extend_from_slice(entry.mode.as_bytes());
            out.push(b' ');
            out.extend_from_slice(&entry.name);
            out.push(0);
            out.extend_from_slice(entry.id.as_bytes());
        }
        out
    }
}

impl FromIterator<TreeEntry> for Tree {
    fn from_iter<I: IntoIterator<Item = TreeEntry>>(iter: I) -> Self {
        let mut tree = Tree::new();
        for entry in iter {
            tree.insert(entry);
        }
        tree
    }
}
