//! The packed-refs overflow file.
//!
//! Bulk storage for direct refs: sorted lines of `<hex> <name>`. Loose refs
//! shadow packed ones; deletion rewrites the file without the victim.

use std::fs;
use std::path::{Path, PathBuf};

use strata_hash::ObjectId;

use crate::lockfile::LockFile;
use crate::name::RefName;
use crate::RefError;

const HEADER: &str = "# strata packed-refs v1";

/// In-memory view of the packed-refs file, sorted by name.
#[derive(Debug, Clone, Default)]
pub struct PackedRefs {
    entries: Vec<(RefName, ObjectId)>,
}

impl PackedRefs {
    pub(crate) fn file_path(root: &Path) -> PathBuf {
        root.join("packed-refs")
    }

    /// Load from `root/packed-refs`. A missing file is an empty set.
    pub fn load(root: &Path) -> Result<Self, RefError> {
        let path = Self::file_path(root);
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => return Err(RefError::IoPath { path, source: e }),
        };

        let mut entries = Vec::new();
        for line in contents.lines() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (hex, name) = line
                .split_once(' ')
                .ok_or_else(|| RefError::Parse(format!("bad packed-refs line: {line:?}")))?;
            entries.push((RefName::new(name)?, ObjectId::from_hex(hex)?));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Self { entries })
    }

    /// Binary-search for a name.
    pub fn find(&self, name: &RefName) -> Option<ObjectId> {
        self.entries
            .binary_search_by(|(n, _)| n.cmp(name))
            .ok()
            .map(|i| self.entries[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RefName, ObjectId)> {
        self.entries.iter().map(|(n, id)| (n, *id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace an entry.
    pub(crate) fn upsert(&mut self, name: RefName, id: ObjectId) {
        match self.entries.binary_search_by(|(n, _)| n.cmp(&name)) {
            Ok(i) => self.entries[i].1 = id,
            Err(i) => self.entries.insert(i, (name, id)),
        }
    }

    /// Remove an entry. Returns whether it was present.
    pub(crate) fn remove(&mut self, name: &RefName) -> bool {
        match self.entries.binary_search_by(|(n, _)| n.cmp(name)) {
            Ok(i) => {
                self.entries.remove(i);
                true
            }
            Err(_) => false,
        }
    }

    /// Write the whole file back under its lock.
    pub(crate) fn save(&self, root: &Path) -> Result<(), RefError> {
        let mut out = String::with_capacity(32 + self.entries.len() * 90);
        out.push_str(HEADER);
        out.push('\n');
        for (name, id) in &self.entries {
            out.push_str(&id.to_hex());
            out.push(' ');
            out.push_str(name.as_str());
            out.push('\n');
        }

        let mut lock = LockFile::acquire(Self::file_path(root))?;
        lock.write_all(out.as_bytes())?;
        lock.commit()
    }
}
