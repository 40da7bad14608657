//! The files-backed reference store.
//!
//! Loose refs live one-per-file under the store root (`refs/heads/main` is
//! literally that path); bulk storage overflows into `packed-refs`. Loose
//! always shadows packed. Updates lock the individual ref file, re-verify
//! the caller's expected old value under the lock, and only then rename the
//! new value into place.

use std::fs;
use std::path::{Path, PathBuf};

use bstr::BString;
use strata_hash::ObjectId;
use strata_object::Signature;

use crate::lockfile::LockFile;
use crate::name::RefName;
use crate::packed::PackedRefs;
use crate::reflog::{self, ReflogEntry};
use crate::{RefError, Reference, MAX_SYMREF_HOPS};

/// Reference store rooted at a repository directory.
pub struct RefStore {
    root: PathBuf,
}

impl RefStore {
    /// Open a store rooted at `root`. Directories appear lazily on write.
    pub fn open(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ref_path(&self, name: &RefName) -> PathBuf {
        self.root.join(name.as_str())
    }

    /// Read a reference without following symbolic links.
    pub fn read(&self, name: &RefName) -> Result<Reference, RefError> {
        if let Some(reference) = self.read_loose(name)? {
            return Ok(reference);
        }
        let packed = PackedRefs::load(&self.root)?;
        match packed.find(name) {
            Some(target) => Ok(Reference::Direct {
                name: name.clone(),
                target,
            }),
            None => Err(RefError::NotFound(name.to_string())),
        }
    }

    /// Whether a reference exists (loose or packed).
    pub fn exists(&self, name: &RefName) -> bool {
        matches!(self.read(name), Ok(_))
    }

    /// Follow symbolic references to a concrete object id.
    ///
    /// Fails with `TooManyRedirects` past [`MAX_SYMREF_HOPS`] hops (the
    /// cycle guard) and `NotFound` at a dangling target.
    pub fn resolve(&self, name: &RefName) -> Result<ObjectId, RefError> {
        let mut current = name.clone();
        for _ in 0..=MAX_SYMREF_HOPS {
            match self.read(&current)? {
                Reference::Direct { target, .. } => return Ok(target),
                Reference::Symbolic { target, .. } => current = target,
            }
        }
        Err(RefError::TooManyRedirects(name.to_string()))
    }

    /// Atomically move a reference from `expected` to `new`.
    ///
    /// The expected-old-value check runs under the ref's lock; a mismatch
    /// fails with `CasMismatch` and the caller must re-read and retry or
    /// give up. Appends one reflog entry on success.
    pub fn update(
        &self,
        name: &RefName,
        expected: &ObjectId,
        new: ObjectId,
        committer: &Signature,
        message: &str,
    ) -> Result<(), RefError> {
        let mut lock = LockFile::acquire(self.ref_path(name))?;

        let current = self
            .current_direct(name)?
            .ok_or_else(|| RefError::NotFound(name.to_string()))?;
        if current != *expected {
            return Err(RefError::CasMismatch {
                name: name.to_string(),
                expected: *expected,
                actual: current,
            });
        }

        lock.write_all(format!("{}\n", new.to_hex()).as_bytes())?;
        lock.commit()?;

        self.log(name, current, new, committer, message)
    }

    /// Create a new reference.
    ///
    /// Fails with `AlreadyExists` unless `force`; forcing overwrites and
    /// records the replaced value as the reflog's old id.
    pub fn create(
        &self,
        name: &RefName,
        target: ObjectId,
        force: bool,
        committer: &Signature,
        message: &str,
    ) -> Result<(), RefError> {
        let mut lock = LockFile::acquire(self.ref_path(name))?;

        let current = self.current_direct(name)?;
        if current.is_some() && !force {
            return Err(RefError::AlreadyExists(name.to_string()));
        }

        lock.write_all(format!("{}\n", target.to_hex()).as_bytes())?;
        lock.commit()?;

        self.log(name, current.unwrap_or(ObjectId::NULL), target, committer, message)
    }

    /// Delete a reference.
    ///
    /// Fails with `NotFound` if absent — deleting twice reports the second
    /// deletion the same way, with no side effects. When `expected` is
    /// given the deletion is CAS-guarded like an update. The reflog gets a
    /// final `old -> null` entry and is retained.
    pub fn delete(
        &self,
        name: &RefName,
        expected: Option<&ObjectId>,
        committer: &Signature,
        message: &str,
    ) -> Result<(), RefError> {
        let lock = LockFile::acquire(self.ref_path(name))?;

        let current = self
            .current_direct(name)?
            .ok_or_else(|| RefError::NotFound(name.to_string()))?;
        if let Some(expected) = expected {
            if current != *expected {
                return Err(RefError::CasMismatch {
                    name: name.to_string(),
                    expected: *expected,
                    actual: current,
                });
            }
        }

        match fs::remove_file(self.ref_path(name)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(RefError::IoPath {
                    path: self.ref_path(name),
                    source: e,
                })
            }
        }

        // Drop any packed copy so it cannot resurface the ref.
        let mut packed = PackedRefs::load(&self.root)?;
        if packed.remove(name) {
            packed.save(&self.root)?;
        }

        lock.rollback()?;
        self.log(name, current, ObjectId::NULL, committer, message)
    }

    /// Point a symbolic reference (such as HEAD) at another reference.
    pub fn set_symbolic(&self, name: &RefName, target: &RefName) -> Result<(), RefError> {
        let mut lock = LockFile::acquire(self.ref_path(name))?;
        lock.write_all(format!("ref: {}\n", target).as_bytes())?;
        lock.commit()
    }

    /// References sorted by name, optionally under a prefix. Loose entries
    /// shadow packed ones of the same name.
    pub fn iter(&self, prefix: Option<&str>) -> Result<Vec<Reference>, RefError> {
        let mut names: Vec<RefName> = Vec::new();
        collect_loose_names(&self.root, &self.root.join("refs"), &mut names)?;

        let packed = PackedRefs::load(&self.root)?;
        for (name, _) in packed.iter() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }

        names.sort();
        names.dedup();

        let mut refs = Vec::with_capacity(names.len());
        for name in names {
            if let Some(prefix) = prefix {
                if !name.as_str().starts_with(prefix) {
                    continue;
                }
            }
            refs.push(self.read(&name)?);
        }
        Ok(refs)
    }

    /// The reflog for a reference, newest entry first.
    pub fn reflog(&self, name: &RefName) -> Result<Vec<ReflogEntry>, RefError> {
        reflog::read(&self.root, name)
    }

    /// Migrate all loose refs under `refs/` into the packed-refs file.
    /// Returns how many were packed. Symbolic refs stay loose.
    pub fn pack_refs(&self) -> Result<usize, RefError> {
        let mut names: Vec<RefName> = Vec::new();
        collect_loose_names(&self.root, &self.root.join("refs"), &mut names)?;

        let mut packed = PackedRefs::load(&self.root)?;
        let mut moved = Vec::new();
        for name in names {
            match self.read_loose(&name)? {
                Some(Reference::Direct { target, .. }) => {
                    packed.upsert(name.clone(), target);
                    moved.push(name);
                }
                _ => continue,
            }
        }
        if moved.is_empty() {
            return Ok(0);
        }
        packed.save(&self.root)?;

        for name in &moved {
            // The packed copy now serves this name.
            match fs::remove_file(self.ref_path(name)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(RefError::IoPath {
                        path: self.ref_path(name),
                        source: e,
                    })
                }
            }
        }
        Ok(moved.len())
    }

    // --- internals ---

    fn read_loose(&self, name: &RefName) -> Result<Option<Reference>, RefError> {
        let path = self.ref_path(name);
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RefError::IoPath { path, source: e }),
        };
        let line = contents.trim_end();

        if let Some(target) = line.strip_prefix("ref: ") {
            return Ok(Some(Reference::Symbolic {
                name: name.clone(),
                target: RefName::new(target)?,
            }));
        }
        Ok(Some(Reference::Direct {
            name: name.clone(),
            target: ObjectId::from_hex(line)
                .map_err(|e| RefError::Parse(format!("bad ref content in {name}: {e}")))?,
        }))
    }

    /// Current direct value of a ref: loose first, then packed. A symbolic
    /// ref cannot be CAS-updated and is reported as `NotDirect`.
    fn current_direct(&self, name: &RefName) -> Result<Option<ObjectId>, RefError> {
        match self.read_loose(name)? {
            Some(Reference::Direct { target, .. }) => Ok(Some(target)),
            Some(Reference::Symbolic { .. }) => Err(RefError::NotDirect(name.to_string())),
            None => Ok(PackedRefs::load(&self.root)?.find(name)),
        }
    }

    fn log(
        &self,
        name: &RefName,
        old_id: ObjectId,
        new_id: ObjectId,
        committer: &Signature,
        message: &str,
    ) -> Result<(), RefError> {
        reflog::append(
            &self.root,
            name,
            &ReflogEntry {
                old_id,
                new_id,
                committer: committer.clone(),
                message: BString::from(message),
            },
        )
    }
}

/// Recursively collect loose ref names under `dir`, as names relative to
/// `root`. Lock files are skipped.
fn collect_loose_names(
    root: &Path,
    dir: &Path,
    out: &mut Vec<RefName>,
) -> Result<(), RefError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(RefError::IoPath {
                path: dir.to_path_buf(),
                source: e,
            })
        }
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_loose_names(root, &path, out)?;
        } else if !path.extension().is_some_and(|ext| ext == "lock") {
            let relative = path
                .strip_prefix(root)
                .ok()
                .and_then(|p| p.to_str())
                .map(|s| s.replace('\\', "/"));
            if let Some(relative) = relative {
                if let Ok(name) = RefName::new(relative) {
                    out.push(name);
                }
            }
        }
    }
    Ok(())
}
