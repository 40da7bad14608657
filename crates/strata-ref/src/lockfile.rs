//! Per-file write locks with atomic commit.
//!
//! Protocol: create `<path>.lock` with O_CREAT|O_EXCL, write the new
//! contents there, then atomically rename over the target. Dropping an
//! uncommitted lock removes the lock file (rollback).

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::RefError;

const LOCK_SUFFIX: &str = ".lock";

/// RAII guard over `<path>.lock`.
pub struct LockFile {
    path: PathBuf,
    lock_path: PathBuf,
    file: Option<File>,
    committed: bool,
}

impl LockFile {
    /// Acquire the lock, failing with `Locked` if another writer holds it.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, RefError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| RefError::IoPath {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let lock_path = PathBuf::from(format!("{}{}", path.display(), LOCK_SUFFIX));

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    RefError::Locked(path.display().to_string())
                } else {
                    RefError::IoPath {
                        path: lock_path.clone(),
                        source: e,
                    }
                }
            })?;

        Ok(Self {
            path,
            lock_path,
            file: Some(file),
            committed: false,
        })
    }

    /// Write the new contents into the lock file.
    pub fn write_all(&mut self, data: &[u8]) -> Result<(), RefError> {
        let file = self.file.as_mut().ok_or_else(|| RefError::IoPath {
            path: self.lock_path.clone(),
            source: io::Error::other("lock file already closed"),
        })?;
        file.write_all(data).map_err(|e| RefError::IoPath {
            path: self.lock_path.clone(),
            source: e,
        })
    }

    /// Flush, sync, and atomically rename over the target.
    pub fn commit(mut self) -> Result<(), RefError> {
        if let Some(mut file) = self.file.take() {
            file.flush().and_then(|_| file.sync_all()).map_err(|e| {
                RefError::IoPath {
                    path: self.lock_path.clone(),
                    source: e,
                }
            })?;
        }
        fs::rename(&self.lock_path, &self.path).map_err(|e| RefError::IoPath {
            path: self.path.clone(),
            source: e,
        })?;
        self.committed = true;
        Ok(())
    }

    /// Release the lock without touching the target.
    pub fn rollback(mut self) -> Result<(), RefError> {
        self.file.take();
        fs::remove_file(&self.lock_path).map_err(|e| RefError::IoPath {
            path: self.lock_path.clone(),
            source: e,
        })?;
        self.committed = true; // nothing left for Drop to clean up
        Ok(())
    }

    /// The target path this lock protects.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if !self.committed {
            self.file.take();
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}
