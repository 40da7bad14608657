use std::fs;
use std::path::PathBuf;

use strata_hash::ObjectId;

use crate::{LooseError, LooseStore};

/// Iterator over the ids of all loose objects in a store.
pub struct LooseIter {
    /// Fan-out directories not yet visited, newest-name last.
    dirs: Vec<PathBuf>,
    /// Ids discovered in the directory currently being drained.
    current: Vec<ObjectId>,
}

impl LooseStore {
    /// Iterate the ids of every loose object. Files that don't parse as ids
    /// (temp files, stray junk) are skipped.
    pub fn iter(&self) -> Result<LooseIter, LooseError> {
        let mut dirs = Vec::new();
        match fs::read_dir(self.objects_dir()) {
            Ok(read) => {
                for entry in read {
                    let entry = entry?;
                    let name = entry.file_name();
                    let is_fanout = name
                        .to_str()
                        .is_some_and(|s| s.len() == 2 && s.bytes().all(|b| b.is_ascii_hexdigit()));
                    if is_fanout && entry.path().is_dir() {
                        dirs.push(entry.path());
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(LooseError::Io(e)),
        }
        dirs.sort();
        dirs.reverse();
        Ok(LooseIter {
            dirs,
            current: Vec::new(),
        })
    }
}

impl Iterator for LooseIter {
    type Item = Result<ObjectId, LooseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(id) = self.current.pop() {
                return Some(Ok(id));
            }
            let dir = self.dirs.pop()?;
            let prefix = dir.file_name().and_then(|n| n.to_str()).unwrap_or("").to_string();
            let read = match fs::read_dir(&dir) {
                Ok(r) => r,
                Err(e) => return Some(Err(LooseError::Io(e))),
            };
            for entry in read.flatten() {
                if let Some(rest) = entry.file_name().to_str() {
                    if let Ok(id) = ObjectId::from_hex(&format!("{prefix}{rest}")) {
                        self.current.push(id);
                    }
                }
            }
            self.current.sort();
            self.current.reverse();
        }
    }
}
