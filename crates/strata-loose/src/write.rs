use std::fs;
use std::io::Write;

use flate2::write::ZlibEncoder;
use strata_hash::{Hasher, ObjectId};
use strata_object::{header, ObjectKind};

use crate::{LooseError, LooseStore};

impl LooseStore {
    /// Write a payload of the given kind. Returns the id.
    ///
    /// Idempotent: if an object with the same id already exists, nothing is
    /// written and the existing id is returned.
    pub fn write(&self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectId, LooseError> {
        let envelope = header::write_header(kind, payload.len());

        let id = {
            let mut hasher = Hasher::new();
            hasher.update(&envelope);
            hasher.update(payload);
            hasher.finalize()
        };

        if self.contains(&id) {
            return Ok(id);
        }

        let final_path = self.object_path(&id);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Compress into a temp file on the same filesystem, then rename.
        fs::create_dir_all(&self.objects_dir)?;
        let tmp = tempfile::NamedTempFile::new_in(&self.objects_dir)?;
        let mut encoder = ZlibEncoder::new(tmp, self.compression);
        encoder.write_all(&envelope)?;
        encoder.write_all(payload)?;
        let tmp = encoder.finish()?;

        match tmp.persist_noclobber(&final_path) {
            Ok(_) => {}
            // Another writer produced the identical object first; content
            // addressing makes that a success.
            Err(e) if final_path.exists() => drop(e),
            Err(e) => return Err(LooseError::Io(e.error)),
        }

        Ok(id)
    }
}
