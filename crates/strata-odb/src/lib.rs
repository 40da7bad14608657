//! The unified object store.
//!
//! One logical, content-addressed object space over two physical layers:
//! loose objects (one file each) and immutable packs. Reads try loose
//! storage first, then each pack's index. Writes always land loose; packing
//! is a separate, exclusive operation.
//!
//! `put` validates structured objects (trees, commits, tags) before
//! hashing, so a malformed object is rejected rather than stored. Existing
//! objects are immutable, which is what makes concurrent reads against
//! concurrent writes safe: a reader can never observe a half-written
//! object, only a missing one.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use lru::LruCache;
use strata_hash::ObjectId;
use strata_loose::LooseStore;
use strata_object::{Object, ObjectError, ObjectKind};
use strata_pack::{PackBuilder, PackFile, PackSource};

/// Cached entries: kind plus payload, shared between callers.
type CachedObject = Arc<(ObjectKind, Vec<u8>)>;

const CACHE_SIZE: usize = 1024;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum OdbError {
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    #[error("invalid object: {0}")]
    InvalidObject(#[from] ObjectError),

    #[error("expected {expected} object, found {actual} at {id}")]
    UnexpectedKind {
        id: ObjectId,
        expected: &'static str,
        actual: ObjectKind,
    },

    #[error(transparent)]
    Loose(#[from] strata_loose::LooseError),

    #[error(transparent)]
    Pack(#[from] strata_pack::PackError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Kind and size of an object, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHeader {
    pub kind: ObjectKind,
    pub size: usize,
}

/// Content-addressed storage for blobs, trees, commits, and tags.
pub struct ObjectStore {
    loose: LooseStore,
    packs: RwLock<Vec<PackFile>>,
    cache: Mutex<LruCache<ObjectId, CachedObject>>,
    objects_dir: PathBuf,
}

impl ObjectStore {
    /// Open the store rooted at `objects_dir`, discovering existing packs
    /// under `objects_dir/pack/`.
    pub fn open(objects_dir: impl AsRef<Path>) -> Result<Self, OdbError> {
        let objects_dir = objects_dir.as_ref().to_path_buf();
        let loose = LooseStore::open(&objects_dir);
        let packs = discover_packs(&objects_dir)?;
        Ok(Self {
            loose,
            packs: RwLock::new(packs),
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(CACHE_SIZE).expect("nonzero cache size"),
            )),
            objects_dir,
        })
    }

    /// Compute the id a payload would get, without storing anything.
    pub fn hash(kind: ObjectKind, payload: &[u8]) -> ObjectId {
        strata_hash::hash_object(kind.as_str(), payload)
    }

    /// Store a payload of the given kind. Returns its id.
    ///
    /// Idempotent: identical content maps to the same id and is stored
    /// once. Trees, commits, and tags are validated before hashing;
    /// malformed payloads fail with `InvalidObject` and are never stored.
    pub fn put(&self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectId, OdbError> {
        if kind != ObjectKind::Blob {
            Object::decode_payload(kind, payload)?;
        }
        Ok(self.loose.write(kind, payload)?)
    }

    /// Store a structured object.
    pub fn put_object(&self, object: &Object) -> Result<ObjectId, OdbError> {
        // Already structured; encoding is canonical by construction.
        Ok(self.loose.write(object.kind(), &object.encode())?)
    }

    /// Read an object's kind and payload. Fails with `NotFound` if the id
    /// is in neither loose nor packed storage.
    pub fn get(&self, id: &ObjectId) -> Result<(ObjectKind, Vec<u8>), OdbError> {
        let cached = self.get_cached(id)?;
        Ok((cached.0, cached.1.clone()))
    }

    /// Read and decode an object.
    pub fn get_object(&self, id: &ObjectId) -> Result<Object, OdbError> {
        let cached = self.get_cached(id)?;
        Ok(Object::decode_payload(cached.0, &cached.1)?)
    }

    fn get_cached(&self, id: &ObjectId) -> Result<CachedObject, OdbError> {
        if let Some(hit) = self.cache.lock().expect("odb cache poisoned").get(id) {
            return Ok(hit.clone());
        }

        let found = self.read_uncached(id)?;
        let entry: CachedObject = Arc::new(found);
        self.cache
            .lock()
            .expect("odb cache poisoned")
            .put(*id, entry.clone());
        Ok(entry)
    }

    fn read_uncached(&self, id: &ObjectId) -> Result<(ObjectKind, Vec<u8>), OdbError> {
        if let Some(found) = self.loose.read(id)? {
            return Ok(found);
        }
        let packs = self.packs.read().expect("pack list poisoned");
        for pack in packs.iter() {
            if pack.contains(id) {
                return Ok(pack.resolve(id)?);
            }
        }
        Err(OdbError::NotFound(*id))
    }

    /// Whether an object exists, without reading its payload.
    pub fn exists(&self, id: &ObjectId) -> bool {
        if self.loose.contains(id) {
            return true;
        }
        let packs = self.packs.read().expect("pack list poisoned");
        packs.iter().any(|p| p.contains(id))
    }

    /// Read just kind and size, without materializing the payload.
    pub fn read_header(&self, id: &ObjectId) -> Result<ObjectHeader, OdbError> {
        if let Some((kind, size)) = self.loose.read_header(id)? {
            return Ok(ObjectHeader { kind, size });
        }
        let packs = self.packs.read().expect("pack list poisoned");
        for pack in packs.iter() {
            if pack.contains(id) {
                let (kind, size) = pack.entry_header(id)?;
                return Ok(ObjectHeader { kind, size });
            }
        }
        Err(OdbError::NotFound(*id))
    }

    /// Read an object expected to be a commit.
    pub fn get_commit(&self, id: &ObjectId) -> Result<strata_object::Commit, OdbError> {
        match self.get_object(id)? {
            Object::Commit(c) => Ok(c),
            other => Err(OdbError::UnexpectedKind {
                id: *id,
                expected: "commit",
                actual: other.kind(),
            }),
        }
    }

    /// Read an object expected to be a tree.
    pub fn get_tree(&self, id: &ObjectId) -> Result<strata_object::Tree, OdbError> {
        match self.get_object(id)? {
            Object::Tree(t) => Ok(t),
            other => Err(OdbError::UnexpectedKind {
                id: *id,
                expected: "tree",
                actual: other.kind(),
            }),
        }
    }

    /// Read an object expected to be a blob, returning its payload.
    pub fn get_blob(&self, id: &ObjectId) -> Result<Vec<u8>, OdbError> {
        let (kind, payload) = self.get(id)?;
        if kind != ObjectKind::Blob {
            return Err(OdbError::UnexpectedKind {
                id: *id,
                expected: "blob",
                actual: kind,
            });
        }
        Ok(payload)
    }

    /// Follow tag objects until a non-tag object is reached.
    pub fn peel(&self, id: &ObjectId) -> Result<(ObjectId, ObjectKind), OdbError> {
        let mut current = *id;
        loop {
            match self.get_object(&current)? {
                Object::Tag(tag) => current = tag.target,
                other => return Ok((current, other.kind())),
            }
        }
    }

    /// Ids of all loose objects.
    pub fn iter_loose(
        &self,
    ) -> Result<impl Iterator<Item = Result<ObjectId, strata_loose::LooseError>>, OdbError> {
        Ok(self.loose.iter()?)
    }

    /// Batch the given objects into a new pack under `objects/pack/` and
    /// remove their loose copies.
    ///
    /// Exclusive, offline operation: must not run concurrently with another
    /// pack build over the same objects.
    pub fn pack_objects(&self, ids: &[ObjectId]) -> Result<usize, OdbError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut sources = Vec::with_capacity(ids.len());
        for id in ids {
            let (kind, payload) = self.get(id)?;
            sources.push(PackSource {
                id: *id,
                kind,
                payload,
            });
        }
        let count = sources.len();

        let (pack_path, _) =
            PackBuilder::new().write_to_dir(self.objects_dir.join("pack"), sources)?;
        let pack = PackFile::open(&pack_path)?;
        self.packs.write().expect("pack list poisoned").push(pack);

        // The pack now serves these ids; drop the loose copies.
        for id in ids {
            let path = self.loose.object_path(id);
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(OdbError::Io(e)),
            }
        }

        Ok(count)
    }

    /// Re-scan `objects/pack/` (after an external repack).
    pub fn refresh_packs(&self) -> Result<(), OdbError> {
        let new_packs = discover_packs(&self.objects_dir)?;
        *self.packs.write().expect("pack list poisoned") = new_packs;
        Ok(())
    }

    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }
}

fn discover_packs(objects_dir: &Path) -> Result<Vec<PackFile>, OdbError> {
    let pack_dir = objects_dir.join("pack");
    if !pack_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut packs = Vec::new();
    let mut paths: Vec<PathBuf> = std::fs::read_dir(&pack_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "pack"))
        .collect();
    paths.sort();

    for path in paths {
        match PackFile::open(&path) {
            Ok(pack) => packs.push(pack),
            // A pack that fails to open is skipped; its objects may still
            // exist loose or in other packs.
            Err(_) => continue,
        }
    }
    Ok(packs)
}
