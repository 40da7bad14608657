//! Reading packs: entry lookup, delta-chain resolution, verification.

use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use memmap2::Mmap;
use strata_hash::{ObjectId, DIGEST_LEN};
use strata_object::ObjectKind;

use crate::build::tag_kind;
use crate::delta::{apply_delta, read_varint};
use crate::index::PackIndex;
use crate::{PackError, FORMAT_VERSION, MAX_DELTA_DEPTH, PACK_MAGIC};

/// Backing bytes of an open pack: a mapped file or an in-memory buffer.
enum PackData {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl std::ops::Deref for PackData {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        match self {
            Self::Mapped(m) => m,
            Self::Owned(v) => v,
        }
    }
}

/// A decoded pack entry before delta resolution.
struct RawEntry {
    kind: ObjectKind,
    base: Option<ObjectId>,
    data: Vec<u8>,
}

/// Framing of an entry, parsed without decompressing anything.
struct EntryMeta {
    kind: ObjectKind,
    base: Option<ObjectId>,
    raw_len: usize,
    data_start: usize,
    comp_len: usize,
    crc: u32,
}

/// An open, immutable pack with its index.
pub struct PackFile {
    data: PackData,
    index: PackIndex,
    path: Option<PathBuf>,
}

impl PackFile {
    /// Open a pack file and its sibling `.idx`, memory-mapping the pack.
    pub fn open(pack_path: impl AsRef<Path>) -> Result<Self, PackError> {
        let pack_path = pack_path.as_ref();
        let file = std::fs::File::open(pack_path)?;
        // The pack is immutable once written; mapping it shared is safe.
        let map = unsafe { Mmap::map(&file)? };
        let index = PackIndex::load(pack_path.with_extension("idx"))?;
        let pack = Self {
            data: PackData::Mapped(map),
            index,
            path: Some(pack_path.to_path_buf()),
        };
        pack.check_header()?;
        Ok(pack)
    }

    /// Wrap in-memory pack bytes (used by tests and transport ingestion).
    pub fn from_bytes(bytes: Vec<u8>, index: PackIndex) -> Result<Self, PackError> {
        let pack = Self {
            data: PackData::Owned(bytes),
            index,
            path: None,
        };
        pack.check_header()?;
        Ok(pack)
    }

    fn check_header(&self) -> Result<(), PackError> {
        let data: &[u8] = &self.data;
        if data.len() < 12 || &data[..4] != PACK_MAGIC {
            return Err(PackError::Corrupt("bad pack magic".into()));
        }
        let version = u32::from_le_bytes(data[4..8].try_into().unwrap());
        if version != FORMAT_VERSION {
            return Err(PackError::Corrupt(format!("unsupported pack version {version}")));
        }
        Ok(())
    }

    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// O(log n) membership test.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.index.contains(id)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Kind and final payload size of a member, without resolving the
    /// whole chain. Full entries answer from the entry header alone; for
    /// delta entries the size comes from the delta stream's declared
    /// target length, so only that (small) stream is decompressed.
    pub fn entry_header(&self, id: &ObjectId) -> Result<(ObjectKind, usize), PackError> {
        let meta = self.entry_meta(id)?;
        if meta.base.is_none() {
            return Ok((meta.kind, meta.raw_len));
        }
        let entry = self.read_entry(id)?;
        let (_, n) = read_varint(&entry.data).ok_or_else(|| PackError::CorruptEntry {
            id: *id,
            reason: "truncated delta header".into(),
        })?;
        let (target_len, _) =
            read_varint(&entry.data[n..]).ok_or_else(|| PackError::CorruptEntry {
                id: *id,
                reason: "truncated delta header".into(),
            })?;
        Ok((entry.kind, target_len))
    }

    /// Reconstruct a member's payload, replaying its delta chain.
    ///
    /// The chain walk is bounded by [`MAX_DELTA_DEPTH`]; a longer chain, a
    /// dangling base reference, or a checksum mismatch is corruption.
    pub fn resolve(&self, id: &ObjectId) -> Result<(ObjectKind, Vec<u8>), PackError> {
        let mut deltas: Vec<Vec<u8>> = Vec::new();
        let mut kind = None;
        let mut current = *id;

        let payload = loop {
            let entry = self.read_entry(&current)?;
            kind.get_or_insert(entry.kind);
            match entry.base {
                None => break entry.data,
                Some(base) => {
                    if deltas.len() >= MAX_DELTA_DEPTH {
                        return Err(PackError::ChainTooDeep {
                            id: *id,
                            max: MAX_DELTA_DEPTH,
                        });
                    }
                    deltas.push(entry.data);
                    current = base;
                }
            }
        };

        let mut payload = payload;
        for delta in deltas.iter().rev() {
            payload = apply_delta(&payload, delta)?;
        }

        // kind is always set: the loop body runs at least once.
        Ok((kind.unwrap_or(ObjectKind::Blob), payload))
    }

    /// Re-resolve and re-hash every member, verifying ids and checksums.
    /// Returns the number of members checked.
    pub fn verify(&self) -> Result<usize, PackError> {
        let ids: Vec<ObjectId> = self.index.iter().map(|r| r.id).collect();
        for id in &ids {
            let (kind, payload) = self.resolve(id)?;
            let actual = strata_hash::hash_object(kind.as_str(), &payload);
            if actual != *id {
                return Err(PackError::CorruptEntry {
                    id: *id,
                    reason: format!("content hashes to {}", actual.to_hex()),
                });
            }
        }
        Ok(ids.len())
    }

    /// Parse an entry's framing without touching its compressed data.
    fn entry_meta(&self, id: &ObjectId) -> Result<EntryMeta, PackError> {
        let record = self.index.find(id).ok_or(PackError::NotFound(*id))?;
        let data: &[u8] = &self.data;
        let mut pos = record.offset as usize;

        let tag = *data.get(pos).ok_or_else(|| PackError::CorruptEntry {
            id: *id,
            reason: "offset past end of pack".into(),
        })?;
        pos += 1;
        let kind = tag_kind(tag).ok_or_else(|| PackError::CorruptEntry {
            id: *id,
            reason: format!("unknown entry tag {tag:#04x}"),
        })?;

        let base = if tag & 0x80 != 0 {
            let end = pos + DIGEST_LEN;
            let bytes = data.get(pos..end).ok_or_else(|| PackError::CorruptEntry {
                id: *id,
                reason: "truncated base id".into(),
            })?;
            pos = end;
            Some(ObjectId::from_bytes(bytes).map_err(|e| PackError::CorruptEntry {
                id: *id,
                reason: format!("bad base id: {e}"),
            })?)
        } else {
            None
        };

        let (raw_len, n) = read_varint(&data[pos..]).ok_or_else(|| PackError::CorruptEntry {
            id: *id,
            reason: "truncated length".into(),
        })?;
        pos += n;
        let (comp_len, n) = read_varint(&data[pos..]).ok_or_else(|| PackError::CorruptEntry {
            id: *id,
            reason: "truncated length".into(),
        })?;
        pos += n;

        if pos + comp_len > data.len() {
            return Err(PackError::CorruptEntry {
                id: *id,
                reason: "truncated entry data".into(),
            });
        }

        Ok(EntryMeta {
            kind,
            base,
            raw_len,
            data_start: pos,
            comp_len,
            crc: record.crc,
        })
    }

    /// Read and decompress one entry, checking its crc against the index.
    fn read_entry(&self, id: &ObjectId) -> Result<RawEntry, PackError> {
        let meta = self.entry_meta(id)?;
        let data: &[u8] = &self.data;
        let compressed = &data[meta.data_start..meta.data_start + meta.comp_len];

        let mut crc = crc32fast::Hasher::new();
        crc.update(compressed);
        if crc.finalize() != meta.crc {
            return Err(PackError::CorruptEntry {
                id: *id,
                reason: "crc mismatch".into(),
            });
        }

        let mut decoded = Vec::with_capacity(meta.raw_len);
        ZlibDecoder::new(compressed)
            .read_to_end(&mut decoded)
            .map_err(|e| PackError::CorruptEntry {
                id: *id,
                reason: format!("decompression failed: {e}"),
            })?;
        if decoded.len() != meta.raw_len {
            return Err(PackError::CorruptEntry {
                id: *id,
                reason: format!(
                    "length mismatch: header says {}, got {}",
                    meta.raw_len,
                    decoded.len()
                ),
            });
        }

        Ok(RawEntry {
            kind: meta.kind,
            base: meta.base,
            data: decoded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{PackBuilder, PackSource};

    fn source(kind: ObjectKind, payload: Vec<u8>) -> PackSource {
        PackSource {
            id: strata_hash::hash_object(kind.as_str(), &payload),
            kind,
            payload,
        }
    }

    fn similar_blobs(n: usize) -> Vec<PackSource> {
        let base: Vec<u8> = (0..4096u32).map(|i| (i % 211) as u8).collect();
        (0..n)
            .map(|i| {
                let mut payload = base.clone();
                payload.extend_from_slice(format!("tail-{i}").as_bytes());
                source(ObjectKind::Blob, payload)
            })
            .collect()
    }

    #[test]
    fn resolve_roundtrips_every_member() {
        let objects = similar_blobs(8);
        let expected: Vec<(ObjectId, Vec<u8>)> =
            objects.iter().map(|s| (s.id, s.payload.clone())).collect();

        let (bytes, index) = PackBuilder::new().build(objects).unwrap();
        let pack = PackFile::from_bytes(bytes, index).unwrap();

        for (id, payload) in expected {
            let (kind, resolved) = pack.resolve(&id).unwrap();
            assert_eq!(kind, ObjectKind::Blob);
            assert_eq!(resolved, payload);
        }
    }

    #[test]
    fn entry_header_reports_final_size() {
        let objects = similar_blobs(4);
        let sizes: Vec<(ObjectId, usize)> =
            objects.iter().map(|s| (s.id, s.payload.len())).collect();
        let (bytes, index) = PackBuilder::new().build(objects).unwrap();
        let pack = PackFile::from_bytes(bytes, index).unwrap();
        for (id, size) in sizes {
            assert_eq!(pack.entry_header(&id).unwrap(), (ObjectKind::Blob, size));
        }
    }

    #[test]
    fn missing_member_is_not_found() {
        let (bytes, index) = PackBuilder::new().build(similar_blobs(2)).unwrap();
        let pack = PackFile::from_bytes(bytes, index).unwrap();
        let absent = strata_hash::hash_object("blob", b"not packed");
        assert!(matches!(pack.resolve(&absent), Err(PackError::NotFound(_))));
        assert!(!pack.contains(&absent));
    }

    #[test]
    fn flipped_byte_fails_crc() {
        let objects = similar_blobs(2);
        let victim = objects[0].id;
        let (mut bytes, index) = PackBuilder::new().build(objects).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let pack = PackFile::from_bytes(bytes, index).unwrap();
        // One of the two members now fails its checksum.
        let other_failed = pack.verify().is_err();
        let victim_failed = pack.resolve(&victim).is_err();
        assert!(other_failed || victim_failed);
    }

    #[test]
    fn verify_passes_on_clean_pack() {
        let (bytes, index) = PackBuilder::new().build(similar_blobs(6)).unwrap();
        let pack = PackFile::from_bytes(bytes, index).unwrap();
        assert_eq!(pack.verify().unwrap(), 6);
    }

    #[test]
    fn open_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let objects = similar_blobs(3);
        let ids: Vec<ObjectId> = objects.iter().map(|s| s.id).collect();
        let (pack_path, _) = PackBuilder::new().write_to_dir(dir.path(), objects).unwrap();
        let pack = PackFile::open(&pack_path).unwrap();
        assert_eq!(pack.len(), 3);
        for id in ids {
            assert!(pack.contains(&id));
            pack.resolve(&id).unwrap();
        }
    }

    #[test]
    fn mixed_kinds_keep_their_kind() {
        let blob = source(ObjectKind::Blob, b"blob payload".to_vec());
        let commitish = source(ObjectKind::Commit, b"fake commit payload".to_vec());
        let (bytes, index) = PackBuilder::new()
            .build(vec![blob.clone(), commitish.clone()])
            .unwrap();
        let pack = PackFile::from_bytes(bytes, index).unwrap();
        assert_eq!(pack.resolve(&blob.id).unwrap().0, ObjectKind::Blob);
        assert_eq!(pack.resolve(&commitish.id).unwrap().0, ObjectKind::Commit);
    }
}
