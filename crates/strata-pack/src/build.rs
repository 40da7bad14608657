//! Pack construction.
//!
//! The builder orders candidates so that likely-similar objects sit next to
//! each other (same kind, then descending size), tries each object against a
//! sliding window of earlier candidates as delta bases, and keeps a delta
//! only when it saves at least a third of the full payload and the base's
//! chain is still below the depth bound.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use strata_hash::ObjectId;
use strata_object::ObjectKind;

use crate::delta::{compute_delta, write_varint};
use crate::index::{IndexRecord, PackIndex};
use crate::{PackError, DEFAULT_WINDOW, FORMAT_VERSION, MAX_DELTA_DEPTH, PACK_MAGIC};

/// One object to be packed.
#[derive(Debug, Clone)]
pub struct PackSource {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub payload: Vec<u8>,
}

/// Configurable pack builder. Building is an exclusive, offline operation;
/// the builder owns its inputs and shares nothing.
pub struct PackBuilder {
    window: usize,
    max_depth: usize,
    compression: flate2::Compression,
}

impl PackBuilder {
    pub fn new() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            max_depth: MAX_DELTA_DEPTH,
            compression: flate2::Compression::default(),
        }
    }

    /// How many earlier same-kind candidates each object is tried against.
    pub fn window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    /// Bound on delta chain length.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.min(MAX_DELTA_DEPTH);
        self
    }

    /// Build pack and index bytes from a set of objects.
    ///
    /// Duplicate ids are packed once. The result is deterministic for a
    /// given input set.
    pub fn build(&self, objects: Vec<PackSource>) -> Result<(Vec<u8>, PackIndex), PackError> {
        let mut sources = objects;
        sources.sort_by(|a, b| {
            kind_tag(a.kind)
                .cmp(&kind_tag(b.kind))
                .then(b.payload.len().cmp(&a.payload.len()))
                .then(a.id.cmp(&b.id))
        });
        sources.dedup_by(|a, b| a.id == b.id);

        // Pick a delta base for each source from its window.
        let mut depth: HashMap<ObjectId, usize> = HashMap::new();
        let mut plans: Vec<(PackSource, Option<(ObjectId, Vec<u8>)>)> =
            Vec::with_capacity(sources.len());

        for i in 0..sources.len() {
            let source = &sources[i];
            let mut best: Option<(ObjectId, Vec<u8>)> = None;

            let window_start = i.saturating_sub(self.window);
            for candidate in &sources[window_start..i] {
                if candidate.kind != source.kind {
                    continue;
                }
                let base_depth = depth.get(&candidate.id).copied().unwrap_or(0);
                if base_depth + 1 > self.max_depth {
                    continue;
                }
                let delta = compute_delta(&candidate.payload, &source.payload);
                let better = match &best {
                    Some((_, current)) => delta.len() < current.len(),
                    None => true,
                };
                if better && worth_keeping(delta.len(), source.payload.len()) {
                    depth.insert(source.id, base_depth + 1);
                    best = Some((candidate.id, delta));
                }
            }

            plans.push((source.clone(), best));
        }

        // Encode entries and collect index records.
        let mut pack = Vec::new();
        pack.extend_from_slice(PACK_MAGIC);
        pack.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        pack.extend_from_slice(&(plans.len() as u32).to_le_bytes());

        let mut records = Vec::with_capacity(plans.len());
        for (source, base) in &plans {
            let offset = pack.len() as u64;
            let (tag, data): (u8, &[u8]) = match base {
                Some((_, delta)) => (kind_tag(source.kind) | 0x80, delta),
                None => (kind_tag(source.kind), &source.payload),
            };

            pack.push(tag);
            if let Some((base_id, _)) = base {
                pack.extend_from_slice(base_id.as_bytes());
            }

            let compressed = self.compress(data)?;
            write_varint(&mut pack, data.len());
            write_varint(&mut pack, compressed.len());

            let mut crc = crc32fast::Hasher::new();
            crc.update(&compressed);
            records.push(IndexRecord {
                id: source.id,
                offset,
                crc: crc.finalize(),
            });

            pack.extend_from_slice(&compressed);
        }

        Ok((pack, PackIndex::from_records(records)))
    }

    /// Build and write `<name>.pack` / `<name>.idx` into `dir`.
    ///
    /// The name is derived from the hash of the member ids, so re-packing
    /// the same set is a no-op at the filesystem level.
    pub fn write_to_dir(
        &self,
        dir: impl AsRef<Path>,
        objects: Vec<PackSource>,
    ) -> Result<(PathBuf, PathBuf), PackError> {
        let (pack, index) = self.build(objects)?;

        let mut name_hasher = strata_hash::Hasher::new();
        for record in index.iter() {
            name_hasher.update(record.id.as_bytes());
        }
        let name = name_hasher.finalize().to_hex();

        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let pack_path = dir.join(format!("{name}.pack"));
        let index_path = dir.join(format!("{name}.idx"));
        std::fs::write(&pack_path, &pack)?;
        std::fs::write(&index_path, index.encode())?;
        Ok((pack_path, index_path))
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, PackError> {
        let mut encoder = ZlibEncoder::new(Vec::new(), self.compression);
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }
}

impl Default for PackBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A delta must save at least a third of the full payload to be kept.
fn worth_keeping(delta_len: usize, payload_len: usize) -> bool {
    delta_len + delta_len / 2 < payload_len
}

pub(crate) fn kind_tag(kind: ObjectKind) -> u8 {
    match kind {
        ObjectKind::Blob => 1,
        ObjectKind::Tree => 2,
        ObjectKind::Commit => 3,
        ObjectKind::Tag => 4,
    }
}

pub(crate) fn tag_kind(tag: u8) -> Option<ObjectKind> {
    match tag & 0x7f {
        1 => Some(ObjectKind::Blob),
        2 => Some(ObjectKind::Tree),
        3 => Some(ObjectKind::Commit),
        4 => Some(ObjectKind::Tag),
        _ => None,
    }
}
