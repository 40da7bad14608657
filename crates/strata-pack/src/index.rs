//! The sorted pack index: id -> (offset, crc).

use std::path::Path;

use strata_hash::{ObjectId, DIGEST_LEN};

use crate::{PackError, FORMAT_VERSION, INDEX_MAGIC};

const RECORD_LEN: usize = DIGEST_LEN + 8 + 4;

/// One index record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    pub id: ObjectId,
    /// Byte offset of the entry in the pack file.
    pub offset: u64,
    /// CRC32 of the entry's compressed data bytes.
    pub crc: u32,
}

/// An index over one pack, sorted by id for binary search.
#[derive(Debug, Clone, Default)]
pub struct PackIndex {
    records: Vec<IndexRecord>,
}

impl PackIndex {
    /// Build from unsorted records.
    pub fn from_records(mut records: Vec<IndexRecord>) -> Self {
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Self { records }
    }

    /// Binary-search for an id. O(log n).
    pub fn find(&self, id: &ObjectId) -> Option<&IndexRecord> {
        self.records
            .binary_search_by(|r| r.id.cmp(id))
            .ok()
            .map(|i| &self.records[i])
    }

    /// Membership test. O(log n).
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.find(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in id order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexRecord> {
        self.records.iter()
    }

    /// Serialize to the on-disk index format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12 + self.records.len() * RECORD_LEN);
        out.extend_from_slice(INDEX_MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        for record in &self.records {
            out.extend_from_slice(record.id.as_bytes());
            out.extend_from_slice(&record.offset.to_le_bytes());
            out.extend_from_slice(&record.crc.to_le_bytes());
        }
        out
    }

    /// Parse the on-disk index format, verifying ordering.
    pub fn decode(data: &[u8]) -> Result<Self, PackError> {
        if data.len() < 12 || &data[..4] != INDEX_MAGIC {
            return Err(PackError::Corrupt("bad index magic".into()));
        }
        let version = u32::from_le_bytes(data[4..8].try_into().unwrap());
        if version != FORMAT_VERSION {
            return Err(PackError::Corrupt(format!("unsupported index version {version}")));
        }
        let count = u32::from_le_bytes(data[8..12].try_into().unwrap()) as usize;
        let body = &data[12..];
        if body.len() != count * RECORD_LEN {
            return Err(PackError::Corrupt(format!(
                "index body is {} bytes, expected {}",
                body.len(),
                count * RECORD_LEN
            )));
        }

        let mut records = Vec::with_capacity(count);
        for chunk in body.chunks_exact(RECORD_LEN) {
            let id = ObjectId::from_bytes(&chunk[..DIGEST_LEN])
                .map_err(|e| PackError::Corrupt(format!("bad id in index: {e}")))?;
            let offset =
                u64::from_le_bytes(chunk[DIGEST_LEN..DIGEST_LEN + 8].try_into().unwrap());
            let crc =
                u32::from_le_bytes(chunk[DIGEST_LEN + 8..].try_into().unwrap());
            if let Some(prev) = records.last() {
                let prev: &IndexRecord = prev;
                if prev.id >= id {
                    return Err(PackError::Corrupt("index records out of order".into()));
                }
            }
            records.push(IndexRecord { id, offset, crc });
        }

        Ok(Self { records })
    }

    /// Read and parse an index file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PackError> {
        let data = std::fs::read(path)?;
        Self::decode(&data)
    }
}
