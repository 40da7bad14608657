use std::fs;
use std::io::Read;

use flate2::read::ZlibDecoder;
use strata_hash::ObjectId;
use strata_object::{header, ObjectKind};

use crate::{LooseError, LooseStore};

impl LooseStore {
    /// Whether a loose object with this id exists.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.object_path(id).is_file()
    }

    /// Read an object's kind and payload. `Ok(None)` if absent.
    pub fn read(&self, id: &ObjectId) -> Result<Option<(ObjectKind, Vec<u8>)>, LooseError> {
        let Some(raw) = self.read_raw(id)? else {
            return Ok(None);
        };
        let (kind, size, header_len) = header::parse_header(&raw)?;
        let payload = &raw[header_len..];
        if payload.len() != size {
            return Err(LooseError::Corrupt {
                id: id.to_hex(),
                reason: format!("size mismatch: header says {size}, got {}", payload.len()),
            });
        }
        Ok(Some((kind, payload.to_vec())))
    }

    /// Read just `(kind, size)` without decompressing the payload.
    ///
    /// `Ok(None)` if absent.
    pub fn read_header(&self, id: &ObjectId) -> Result<Option<(ObjectKind, usize)>, LooseError> {
        let path = self.object_path(id);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LooseError::Io(e)),
        };

        // Envelopes are short; decompress only the first bytes.
        let mut decoder = ZlibDecoder::new(file);
        let mut buf = [0u8; 64];
        let mut filled = 0;
        loop {
            if filled == buf.len() {
                return Err(LooseError::Corrupt {
                    id: id.to_hex(),
                    reason: "envelope exceeds 64 bytes".into(),
                });
            }
            let n = decoder
                .read(&mut buf[filled..])
                .map_err(|e| LooseError::Decompress {
                    id: id.to_hex(),
                    source: e,
                })?;
            if n == 0 {
                return Err(LooseError::Corrupt {
                    id: id.to_hex(),
                    reason: "EOF before envelope terminator".into(),
                });
            }
            filled += n;
            if buf[..filled].contains(&0) {
                break;
            }
        }

        let (kind, size, _) = header::parse_header(&buf[..filled])?;
        Ok(Some((kind, size)))
    }

    /// Read the full decompressed envelope + payload. `Ok(None)` if absent.
    fn read_raw(&self, id: &ObjectId) -> Result<Option<Vec<u8>>, LooseError> {
        let path = self.object_path(id);
        let compressed = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LooseError::Io(e)),
        };

        let mut decoder = ZlibDecoder::new(&compressed[..]);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| LooseError::Decompress {
                id: id.to_hex(),
                source: e,
            })?;
        Ok(Some(out))
    }

    /// Read and re-hash, failing if the stored bytes do not match the id.
    pub fn read_verified(
        &self,
        id: &ObjectId,
    ) -> Result<Option<(ObjectKind, Vec<u8>)>, LooseError> {
        let Some(raw) = self.read_raw(id)? else {
            return Ok(None);
        };
        let actual = strata_hash::Hasher::digest(&raw);
        if actual != *id {
            return Err(LooseError::Corrupt {
                id: id.to_hex(),
                reason: format!("content hashes to {}", actual.to_hex()),
            });
        }
        let (kind, size, header_len) = header::parse_header(&raw)?;
        Ok(Some((kind, raw[header_len..header_len + size].to_vec())))
    }
}
