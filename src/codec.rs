//! Versioned snapshot encoding
//!
//! Layout: a 4-byte magic, one version byte, then a sequence of tagged
//! fields. Each field is `tag: u8`, `len: u32` (little endian) and `len`
//! payload bytes. Depth maps are bincode-encoded `BTreeMap<String, i64>`.
//!
//! Decoding walks the fields one by one: unknown tags are skipped so newer
//! writers stay readable, and absent fields default to empty so older
//! snapshots with fewer fields stay readable too.

use std::collections::BTreeMap;

use crate::core::CodecError;
use crate::models::{AggregateSnapshot, PoolId};

pub const MAGIC: [u8; 4] = *b"AGGS";
pub const VERSION: u8 = 1;

pub const TAG_ASSET_DEPTH: u8 = 1;
pub const TAG_RUNE_DEPTH: u8 = 2;

const HEADER_LEN: usize = MAGIC.len() + 1;
const FIELD_HEADER_LEN: usize = 1 + 4;

/// Snapshot encoder/decoder
#[derive(Debug, Clone)]
pub struct SnapshotCodec {
    max_field_len: usize,
}

impl Default for SnapshotCodec {
    fn default() -> Self {
        Self {
            max_field_len: u32::MAX as usize,
        }
    }
}

impl SnapshotCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the encoded size of a single field (never above `u32::MAX`)
    pub fn with_max_field_len(mut self, max_field_len: usize) -> Self {
        self.max_field_len = max_field_len.min(u32::MAX as usize);
        self
    }

    pub fn encode(&self, snapshot: &AggregateSnapshot) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&MAGIC);
        out.push(VERSION);
        self.write_depths(&mut out, TAG_ASSET_DEPTH, &snapshot.asset_depth)?;
        self.write_depths(&mut out, TAG_RUNE_DEPTH, &snapshot.rune_depth)?;
        Ok(out)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<AggregateSnapshot, CodecError> {
        if bytes.len() < HEADER_LEN {
            return Err(CodecError::Truncated {
                needed: HEADER_LEN,
                available: bytes.len(),
            });
        }
        if bytes[..MAGIC.len()] != MAGIC {
            return Err(CodecError::BadMagic);
        }
        let version = bytes[MAGIC.len()];
        if version == 0 {
            return Err(CodecError::UnsupportedVersion(version));
        }

        let mut snapshot = AggregateSnapshot::default();
        let mut seen = Vec::new();
        let mut pos = HEADER_LEN;
        while pos < bytes.len() {
            let rest = &bytes[pos..];
            if rest.len() < FIELD_HEADER_LEN {
                return Err(CodecError::Truncated {
                    needed: FIELD_HEADER_LEN,
                    available: rest.len(),
                });
            }
            let tag = rest[0];
            let len = u32::from_le_bytes([rest[1], rest[2], rest[3], rest[4]]) as usize;
            let body = &rest[FIELD_HEADER_LEN..];
            if body.len() < len {
                return Err(CodecError::Truncated {
                    needed: len,
                    available: body.len(),
                });
            }
            let payload = &body[..len];
            pos += FIELD_HEADER_LEN + len;

            if seen.contains(&tag) {
                return Err(CodecError::Payload {
                    tag,
                    reason: "duplicate field".to_string(),
                });
            }
            seen.push(tag);

            match tag {
                TAG_ASSET_DEPTH => snapshot.asset_depth = read_depths(tag, payload)?,
                TAG_RUNE_DEPTH => snapshot.rune_depth = read_depths(tag, payload)?,
                // written by a newer schema
                _ => {}
            }
        }
        Ok(snapshot)
    }

    fn write_depths(
        &self,
        out: &mut Vec<u8>,
        tag: u8,
        depths: &BTreeMap<PoolId, i64>,
    ) -> Result<(), CodecError> {
        let payload = bincode::serialize(depths).map_err(|e| CodecError::Payload {
            tag,
            reason: e.to_string(),
        })?;
        if payload.len() > self.max_field_len {
            return Err(CodecError::FieldTooLarge {
                tag,
                len: payload.len(),
                limit: self.max_field_len,
            });
        }
        out.push(tag);
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&payload);
        Ok(())
    }
}

fn read_depths(tag: u8, payload: &[u8]) -> Result<BTreeMap<PoolId, i64>, CodecError> {
    bincode::deserialize(payload).map_err(|e| CodecError::Payload {
        tag,
        reason: e.to_string(),
    })
}
