//! Index Store wire format — §4.6.
//!
//! A 32-byte header (magic `CIMX`, u32 schema version, u64 build timestamp, u32
//! payload length, u32 CRC32 of payload) followed by a length-prefixed `bincode`
//! encoding of the index, using `serde`'s field order (stable for a given struct
//! definition) for the determinism guarantee in §4.5/§8.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"CIMX";
pub const SCHEMA_VERSION: u32 = 1;
const HEADER_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(#[from] bincode::Error),
}

/// Result of a successful load: the decoded index plus the header's recorded build
/// timestamp.
pub struct Loaded<T> {
    pub value: T,
    pub build_timestamp_unix: u64,
}

/// Encode `value` into the on-disk wire format. Never fails on well-formed input;
/// `bincode::Error` is only possible for types with custom fallible `Serialize` impls,
/// none of which this crate uses.
pub fn encode<T: Serialize>(value: &T, build_timestamp_unix: u64) -> Result<Vec<u8>, StoreError> {
    let payload = bincode::serialize(value)?;
    let crc = crc32fast::hash(&payload);

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());
    out.extend_from_slice(&build_timestamp_unix.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&crc.to_le_bytes());
    // pad header to 32 bytes: 4 (magic) + 4 (version) + 8 (ts) + 4 (len) + 4 (crc) = 24
    out.extend_from_slice(&[0u8; HEADER_LEN - 24]);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode a blob written by `encode`.
///
/// Returns `Ok(None)` (never an error) on CRC mismatch, schema mismatch, truncation,
/// or malformed payload — per §4.6/§7, recovery is a silent discard that forces a
/// rebuild, never a crash or partial result.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Option<Loaded<T>> {
    if bytes.len() < HEADER_LEN {
        return None;
    }
    if &bytes[0..4] != MAGIC {
        return None;
    }
    let version = u32::from_le_bytes(bytes[4..8].try_into().ok()?);
    if version != SCHEMA_VERSION {
        return None;
    }
    let build_timestamp_unix = u64::from_le_bytes(bytes[8..16].try_into().ok()?);
    let payload_len = u32::from_le_bytes(bytes[16..20].try_into().ok()?) as usize;
    let crc = u32::from_le_bytes(bytes[20..24].try_into().ok()?);

    let payload = bytes.get(HEADER_LEN..HEADER_LEN + payload_len)?;
    if crc32fast::hash(payload) != crc {
        return None;
    }

    let value = bincode::deserialize(payload).ok()?;
    Some(Loaded {
        value,
        build_timestamp_unix,
    })
}
