//! Little-endian field readers that attach structure context to short reads.

use chrono::{DateTime, Utc};

use crate::error::{DecodeError, Result, Structure};
use crate::readonly::ByteSource;

/// Borrow `len` bytes at `offset`, or fail with `TruncatedRead` naming `structure`.
pub(crate) fn read_bytes<S: ByteSource + ?Sized>(
    source: &S,
    structure: Structure,
    offset: u64,
    len: usize,
) -> Result<&[u8]> {
    source
        .read_at(offset, len)
        .ok_or(DecodeError::TruncatedRead {
            structure,
            offset,
            wanted: len,
            available: source.len(),
        })
}

pub(crate) fn read_u32<S: ByteSource + ?Sized>(
    source: &S,
    structure: Structure,
    offset: u64,
) -> Result<u32> {
    let bytes = read_bytes(source, structure, offset, 4)?;
    Ok(u32_at(bytes, 0))
}

pub(crate) fn read_u64<S: ByteSource + ?Sized>(
    source: &S,
    structure: Structure,
    offset: u64,
) -> Result<u64> {
    let bytes = read_bytes(source, structure, offset, 8)?;
    Ok(u64_at(bytes, 0))
}

/// Caller guarantees `pos + 4 <= data.len()`.
pub(crate) fn u32_at(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

/// Caller guarantees `pos + 8 <= data.len()`.
pub(crate) fn u64_at(data: &[u8], pos: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&data[pos..pos + 8]);
    u64::from_le_bytes(raw)
}

/// Structure-relative offsets never wrap; an overflowing address simply reads
/// past the end of the image and surfaces as a truncated read.
pub(crate) fn at(base: u64, delta: u64) -> u64 {
    base.saturating_add(delta)
}

/// Header timestamps (disk init, HIKBTREE creation) are plain epoch seconds,
/// with no timezone correction.
pub(crate) fn epoch_seconds(raw: u32) -> DateTime<Utc> {
    DateTime::<Utc>::default() + chrono::Duration::seconds(i64::from(raw))
}
