//! Page record decoding.
//!
//! A page holds a u32 record count at +16 and a record table at +104 with a
//! 48-byte stride. Each slot describes one recorded video segment:
//!
//! | slot offset | width | field |
//! |---|---|---|
//! | +0  | 8 | allocation marker |
//! | +9  | 4 | channel |
//! | +16 | 4 | start time (epoch seconds) |
//! | +20 | 4 | end time (epoch seconds) |
//! | +24 | 8 | block address |
//!
//! Malformed fields never drop a slot; they decode to explicit marker values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fields::{at, read_bytes, read_u32, u32_at, u64_at};
use crate::error::{Result, Structure};
use crate::readonly::ByteSource;

pub const PAGE_RECORD_COUNT_OFFSET: u64 = 16;
pub const PAGE_RECORD_TABLE_OFFSET: u64 = 104;
pub const RECORD_STRIDE: u64 = 48;
/// Bytes of each slot that carry decoded fields
pub const RECORD_SPAN: usize = 32;

/// Highest channel number a DVR assigns
pub const MAX_CHANNEL: u32 = 256;
/// Raw start time meaning "no timestamp"
pub const UNSET_START_TIME: u32 = 0x7FFF_FFFF;
/// Raw end time meaning "no timestamp"
pub const UNSET_END_TIME: u32 = 0;
/// Seconds subtracted from every video timestamp
pub const DEFAULT_VIDEO_TIME_OFFSET_SECS: i64 = 10_800;

const ALLOCATED_MARKER: [u8; 8] = [0x00; 8];
const UNALLOCATED_MARKER: [u8; 8] = [0xFF; 8];

/// Allocation state of a record slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationState {
    /// Marker is all zero bytes
    Allocated,
    /// Marker is all 0xFF bytes
    Unallocated,
    /// Marker matches neither pattern; raw bytes kept for inspection
    Unknown([u8; 8]),
}

impl AllocationState {
    pub fn from_marker(marker: [u8; 8]) -> Self {
        match marker {
            ALLOCATED_MARKER => AllocationState::Allocated,
            UNALLOCATED_MARKER => AllocationState::Unallocated,
            other => AllocationState::Unknown(other),
        }
    }

    /// Hex rendering of an unrecognised marker
    pub fn unknown_marker_hex(&self) -> Option<String> {
        match self {
            AllocationState::Unknown(raw) => Some(hex::encode(raw)),
            _ => None,
        }
    }
}

/// Recording channel of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Valid(u32),
    /// Raw value above [`MAX_CHANNEL`]
    Invalid(u32),
}

impl Channel {
    pub fn from_raw(raw: u32) -> Self {
        if raw > MAX_CHANNEL {
            Channel::Invalid(raw)
        } else {
            Channel::Valid(raw)
        }
    }
}

/// Decoded start or end time of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoTime {
    /// The sentinel raw value: no timestamp recorded
    Unset,
    At(DateTime<Utc>),
    /// Corrected value falls outside the calendar range chrono can represent
    Unrepresentable(u32),
}

impl VideoTime {
    /// Decode `raw` epoch seconds, shifted back by `offset_secs`, unless it
    /// equals the field's `sentinel`.
    pub fn decode(raw: u32, sentinel: u32, offset_secs: i64) -> Self {
        if raw == sentinel {
            return VideoTime::Unset;
        }
        i64::from(raw)
            .checked_sub(offset_secs)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map_or(VideoTime::Unrepresentable(raw), VideoTime::At)
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, VideoTime::Unset)
    }
}

/// One record slot, immutable once decoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    /// Zero-based position in the page-then-slot ordering of the whole index
    pub id: usize,
    /// Index of the page in the page list
    pub page: usize,
    /// Slot index within the page
    pub slot: usize,
    pub allocation: AllocationState,
    pub channel: Channel,
    pub start_time: VideoTime,
    pub end_time: VideoTime,
    /// Pointer into the video data region
    pub block_address: u64,
}

impl VideoRecord {
    /// Decode one slot. `data` must hold at least [`RECORD_SPAN`] bytes.
    pub fn decode(data: &[u8], id: usize, page: usize, slot: usize, offset_secs: i64) -> Self {
        let mut marker = [0u8; 8];
        marker.copy_from_slice(&data[0..8]);

        Self {
            id,
            page,
            slot,
            allocation: AllocationState::from_marker(marker),
            channel: Channel::from_raw(u32_at(data, 9)),
            start_time: VideoTime::decode(u32_at(data, 16), UNSET_START_TIME, offset_secs),
            end_time: VideoTime::decode(u32_at(data, 20), UNSET_END_TIME, offset_secs),
            block_address: u64_at(data, 24),
        }
    }
}

/// How much of a page could be read from the image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    /// Header and every declared slot lie inside the image
    Readable,
    /// The record count itself lies outside the image; the page yields no records
    HeaderUnreadable,
    /// The record table runs off the end of the image; trailing slots are skipped
    TableTruncated,
}

/// A page from the page list with its declared record count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub index: usize,
    pub address: u64,
    /// Count declared in the page header (0 when the header is unreadable)
    pub record_count: u32,
    /// Declared slots that lie inside the image
    pub readable_records: u32,
    pub status: PageStatus,
    /// Id given to this page's first record
    pub first_id: usize,
}

impl PageSummary {
    /// Read the record count of the page at `address`. A page the image cannot
    /// hold is summarised rather than rejected so the rest of the index survives.
    pub fn read<S: ByteSource + ?Sized>(
        source: &S,
        index: usize,
        address: u64,
        first_id: usize,
    ) -> Self {
        let count_at = at(address, PAGE_RECORD_COUNT_OFFSET);
        let Ok(record_count) = read_u32(source, Structure::Page(index), count_at) else {
            return Self {
                index,
                address,
                record_count: 0,
                readable_records: 0,
                status: PageStatus::HeaderUnreadable,
                first_id,
            };
        };

        let readable_records = record_count.min(slots_in_image(source.len(), address));
        let status = if readable_records < record_count {
            PageStatus::TableTruncated
        } else {
            PageStatus::Readable
        };

        Self {
            index,
            address,
            record_count,
            readable_records,
            status,
            first_id,
        }
    }
}

/// Number of whole slots of the table at `address` that end inside the image.
fn slots_in_image(image_len: u64, address: u64) -> u32 {
    let table = at(address, PAGE_RECORD_TABLE_OFFSET);
    match image_len.checked_sub(at(table, RECORD_SPAN as u64)) {
        Some(spare) => u32::try_from(spare / RECORD_STRIDE + 1).unwrap_or(u32::MAX),
        None => 0,
    }
}

/// Decode the readable slots of one page, in slot order.
pub fn decode_page<S: ByteSource + ?Sized>(
    source: &S,
    page: &PageSummary,
    offset_secs: i64,
) -> Result<Vec<VideoRecord>> {
    let s = Structure::Page(page.index);
    let table = at(page.address, PAGE_RECORD_TABLE_OFFSET);

    (0..page.readable_records as usize)
        .map(|slot| -> Result<VideoRecord> {
            let data = read_bytes(source, s, at(table, slot as u64 * RECORD_STRIDE), RECORD_SPAN)?;
            Ok(VideoRecord::decode(
                data,
                page.first_id + slot,
                page.index,
                slot,
                offset_secs,
            ))
        })
        .collect()
}
