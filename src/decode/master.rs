//! Master sector decoding.
//!
//! The master sector sits inside the first 1024 bytes of the image and is
//! located by the "HIKVISION@HANGZHOU" magic. All field offsets below are
//! relative to the first byte of that magic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fields::{at, epoch_seconds, read_bytes, read_u32, read_u64};
use super::signatures::{find_signature, HIKVISION_MAGIC};
use crate::error::{DecodeError, HikbtreeCopy, Result, Structure};
use crate::readonly::ByteSource;

/// Number of leading image bytes searched for the master-sector magic
pub const MASTER_SECTOR_SCAN_LEN: usize = 1024;

const DISK_SIZE: u64 = 56;
const SYSTEM_LOGS_ADDRESS: u64 = 80;
const SYSTEM_LOGS_SIZE: u64 = 88;
const VIDEO_AREA_ADDRESS: u64 = 104;
const DATA_BLOCK_SIZE: u64 = 120;
const TOTAL_DATA_BLOCKS: u64 = 128;
const HIKBTREE_1_ADDRESS: u64 = 136;
const HIKBTREE_1_SIZE: u64 = 144;
const HIKBTREE_2_ADDRESS: u64 = 152;
const HIKBTREE_2_SIZE: u64 = 160;
const DISK_INIT_TIME: u64 = 224;

/// Where one HIKBTREE copy lives on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HikbtreeLocation {
    pub address: u64,
    pub size: u32,
}

/// Disk-level layout record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterSector {
    /// Absolute image offset of the "HIKVISION@HANGZHOU" magic
    pub signature_offset: u64,
    /// Total formatted capacity in bytes
    pub disk_size: u64,
    pub system_logs_address: u64,
    pub system_logs_size: u64,
    /// Start of the video data region
    pub video_area_address: u64,
    /// Size of one allocation unit (usually 1 GiB)
    pub data_block_size: u64,
    pub total_data_blocks: u32,
    /// The two redundant index copies, primary first
    pub hikbtree: [HikbtreeLocation; 2],
    pub disk_init_time_raw: u32,
    pub disk_init_time: DateTime<Utc>,
}

impl MasterSector {
    /// Search the first sector for the magic and decode the fields behind it.
    pub fn decode<S: ByteSource + ?Sized>(source: &S) -> Result<Self> {
        let scan_len = source.len().min(MASTER_SECTOR_SCAN_LEN as u64) as usize;
        let sector = read_bytes(source, Structure::MasterSector, 0, scan_len)?;

        let signature_offset =
            find_signature(sector, HIKVISION_MAGIC).ok_or(DecodeError::SignatureNotFound {
                structure: Structure::MasterSector,
                offset: 0,
                len: scan_len as u64,
            })? as u64;

        Self::decode_at(source, signature_offset)
    }

    /// Decode the fields relative to a known signature offset. Fields are read
    /// from the image itself, so they may extend past the first sector.
    pub fn decode_at<S: ByteSource + ?Sized>(source: &S, signature_offset: u64) -> Result<Self> {
        let s = Structure::MasterSector;
        let field = |delta| at(signature_offset, delta);

        let disk_init_time_raw = read_u32(source, s, field(DISK_INIT_TIME))?;

        let master = Self {
            signature_offset,
            disk_size: read_u64(source, s, field(DISK_SIZE))?,
            system_logs_address: read_u64(source, s, field(SYSTEM_LOGS_ADDRESS))?,
            system_logs_size: read_u64(source, s, field(SYSTEM_LOGS_SIZE))?,
            video_area_address: read_u64(source, s, field(VIDEO_AREA_ADDRESS))?,
            data_block_size: read_u64(source, s, field(DATA_BLOCK_SIZE))?,
            total_data_blocks: read_u32(source, s, field(TOTAL_DATA_BLOCKS))?,
            hikbtree: [
                HikbtreeLocation {
                    address: read_u64(source, s, field(HIKBTREE_1_ADDRESS))?,
                    size: read_u32(source, s, field(HIKBTREE_1_SIZE))?,
                },
                HikbtreeLocation {
                    address: read_u64(source, s, field(HIKBTREE_2_ADDRESS))?,
                    size: read_u32(source, s, field(HIKBTREE_2_SIZE))?,
                },
            ],
            disk_init_time_raw,
            disk_init_time: epoch_seconds(disk_init_time_raw),
        };

        tracing::debug!(
            signature_offset,
            disk_size = master.disk_size,
            total_data_blocks = master.total_data_blocks,
            hikbtree_1 = master.hikbtree[0].address,
            hikbtree_2 = master.hikbtree[1].address,
            "Decoded master sector"
        );

        Ok(master)
    }

    /// Location of the requested index copy
    pub fn hikbtree_location(&self, copy: HikbtreeCopy) -> HikbtreeLocation {
        self.hikbtree[copy.slot()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Plant a master sector at `k` with recognisable values in every field.
    fn synthetic_master(k: usize) -> Vec<u8> {
        let mut img = vec![0u8; 2048];
        img[k..k + HIKVISION_MAGIC.len()].copy_from_slice(HIKVISION_MAGIC);
        let mut put = |off: u64, bytes: &[u8]| {
            let p = k + off as usize;
            img[p..p + bytes.len()].copy_from_slice(bytes);
        };
        put(DISK_SIZE, &4_000_787_030_016u64.to_le_bytes());
        put(SYSTEM_LOGS_ADDRESS, &0x20_0000u64.to_le_bytes());
        put(SYSTEM_LOGS_SIZE, &0x40_0000u64.to_le_bytes());
        put(VIDEO_AREA_ADDRESS, &0x1_0000_0000u64.to_le_bytes());
        put(DATA_BLOCK_SIZE, &(1u64 << 30).to_le_bytes());
        put(TOTAL_DATA_BLOCKS, &3_700u32.to_le_bytes());
        put(HIKBTREE_1_ADDRESS, &0x60_0000u64.to_le_bytes());
        put(HIKBTREE_1_SIZE, &0x1000u32.to_le_bytes());
        put(HIKBTREE_2_ADDRESS, &0x80_0000u64.to_le_bytes());
        put(HIKBTREE_2_SIZE, &0x2000u32.to_le_bytes());
        put(DISK_INIT_TIME, &1_648_598_400u32.to_le_bytes());
        img
    }

    #[test]
    fn test_decodes_planted_values() {
        let img = synthetic_master(512);
        let master = MasterSector::decode(&img).unwrap();

        assert_eq!(master.signature_offset, 512);
        assert_eq!(master.disk_size, 4_000_787_030_016);
        assert_eq!(master.system_logs_address, 0x20_0000);
        assert_eq!(master.system_logs_size, 0x40_0000);
        assert_eq!(master.video_area_address, 0x1_0000_0000);
        assert_eq!(master.data_block_size, 1 << 30);
        assert_eq!(master.total_data_blocks, 3_700);
        assert_eq!(
            master.hikbtree_location(HikbtreeCopy::Primary),
            HikbtreeLocation {
                address: 0x60_0000,
                size: 0x1000
            }
        );
        assert_eq!(
            master.hikbtree_location(HikbtreeCopy::Secondary),
            HikbtreeLocation {
                address: 0x80_0000,
                size: 0x2000
            }
        );
        assert_eq!(master.disk_init_time_raw, 1_648_598_400);
        assert_eq!(master.disk_init_time.timestamp(), 1_648_598_400);
    }

    #[test]
    fn test_decode_is_idempotent() {
        let img = synthetic_master(0);
        let first = MasterSector::decode(&img).unwrap();
        let second = MasterSector::decode(&img).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_magic() {
        let img = vec![0u8; 2048];
        match MasterSector::decode(&img) {
            Err(DecodeError::SignatureNotFound {
                structure, len, ..
            }) => {
                assert_eq!(structure, Structure::MasterSector);
                assert_eq!(len, MASTER_SECTOR_SCAN_LEN as u64);
            }
            other => panic!("expected SignatureNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_magic_beyond_first_sector_is_ignored() {
        let mut img = vec![0u8; 4096];
        img[2000..2018].copy_from_slice(HIKVISION_MAGIC);
        assert!(matches!(
            MasterSector::decode(&img),
            Err(DecodeError::SignatureNotFound { .. })
        ));
    }

    #[test]
    fn test_fields_past_image_end_are_truncated() {
        let mut img = vec![0u8; 200];
        img[..18].copy_from_slice(HIKVISION_MAGIC);
        assert!(matches!(
            MasterSector::decode(&img),
            Err(DecodeError::TruncatedRead {
                structure: Structure::MasterSector,
                ..
            })
        ));
    }
}
