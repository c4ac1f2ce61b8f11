//! HIKBTREE header decoding.
//!
//! Each index copy occupies `[address, address + size)`. The header is found by
//! scanning that region for the "HIKBTREE" magic; field offsets are relative to
//! the magic and read from the image at absolute positions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fields::{at, epoch_seconds, read_bytes, read_u32, read_u64};
use super::master::MasterSector;
use super::signatures::{find_signature, HIKBTREE_MAGIC};
use crate::error::{DecodeError, HikbtreeCopy, Result, Structure};
use crate::readonly::ByteSource;

const CREATION_TIME: u64 = 44;
const FOOTER_ADDRESS: u64 = 48;
const PAGE_LIST_ADDRESS: u64 = 64;

/// Header of one HIKBTREE copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HikbtreeHeader {
    /// Copy this header was decoded from
    pub copy: HikbtreeCopy,
    /// Absolute image offset of the "HIKBTREE" magic
    pub signature_offset: u64,
    pub creation_time_raw: u32,
    pub creation_time: DateTime<Utc>,
    pub footer_address: u64,
    /// Address of the page list (page count + page address table)
    pub page_list_address: u64,
}

impl HikbtreeHeader {
    pub fn decode<S: ByteSource + ?Sized>(
        source: &S,
        master: &MasterSector,
        copy: HikbtreeCopy,
    ) -> Result<Self> {
        let s = Structure::Hikbtree(copy);
        let location = master.hikbtree_location(copy);
        // A region running off the end of the image is scanned over what exists
        let available = source
            .len()
            .saturating_sub(location.address)
            .min(u64::from(location.size));
        if available < u64::from(location.size) {
            tracing::warn!(
                copy = %copy,
                address = location.address,
                size = location.size,
                available,
                "HIKBTREE region extends past end of image"
            );
        }
        let region = match available {
            0 => &[][..],
            n => read_bytes(source, s, location.address, n as usize)?,
        };

        let relative = find_signature(region, HIKBTREE_MAGIC).ok_or(
            DecodeError::SignatureNotFound {
                structure: s,
                offset: location.address,
                len: u64::from(location.size),
            },
        )?;
        let signature_offset = at(location.address, relative as u64);

        let creation_time_raw = read_u32(source, s, at(signature_offset, CREATION_TIME))?;
        let header = Self {
            copy,
            signature_offset,
            creation_time_raw,
            creation_time: epoch_seconds(creation_time_raw),
            footer_address: read_u64(source, s, at(signature_offset, FOOTER_ADDRESS))?,
            page_list_address: read_u64(source, s, at(signature_offset, PAGE_LIST_ADDRESS))?,
        };

        tracing::debug!(
            copy = %copy,
            signature_offset,
            page_list_address = header.page_list_address,
            footer_address = header.footer_address,
            "Decoded HIKBTREE header"
        );

        Ok(header)
    }
}
