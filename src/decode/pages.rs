//! Page list walking.
//!
//! The page list starts with a u32 page count; the page address table begins
//! 24 bytes in, one 72-byte entry per page with the address in its first 8 bytes.

use super::fields::{at, read_u32, read_u64};
use crate::error::{Result, Structure};
use crate::readonly::ByteSource;

pub const PAGE_LIST_ENTRIES_OFFSET: u64 = 24;
pub const PAGE_LIST_STRIDE: u64 = 72;

/// Read the page count and every page address, in table order.
///
/// The count comes straight from disk and is not trusted for allocation: the
/// vector never reserves more entries than the rest of the image could hold.
/// Zero or out-of-range addresses are returned as encoded.
pub fn walk_page_list<S: ByteSource + ?Sized>(source: &S, page_list_address: u64) -> Result<Vec<u64>> {
    let s = Structure::PageList;
    let count = read_u32(source, s, page_list_address)?;

    let table = at(page_list_address, PAGE_LIST_ENTRIES_OFFSET);
    let fits = source.len().saturating_sub(table) / PAGE_LIST_STRIDE + 1;
    let mut pages = Vec::with_capacity(u64::from(count).min(fits) as usize);

    for i in 0..u64::from(count) {
        pages.push(read_u64(source, s, at(table, i * PAGE_LIST_STRIDE))?);
    }

    tracing::debug!(page_list_address, pages = pages.len(), "Walked page list");
    Ok(pages)
}
