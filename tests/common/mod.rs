//! Synthetic DVR image builder shared by the integration tests

#![allow(dead_code)]

pub const MASTER_AT: usize = 0x200;
pub const HIKBTREE_1: usize = 0x1000;
pub const HIKBTREE_2: usize = 0x2000;
pub const HIKBTREE_SIZE: u32 = 0x400;
pub const SIGNATURE_IN_REGION: usize = 0x40;
pub const PAGE_LIST: usize = 0x3000;
pub const PAGES_AT: usize = 0x4000;
pub const PAGE_SIZE: usize = 0x1000;

/// One record slot to plant
#[derive(Clone, Copy)]
pub struct Slot {
    pub marker: [u8; 8],
    pub channel: u32,
    pub start: u32,
    pub end: u32,
    pub block: u64,
}

impl Slot {
    pub fn allocated(channel: u32, start: u32, end: u32, block: u64) -> Self {
        Self {
            marker: [0; 8],
            channel,
            start,
            end,
            block,
        }
    }
}

pub fn put(img: &mut [u8], at: usize, bytes: &[u8]) {
    img[at..at + bytes.len()].copy_from_slice(bytes);
}

/// Build an image whose master sector declares `total_data_blocks` and whose
/// HIKBTREE copies both point at one page list holding `pages`.
pub fn build_image(total_data_blocks: u32, pages: &[Vec<Slot>]) -> Vec<u8> {
    let len = PAGES_AT + PAGE_SIZE * pages.len().max(1);
    let mut img = vec![0u8; len];

    let m = MASTER_AT;
    put(&mut img, m, b"HIKVISION@HANGZHOU");
    put(&mut img, m + 56, &(len as u64).to_le_bytes());
    put(&mut img, m + 80, &0x800u64.to_le_bytes());
    put(&mut img, m + 88, &0x100u64.to_le_bytes());
    put(&mut img, m + 104, &(PAGES_AT as u64).to_le_bytes());
    put(&mut img, m + 120, &(1u64 << 30).to_le_bytes());
    put(&mut img, m + 128, &total_data_blocks.to_le_bytes());
    put(&mut img, m + 136, &(HIKBTREE_1 as u64).to_le_bytes());
    put(&mut img, m + 144, &HIKBTREE_SIZE.to_le_bytes());
    put(&mut img, m + 152, &(HIKBTREE_2 as u64).to_le_bytes());
    put(&mut img, m + 160, &HIKBTREE_SIZE.to_le_bytes());
    put(&mut img, m + 224, &1_648_598_400u32.to_le_bytes());

    for base in [HIKBTREE_1, HIKBTREE_2] {
        let sig = base + SIGNATURE_IN_REGION;
        put(&mut img, sig, b"HIKBTREE");
        put(&mut img, sig + 44, &1_648_600_000u32.to_le_bytes());
        put(&mut img, sig + 48, &((base + 0x3F0) as u64).to_le_bytes());
        put(&mut img, sig + 64, &(PAGE_LIST as u64).to_le_bytes());
    }

    put(&mut img, PAGE_LIST, &(pages.len() as u32).to_le_bytes());
    for (i, slots) in pages.iter().enumerate() {
        let page = PAGES_AT + i * PAGE_SIZE;
        put(&mut img, PAGE_LIST + 24 + i * 72, &(page as u64).to_le_bytes());
        put(&mut img, page + 16, &(slots.len() as u32).to_le_bytes());
        for (j, s) in slots.iter().enumerate() {
            let at = page + 104 + j * 48;
            put(&mut img, at, &s.marker);
            put(&mut img, at + 9, &s.channel.to_le_bytes());
            put(&mut img, at + 16, &s.start.to_le_bytes());
            put(&mut img, at + 20, &s.end.to_le_bytes());
            put(&mut img, at + 24, &s.block.to_le_bytes());
        }
    }
    img
}
