//! HIKBTREE decoding - Enumerate recorded video segments from a DVR disk image.
//!
//! Walks the Hikvision/Haikon on-disk metadata without the DVR firmware:
//!
//! 1. **Master sector**: "HIKVISION@HANGZHOU" magic in the first 1024 bytes,
//!    describing the volume layout and the two HIKBTREE copies
//! 2. **HIKBTREE header**: "HIKBTREE" magic inside the selected copy's region,
//!    pointing at the page list
//! 3. **Page list**: page count plus a 72-byte-stride page address table
//! 4. **Pages**: a 48-byte-stride record table per page, one slot per segment
//!
//! # Design
//!
//! - **Zero-copy**: every read borrows from a [`ByteSource`] (usually a read-only mmap)
//! - **Parallel pages**: page tables are disjoint, so pages decode independently
//!   with rayon; ids are fixed up front from the declared record counts, which
//!   keeps output identical to a sequential pass
//! - **No silent loss**: odd allocation markers, out-of-range channels and unset
//!   timestamps decode to explicit marker values; slots are never dropped

pub(crate) mod fields;
pub mod hikbtree;
pub mod master;
pub mod pages;
pub mod records;
pub mod signatures;

use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{HikbtreeCopy, Result};
use crate::readonly::ByteSource;

pub use hikbtree::HikbtreeHeader;
pub use master::{HikbtreeLocation, MasterSector};
pub use pages::walk_page_list;
pub use records::{
    decode_page, AllocationState, Channel, PageStatus, PageSummary, VideoRecord, VideoTime,
    DEFAULT_VIDEO_TIME_OFFSET_SECS,
};
pub use signatures::{find_signature, HIKBTREE_MAGIC, HIKVISION_MAGIC};

/// Options for a decode run
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Index copy decoded first
    pub copy: HikbtreeCopy,
    /// Try the other copy when the selected one is unreadable
    pub fallback: bool,
    /// Seconds subtracted from video start/end timestamps
    pub video_time_offset_secs: i64,
    /// Page decoding threads (1 = sequential, 0 = all cores)
    pub workers: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            copy: HikbtreeCopy::Primary,
            fallback: false,
            video_time_offset_secs: DEFAULT_VIDEO_TIME_OFFSET_SECS,
            workers: num_cpus::get(),
        }
    }
}

/// Progress updates emitted during decoding
#[derive(Debug, Clone)]
pub enum DecodeProgress {
    /// Master sector decoded
    MasterSector,
    /// HIKBTREE header decoded from this copy
    Hikbtree { copy: HikbtreeCopy },
    /// Page list walked
    PageList { pages: usize, records: u64 },
    /// One page's records decoded (may arrive out of order)
    Page { index: usize, records: usize },
    /// Done
    Done { records: usize },
}

/// Everything addressable without touching record slots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeLayout {
    pub master: MasterSector,
    pub hikbtree: HikbtreeHeader,
    pub pages: Vec<PageSummary>,
}

impl VolumeLayout {
    /// Records a full decode will emit
    pub fn total_records(&self) -> u64 {
        self.pages.iter().map(|p| u64::from(p.readable_records)).sum()
    }

    /// Sum of the record counts declared in page headers
    pub fn declared_records(&self) -> u64 {
        self.pages.iter().map(|p| u64::from(p.record_count)).sum()
    }
}

/// Totals of recoverable anomalies found in pages and record slots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyCounts {
    /// Pages whose header lies outside the image
    pub unreadable_pages: usize,
    /// Pages whose record table runs off the end of the image
    pub truncated_pages: usize,
    pub unknown_allocation: usize,
    pub invalid_channel: usize,
    pub unset_start_time: usize,
    pub unset_end_time: usize,
    pub unrepresentable_time: usize,
}

impl AnomalyCounts {
    pub fn tally(pages: &[PageSummary], records: &[VideoRecord]) -> Self {
        let mut counts = Self::default();
        for page in pages {
            match page.status {
                PageStatus::Readable => {}
                PageStatus::HeaderUnreadable => counts.unreadable_pages += 1,
                PageStatus::TableTruncated => counts.truncated_pages += 1,
            }
        }
        for rec in records {
            if matches!(rec.allocation, AllocationState::Unknown(_)) {
                counts.unknown_allocation += 1;
            }
            if matches!(rec.channel, Channel::Invalid(_)) {
                counts.invalid_channel += 1;
            }
            if rec.start_time.is_unset() {
                counts.unset_start_time += 1;
            }
            if rec.end_time.is_unset() {
                counts.unset_end_time += 1;
            }
            for t in [rec.start_time, rec.end_time] {
                if matches!(t, VideoTime::Unrepresentable(_)) {
                    counts.unrepresentable_time += 1;
                }
            }
        }
        counts
    }
}

/// Result of a full decode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedVolume {
    pub master: MasterSector,
    pub hikbtree: HikbtreeHeader,
    pub pages: Vec<PageSummary>,
    /// Every record slot, in page-then-slot order; `records[i].id == i`
    pub records: Vec<VideoRecord>,
    pub anomalies: AnomalyCounts,
    pub duration_ms: u64,
}

/// The decode orchestrator
pub struct Decoder {
    options: DecodeOptions,
}

impl Decoder {
    pub fn new(options: DecodeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Decode master sector, HIKBTREE header and page summaries.
    pub fn locate<S: ByteSource + ?Sized>(&self, source: &S) -> Result<VolumeLayout> {
        self.locate_with_progress(source, &|_: DecodeProgress| {})
    }

    fn locate_with_progress<S, F>(&self, source: &S, on_progress: &F) -> Result<VolumeLayout>
    where
        S: ByteSource + ?Sized,
        F: Fn(DecodeProgress) + Send + Sync,
    {
        let master = MasterSector::decode(source)?;
        on_progress(DecodeProgress::MasterSector);

        let (hikbtree, pages) = match self.locate_copy(source, &master, self.options.copy) {
            Ok(found) => found,
            Err(e) if self.options.fallback && e.is_copy_local() => {
                let other = self.options.copy.other();
                tracing::warn!(
                    failed_copy = %self.options.copy,
                    fallback_copy = %other,
                    error = %e,
                    "HIKBTREE copy unreadable, falling back to redundant copy"
                );
                self.locate_copy(source, &master, other)?
            }
            Err(e) => return Err(e),
        };
        on_progress(DecodeProgress::Hikbtree {
            copy: hikbtree.copy,
        });

        self.warn_suspicious_pages(source, &master, &pages);

        let layout = VolumeLayout {
            master,
            hikbtree,
            pages,
        };
        on_progress(DecodeProgress::PageList {
            pages: layout.pages.len(),
            records: layout.total_records(),
        });

        Ok(layout)
    }

    /// Header, page list and per-page record counts of one copy. Record ids
    /// are assigned here as running totals of the readable counts.
    fn locate_copy<S: ByteSource + ?Sized>(
        &self,
        source: &S,
        master: &MasterSector,
        copy: HikbtreeCopy,
    ) -> Result<(HikbtreeHeader, Vec<PageSummary>)> {
        let header = HikbtreeHeader::decode(source, master, copy)?;
        let addresses = walk_page_list(source, header.page_list_address)?;

        let mut pages = Vec::with_capacity(addresses.len());
        let mut next_id = 0usize;
        for (index, address) in addresses.into_iter().enumerate() {
            let page = PageSummary::read(source, index, address, next_id);
            next_id += page.readable_records as usize;
            pages.push(page);
        }

        Ok((header, pages))
    }

    /// Page addresses are returned as encoded; flag the ones that cannot be right.
    fn warn_suspicious_pages<S: ByteSource + ?Sized>(
        &self,
        source: &S,
        master: &MasterSector,
        pages: &[PageSummary],
    ) {
        for page in pages {
            match page.status {
                PageStatus::Readable => {}
                PageStatus::HeaderUnreadable => tracing::warn!(
                    page = page.index,
                    address = page.address,
                    "Page header unreadable, skipping page"
                ),
                PageStatus::TableTruncated => tracing::warn!(
                    page = page.index,
                    declared = page.record_count,
                    readable = page.readable_records,
                    "Page record table runs past end of image"
                ),
            }

            if page.address == 0 {
                tracing::warn!(page = page.index, "Page address is zero");
            } else if page.address >= master.disk_size && master.disk_size > 0 {
                tracing::warn!(
                    page = page.index,
                    address = page.address,
                    disk_size = master.disk_size,
                    "Page address beyond declared disk size"
                );
            } else if page.address >= source.len() {
                tracing::warn!(
                    page = page.index,
                    address = page.address,
                    image_size = source.len(),
                    "Page address beyond end of image"
                );
            }
        }
    }

    /// Run the full decode with a progress callback. The callback may be
    /// invoked from rayon worker threads.
    pub fn decode_with_progress<S, F>(&self, source: &S, on_progress: F) -> Result<DecodedVolume>
    where
        S: ByteSource + ?Sized,
        F: Fn(DecodeProgress) + Send + Sync,
    {
        let start = Instant::now();
        let layout = self.locate_with_progress(source, &on_progress)?;

        tracing::info!(
            copy = %layout.hikbtree.copy,
            pages = layout.pages.len(),
            declared_records = layout.declared_records(),
            readable_records = layout.total_records(),
            workers = self.options.workers,
            "Decoding page records"
        );

        let per_page = self.decode_pages(source, &layout.pages, &on_progress)?;
        let records: Vec<VideoRecord> = per_page.into_iter().flatten().collect();
        let anomalies = AnomalyCounts::tally(&layout.pages, &records);

        on_progress(DecodeProgress::Done {
            records: records.len(),
        });

        let volume = DecodedVolume {
            master: layout.master,
            hikbtree: layout.hikbtree,
            pages: layout.pages,
            records,
            anomalies,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        if anomalies != AnomalyCounts::default() {
            tracing::warn!(
                unreadable_pages = anomalies.unreadable_pages,
                truncated_pages = anomalies.truncated_pages,
                unknown_allocation = anomalies.unknown_allocation,
                invalid_channel = anomalies.invalid_channel,
                unrepresentable_time = anomalies.unrepresentable_time,
                "Record anomalies found"
            );
        }
        tracing::info!(
            records = volume.records.len(),
            unset_start_time = anomalies.unset_start_time,
            unset_end_time = anomalies.unset_end_time,
            duration_ms = volume.duration_ms,
            "Decode complete"
        );

        Ok(volume)
    }

    /// Convenience wrapper without progress (for tests and non-interactive use)
    pub fn decode<S: ByteSource + ?Sized>(&self, source: &S) -> Result<DecodedVolume> {
        self.decode_with_progress(source, |_| {})
    }

    /// Decode every page, returning results in page order.
    fn decode_pages<S, F>(
        &self,
        source: &S,
        pages: &[PageSummary],
        on_progress: &F,
    ) -> Result<Vec<Vec<VideoRecord>>>
    where
        S: ByteSource + ?Sized,
        F: Fn(DecodeProgress) + Send + Sync,
    {
        let offset = self.options.video_time_offset_secs;
        let decode_one = |page: &PageSummary| -> Result<Vec<VideoRecord>> {
            let records = decode_page(source, page, offset)?;
            for rec in &records {
                if let Some(marker) = rec.allocation.unknown_marker_hex() {
                    tracing::debug!(id = rec.id, %marker, "Unknown allocation marker");
                }
            }
            tracing::debug!(
                page = page.index,
                address = page.address,
                records = records.len(),
                "Decoded page"
            );
            on_progress(DecodeProgress::Page {
                index: page.index,
                records: records.len(),
            });
            Ok(records)
        };

        if self.options.workers == 1 || pages.len() < 2 {
            return pages.iter().map(decode_one).collect();
        }

        // Indexed parallel collect keeps page order
        let run = || pages.par_iter().map(decode_one).collect::<Result<Vec<_>>>();
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.workers)
            .build()
        {
            Ok(pool) => pool.install(run),
            Err(e) => {
                tracing::warn!(error = %e, "Could not build worker pool, using global pool");
                run()
            }
        }
    }
}
