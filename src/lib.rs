//! hik-drill Library
//!
//! Offline decoder for the on-disk metadata of Hikvision/Haikon DVR storage
//! volumes. Locates the master sector and the HIKBTREE index inside a raw disk
//! image by magic-signature search, walks the page list and pages, and
//! recovers per-segment metadata (channel, time range, allocation state,
//! block address).
//!
//! # Features
//!
//! - **Read-Only Safe**: images are memory-mapped read-only and never modified
//! - **Parallel Pages**: page record tables decode concurrently with rayon
//! - **Redundant Copies**: either HIKBTREE copy can be decoded, with opt-in fallback
//! - **Explicit Anomalies**: unknown allocation markers, invalid channels and unset
//!   timestamps are kept as marker values, never dropped or guessed
//!
//! # Example
//!
//! ```no_run
//! use hik_drill::decode::{DecodeOptions, Decoder};
//! use hik_drill::readonly::ImageFile;
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let image = ImageFile::open(Path::new("dvr.dd"))?;
//!     let volume = Decoder::new(DecodeOptions::default()).decode(&image)?;
//!
//!     println!("Found {} video segments", volume.records.len());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod decode;
pub mod error;
pub mod readonly;
pub mod report;

// Re-export commonly used types
pub use config::Config;
pub use decode::{
    AllocationState, Channel, DecodeOptions, DecodeProgress, DecodedVolume, Decoder,
    HikbtreeHeader, MasterSector, PageStatus, PageSummary, VideoRecord, VideoTime, VolumeLayout,
};
pub use error::{DecodeError, HikbtreeCopy, Structure};
pub use readonly::{ByteSource, ImageFile};
pub use report::{ReportFormat, ReportWriter};
