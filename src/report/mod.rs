//! Report module - Render decoded volumes to report files
//!
//! Produces two reports per run:
//! - `MASTER_SECTOR_REPORT.TXT`: master sector, HIKBTREE header and page table
//! - the video report, one row per record slot, as legacy text, CSV or JSON
//!
//! Marker values stand in for anything that is not a real measurement, so an
//! investigator sees anomalies instead of plausible-looking numbers.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::decode::{
    AllocationState, AnomalyCounts, Channel, DecodedVolume, HikbtreeHeader, MasterSector,
    PageStatus, PageSummary, VideoRecord, VideoTime, VolumeLayout,
};

pub const MASTER_REPORT_FILE: &str = "MASTER_SECTOR_REPORT.TXT";

/// Rendered in place of an unset (or unrepresentable) timestamp
pub const UNSET_TIME_MARKER: &str = "1111111111111111111";
/// Rendered in place of a channel number above 256
pub const INVALID_CHANNEL_MARKER: &str = "555";
/// Rendered in the ALLOCATED column when the marker is neither pattern
pub const UNKNOWN_ALLOCATION_MARKER: &str = "?";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TEXT_HEADER: &str = "ID\t|    CHANNEL\t|\t    START TIME\t\t|\t   END TIME\t\t|   ALLOCATED\t|\t   ADDRESS";
const CSV_HEADER: &str = "ID,CHANNEL,START_TIME,END_TIME,ALLOCATED,BLOCK_ADDRESS";

/// Video report format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Tab and pipe delimited text, compatible with existing reports
    #[default]
    Text,
    /// Comma separated values
    Csv,
    /// Full decoded volume as JSON
    Json,
}

impl ReportFormat {
    pub fn video_file_name(self) -> &'static str {
        match self {
            ReportFormat::Text => "VIDEO_REPORT.TXT",
            ReportFormat::Csv => "VIDEO_REPORT.csv",
            ReportFormat::Json => "VIDEO_REPORT.json",
        }
    }
}

// ============================================================================
// Cell rendering
// ============================================================================

pub fn channel_cell(channel: Channel) -> String {
    match channel {
        Channel::Valid(n) => n.to_string(),
        Channel::Invalid(_) => INVALID_CHANNEL_MARKER.to_string(),
    }
}

pub fn time_cell(time: VideoTime) -> String {
    match time {
        VideoTime::At(t) => t.format(TIME_FORMAT).to_string(),
        VideoTime::Unset | VideoTime::Unrepresentable(_) => UNSET_TIME_MARKER.to_string(),
    }
}

pub fn allocation_cell(state: AllocationState) -> &'static str {
    match state {
        AllocationState::Allocated => "1",
        AllocationState::Unallocated => "0",
        AllocationState::Unknown(_) => UNKNOWN_ALLOCATION_MARKER,
    }
}

fn date(t: &DateTime<Utc>) -> String {
    t.format(TIME_FORMAT).to_string()
}

// ============================================================================
// Master report
// ============================================================================

fn field(out: &mut String, label: &str, value: impl std::fmt::Display) {
    let _ = write!(out, "{}: {}\n\n", label, value);
}

fn write_layout(
    out: &mut String,
    master: &MasterSector,
    hikbtree: &HikbtreeHeader,
    pages: &[PageSummary],
) {
    field(out, "Signature offset", master.signature_offset);
    field(out, "Disk size", master.disk_size);
    field(out, "Log address", master.system_logs_address);
    field(out, "Log size", master.system_logs_size);
    field(out, "Video address", master.video_area_address);
    field(out, "Block size", master.data_block_size);
    field(out, "Number of data blocks", master.total_data_blocks);
    for (i, loc) in master.hikbtree.iter().enumerate() {
        field(out, &format!("HIKBTREE {} address", i + 1), loc.address);
        field(out, &format!("HIKBTREE {} size", i + 1), loc.size);
    }
    field(
        out,
        "Disk initialization time (UTC)",
        date(&master.disk_init_time),
    );

    field(out, "Decoded HIKBTREE copy", hikbtree.copy);
    field(
        out,
        "Hikbtree initialization time (UTC)",
        date(&hikbtree.creation_time),
    );
    field(
        out,
        &format!("HIKBTREE {} footer address", hikbtree.copy),
        hikbtree.footer_address,
    );
    field(out, "Page list address", hikbtree.page_list_address);
    field(out, "Total page number on hikbtree", pages.len());

    for page in pages {
        field(out, &format!("Page {} address", page.index), page.address);
    }
    for page in pages {
        field(
            out,
            &format!("Page {} record number", page.index),
            page.record_count,
        );
    }
    for page in pages {
        match page.status {
            PageStatus::Readable => {}
            PageStatus::HeaderUnreadable => {
                field(out, &format!("Page {} status", page.index), "header unreadable")
            }
            PageStatus::TableTruncated => field(
                out,
                &format!("Page {} status", page.index),
                format!(
                    "record table truncated, {} of {} slots readable",
                    page.readable_records, page.record_count
                ),
            ),
        }
    }
}

/// Master report for a located (not yet record-decoded) volume
pub fn render_layout_report(layout: &VolumeLayout) -> String {
    let mut out = String::new();
    write_layout(&mut out, &layout.master, &layout.hikbtree, &layout.pages);
    out
}

/// Master report for a fully decoded volume, including anomaly totals
pub fn render_master_report(volume: &DecodedVolume) -> String {
    let mut out = String::new();
    write_layout(&mut out, &volume.master, &volume.hikbtree, &volume.pages);

    let AnomalyCounts {
        unreadable_pages,
        truncated_pages,
        unknown_allocation,
        invalid_channel,
        unset_start_time,
        unset_end_time,
        unrepresentable_time,
    } = volume.anomalies;
    field(&mut out, "Total record number", volume.records.len());
    field(&mut out, "Unreadable pages", unreadable_pages);
    field(&mut out, "Truncated pages", truncated_pages);
    field(&mut out, "Unknown allocation markers", unknown_allocation);
    field(&mut out, "Invalid channels", invalid_channel);
    field(&mut out, "Unset start times", unset_start_time);
    field(&mut out, "Unset end times", unset_end_time);
    field(&mut out, "Unrepresentable times", unrepresentable_time);
    out
}

// ============================================================================
// Video report
// ============================================================================

fn text_row(rec: &VideoRecord) -> String {
    format!(
        "{}\t|\t{}\t|\t{}\t|\t{}\t|\t{}\t|\t{}",
        rec.id,
        channel_cell(rec.channel),
        time_cell(rec.start_time),
        time_cell(rec.end_time),
        allocation_cell(rec.allocation),
        rec.block_address
    )
}

fn csv_row(rec: &VideoRecord) -> String {
    format!(
        "{},{},{},{},{},{}",
        rec.id,
        channel_cell(rec.channel),
        time_cell(rec.start_time),
        time_cell(rec.end_time),
        allocation_cell(rec.allocation),
        rec.block_address
    )
}

/// Render the video report: a header row plus one row per record
pub fn render_video_report(volume: &DecodedVolume, format: ReportFormat) -> Result<String> {
    let (header, row) = match format {
        ReportFormat::Json => {
            return serde_json::to_string_pretty(volume).context("Failed to serialize volume")
        }
        ReportFormat::Text => (TEXT_HEADER, text_row as fn(&VideoRecord) -> String),
        ReportFormat::Csv => (CSV_HEADER, csv_row as fn(&VideoRecord) -> String),
    };

    let mut out = String::with_capacity((volume.records.len() + 1) * 64);
    out.push_str(header);
    out.push('\n');
    for rec in &volume.records {
        out.push_str(&row(rec));
        out.push('\n');
    }
    Ok(out)
}

// ============================================================================
// Writing
// ============================================================================

/// Paths of the written reports
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub master: PathBuf,
    pub video: PathBuf,
}

/// Writes both reports into one output directory
pub struct ReportWriter {
    output_dir: PathBuf,
    format: ReportFormat,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>, format: ReportFormat) -> Self {
        Self {
            output_dir: output_dir.into(),
            format,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write both reports, replacing earlier ones in the same directory
    pub fn write(&self, volume: &DecodedVolume) -> Result<ReportPaths> {
        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!(
                "Failed to create report directory: {}",
                self.output_dir.display()
            )
        })?;

        let master = self.output_dir.join(MASTER_REPORT_FILE);
        std::fs::write(&master, render_master_report(volume))
            .with_context(|| format!("Failed to write report: {}", master.display()))?;

        let video = self.output_dir.join(self.format.video_file_name());
        std::fs::write(&video, render_video_report(volume, self.format)?)
            .with_context(|| format!("Failed to write report: {}", video.display()))?;

        tracing::info!(
            master = %master.display(),
            video = %video.display(),
            records = volume.records.len(),
            "Reports written"
        );

        Ok(ReportPaths { master, video })
    }
}

/// Short human-readable summary for the terminal
pub fn to_human_string(volume: &DecodedVolume) -> String {
    let mut out = String::new();
    let master = &volume.master;

    out.push_str("\n  hik-drill Volume Summary\n");
    out.push_str("  ========================================\n\n");
    let _ = writeln!(
        out,
        "  Disk size:       {}",
        humansize::format_size(master.disk_size, humansize::BINARY)
    );
    let _ = writeln!(
        out,
        "  Data blocks:     {} x {}",
        master.total_data_blocks,
        humansize::format_size(master.data_block_size, humansize::BINARY)
    );
    let _ = writeln!(out, "  Initialized:     {} UTC", date(&master.disk_init_time));
    let _ = writeln!(out, "  HIKBTREE copy:   {}", volume.hikbtree.copy);
    let _ = writeln!(out, "  Pages:           {}", volume.pages.len());
    let _ = writeln!(out, "  Records:         {}", volume.records.len());

    let allocated = volume
        .records
        .iter()
        .filter(|r| r.allocation == AllocationState::Allocated)
        .count();
    let _ = writeln!(out, "  Allocated:       {}", allocated);

    let a = &volume.anomalies;
    if a.unreadable_pages + a.truncated_pages > 0 {
        let _ = writeln!(
            out,
            "  Damaged pages:   {} unreadable, {} truncated",
            a.unreadable_pages, a.truncated_pages
        );
    }
    if a.unknown_allocation + a.invalid_channel + a.unrepresentable_time > 0 {
        let _ = writeln!(
            out,
            "  Anomalies:       {} unknown markers, {} invalid channels, {} bad times",
            a.unknown_allocation, a.invalid_channel, a.unrepresentable_time
        );
    }
    let _ = writeln!(out, "  Duration:        {} ms", volume.duration_ms);
    out
}
