//! CLI module - Command line interface definitions and handlers

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Config;
use crate::decode::{DecodeOptions, DecodeProgress, Decoder};
use crate::error::HikbtreeCopy;
use crate::readonly::{warn_if_writable, ImageFile};
use crate::report::{self, ReportFormat, ReportWriter};

/// hik-drill - Offline Hikvision/Haikon DVR disk image decoder
///
/// Locates the master sector and HIKBTREE index in a raw disk image and
/// enumerates every recorded video segment. All operations are READ-ONLY.
#[derive(Parser, Debug)]
#[command(name = "hik-drill")]
#[command(version)]
#[command(about = "Offline Hikvision/Haikon DVR disk image decoder", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decode the index and write master sector and video reports
    Decode(DecodeArgs),

    /// Show master sector, HIKBTREE header and page table without decoding records
    Info(InfoArgs),

    /// Write a commented sample config file
    InitConfig(InitConfigArgs),
}

#[derive(Debug, Clone, Parser)]
pub struct DecodeArgs {
    /// Raw disk image (dd, img, or block device)
    #[arg(required = true)]
    pub image: PathBuf,

    /// Output directory for reports
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Video report format
    #[arg(long, short, value_enum)]
    pub format: Option<ReportFormat>,

    /// HIKBTREE copy to decode first
    #[arg(long, value_enum)]
    pub copy: Option<CopyArg>,

    /// Fall back to the other HIKBTREE copy when the selected one is unreadable
    #[arg(long)]
    pub fallback: bool,

    /// Seconds subtracted from video timestamps (default: 10800)
    #[arg(long, allow_hyphen_values = true)]
    pub time_offset: Option<i64>,

    /// Number of parallel workers (0 = CPU count, 1 = sequential)
    #[arg(long, short)]
    pub workers: Option<usize>,

    /// Dry run - decode and summarize without writing reports
    #[arg(long, short = 'n')]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Parser)]
pub struct InfoArgs {
    /// Raw disk image
    #[arg(required = true)]
    pub image: PathBuf,

    /// HIKBTREE copy to read
    #[arg(long, value_enum)]
    pub copy: Option<CopyArg>,

    /// Fall back to the other HIKBTREE copy when the selected one is unreadable
    #[arg(long)]
    pub fallback: bool,

    /// Print JSON instead of the text report
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Parser)]
pub struct InitConfigArgs {
    /// Overwrite an existing config
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CopyArg {
    /// HIKBTREE copy 1
    #[value(name = "1")]
    Primary,
    /// HIKBTREE copy 2
    #[value(name = "2")]
    Secondary,
}

impl From<CopyArg> for HikbtreeCopy {
    fn from(arg: CopyArg) -> Self {
        match arg {
            CopyArg::Primary => HikbtreeCopy::Primary,
            CopyArg::Secondary => HikbtreeCopy::Secondary,
        }
    }
}

/// Load the config named on the command line, or the default one
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => Config::load_from(p),
        None => Ok(Config::load()),
    }
}

/// Merge CLI flags over config values
pub fn decode_options(config: &Config, copy: Option<CopyArg>, fallback: bool) -> DecodeOptions {
    let mut options = config.decode.to_options();
    if let Some(copy) = copy {
        options.copy = copy.into();
    }
    options.fallback |= fallback;
    options
}

fn open_image(config: &Config, path: &Path) -> Result<ImageFile> {
    anyhow::ensure!(path.exists(), "Image not found: {}", path.display());
    if config.general.enforce_readonly {
        warn_if_writable(path);
    }
    ImageFile::open(path).with_context(|| format!("Failed to open image: {}", path.display()))
}

pub fn run_decode(config: &Config, args: &DecodeArgs) -> Result<()> {
    let mut options = decode_options(config, args.copy, args.fallback);
    if let Some(offset) = args.time_offset {
        options.video_time_offset_secs = offset;
    }
    if let Some(workers) = args.workers {
        options.workers = workers;
    }

    println!("hik-drill decode");
    println!("Image: {}\n", args.image.display());

    let image = open_image(config, &args.image)?;
    let decoder = Decoder::new(options);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let result = decoder.decode_with_progress(&image, |p| match p {
        DecodeProgress::MasterSector => pb.set_message("master sector"),
        DecodeProgress::Hikbtree { copy } => pb.set_message(format!("HIKBTREE copy {}", copy)),
        DecodeProgress::PageList { pages, .. } => {
            pb.set_length(pages as u64);
            pb.set_message("pages");
        }
        DecodeProgress::Page { .. } => pb.inc(1),
        DecodeProgress::Done { .. } => {}
    });

    let volume = match result {
        Ok(volume) => {
            pb.finish_with_message("Complete!");
            volume
        }
        Err(e) => {
            pb.abandon_with_message("Failed");
            println!("{} Decode failed: {}", "✗".bright_red(), e);
            return Err(e).with_context(|| format!("Failed to decode {}", args.image.display()));
        }
    };

    print!("{}", report::to_human_string(&volume));

    if args.dry_run {
        println!("\n{} Dry run - no reports written", "ℹ".bright_cyan());
        return Ok(());
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| config.report.output_dir.clone());
    let format = args.format.unwrap_or(config.report.format);
    let paths = ReportWriter::new(output, format).write(&volume)?;

    println!(
        "\n{} Wrote {} and {}",
        "✓".bright_green(),
        paths.master.display(),
        paths.video.display()
    );
    Ok(())
}

pub fn run_info(config: &Config, args: &InfoArgs) -> Result<()> {
    let image = open_image(config, &args.image)?;
    let layout = Decoder::new(decode_options(config, args.copy, args.fallback))
        .locate(&image)
        .with_context(|| format!("Failed to locate index in {}", args.image.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&layout)?);
    } else {
        print!("{}", report::render_layout_report(&layout));
        println!(
            "{} {} pages, {} declared records, {} readable",
            "✓".bright_green(),
            layout.pages.len(),
            layout.declared_records(),
            layout.total_records()
        );
    }
    Ok(())
}

pub fn run_init_config(path: Option<&Path>, args: &InitConfigArgs) -> Result<()> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(Config::default_path);
    Config::init_at(&path, args.force)?;
    println!("{} Wrote {}", "✓".bright_green(), path.display());
    Ok(())
}
