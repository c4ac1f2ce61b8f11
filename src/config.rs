//! Configuration Module - User preferences from ~/.hikdrill/config.toml
//!
//! Supports:
//! - Log level and read-only warnings
//! - Decode defaults (index copy, fallback, video time offset, workers)
//! - Report output directory and format

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::decode::{DecodeOptions, DEFAULT_VIDEO_TIME_OFFSET_SECS};
use crate::error::HikbtreeCopy;
use crate::report::ReportFormat;

/// hik-drill Configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Decode settings
    pub decode: DecodeConfig,
    /// Report settings
    pub report: ReportConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Warn when the image is writable by this process
    pub enforce_readonly: bool,
    /// Log level: trace, debug, info, warn, error
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enforce_readonly: true,
            log_level: "info".to_string(),
        }
    }
}

/// Decode settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// HIKBTREE copy to decode first: primary or secondary
    pub copy: HikbtreeCopy,
    /// Fall back to the other copy when the selected one is unreadable
    pub fallback: bool,
    /// Seconds subtracted from video timestamps
    pub video_time_offset_secs: i64,
    /// Number of parallel workers (0 = auto)
    pub workers: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            copy: HikbtreeCopy::Primary,
            fallback: false,
            video_time_offset_secs: DEFAULT_VIDEO_TIME_OFFSET_SECS,
            workers: 0, // auto-detect
        }
    }
}

impl DecodeConfig {
    pub fn to_options(&self) -> DecodeOptions {
        DecodeOptions {
            copy: self.copy,
            fallback: self.fallback,
            video_time_offset_secs: self.video_time_offset_secs,
            workers: self.workers,
        }
    }
}

/// Report settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory the reports are written to
    pub output_dir: PathBuf,
    /// Video report format: text, csv or json
    pub format: ReportFormat,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("hik-reports"),
            format: ReportFormat::Text,
        }
    }
}

impl Config {
    /// Load config from default path or return defaults
    pub fn load() -> Self {
        Self::load_or_default(&Self::default_path())
    }

    /// Load `path` if it exists. An unreadable file falls back to defaults with
    /// a warning on stderr, since logging is configured from the result.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        Self::load_from(path).unwrap_or_else(|e| {
            eprintln!("{} Ignoring unreadable config: {:#}", "⚠".yellow(), e);
            Self::default()
        })
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;

        Ok(config)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;

        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "hikdrill", "hik-drill")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".hikdrill")
                    .join("config.toml")
            })
    }

    /// Write the commented sample config to `path`. Refuses to overwrite
    /// unless `force` is set.
    pub fn init_at(path: &Path, force: bool) -> Result<()> {
        anyhow::ensure!(
            force || !path.exists(),
            "Config already exists: {} (use --force to overwrite)",
            path.display()
        );
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, generate_sample_config())
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        tracing::info!("Created default config at {}", path.display());
        Ok(())
    }
}

/// Generate a sample config file with comments
pub fn generate_sample_config() -> String {
    r#"# hik-drill Configuration
# Location: ~/.config/hik-drill/config.toml (or %APPDATA%\hikdrill\hik-drill\config\config.toml on Windows)

[general]
# Warn when the image could be opened for writing (recommended)
enforce_readonly = true

# Log level: trace, debug, info, warn, error
log_level = "info"

[decode]
# HIKBTREE copy to decode first: "primary" or "secondary"
copy = "primary"

# Decode the other copy when the selected one has no signature or is truncated
fallback = false

# Seconds subtracted from every video start/end time (3 hours by default)
video_time_offset_secs = 10800

# Number of parallel page decoders (0 = auto-detect CPU count, 1 = sequential)
workers = 0

[report]
# Directory for MASTER_SECTOR_REPORT.TXT and the video report
output_dir = "hik-reports"

# Video report format: "text", "csv" or "json"
format = "text"
"#
    .to_string()
}
