//! Read-Only Image Access
//!
//! hik-drill never modifies the evidence it decodes:
//! - Images are opened with `File::open` only and memory-mapped read-only
//! - Every structure read goes through the [`ByteSource`] trait, which has no write path
//! - A writability check warns when the image is not write-protected

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use colored::Colorize;
use memmap2::Mmap;

use crate::error::{DecodeError, Result};

// ============================================================================
// Byte Source
// ============================================================================

/// Random-access, read-only view over a disk image.
///
/// `read_at` returns exactly `length` bytes starting at `offset`, or `None`
/// when the range runs past the end of the image.
pub trait ByteSource: Sync {
    /// Total size of the image in bytes
    fn len(&self) -> u64;

    /// Borrow `length` bytes at `offset`
    fn read_at(&self, offset: u64, length: usize) -> Option<&[u8]>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ByteSource for [u8] {
    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }

    fn read_at(&self, offset: u64, length: usize) -> Option<&[u8]> {
        let start = usize::try_from(offset).ok()?;
        let end = start.checked_add(length)?;
        self.get(start..end)
    }
}

impl ByteSource for Vec<u8> {
    fn len(&self) -> u64 {
        self.as_slice().len() as u64
    }

    fn read_at(&self, offset: u64, length: usize) -> Option<&[u8]> {
        self.as_slice().read_at(offset, length)
    }
}

// ============================================================================
// Memory-Mapped Image File
// ============================================================================

/// A raw disk image opened read-only and memory-mapped for zero-copy reads.
pub struct ImageFile {
    path: PathBuf,
    mmap: Mmap,
}

impl ImageFile {
    /// Open and map an image. Empty images are rejected since no structure
    /// could ever be addressed inside them.
    pub fn open(path: &Path) -> Result<Self> {
        let io_err = |source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(io_err)?;
        let size = file.metadata().map_err(io_err)?.len();
        if size == 0 {
            return Err(io_err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "image file is empty",
            )));
        }

        // SAFETY: the map is read-only and the image is treated as immutable evidence.
        let mmap = unsafe { Mmap::map(&file) }.map_err(io_err)?;

        tracing::debug!(path = %path.display(), size, "Mapped image read-only");

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for ImageFile {
    fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn read_at(&self, offset: u64, length: usize) -> Option<&[u8]> {
        self.mmap[..].read_at(offset, length)
    }
}

// ============================================================================
// Safety Warnings
// ============================================================================

/// Check whether this process could open the image for writing
pub fn is_writable(path: &Path) -> bool {
    OpenOptions::new()
        .write(true)
        .create(false)
        .open(path)
        .is_ok()
}

/// Print a warning to stderr if the image is not write-protected. Returns true when writable.
pub fn warn_if_writable(path: &Path) -> bool {
    if !is_writable(path) {
        eprintln!("  {} Image is write-protected (safe)", "🔒".green());
        return false;
    }

    tracing::warn!(path = %path.display(), "Image is writable by this process");
    eprintln!(
        "\n  {} {}",
        "⚠".yellow().bold(),
        "WARNING: Image may be writable!".yellow().bold()
    );
    eprintln!(
        "  {}",
        "  hik-drill only reads, but consider a write-protected copy:".yellow()
    );
    #[cfg(unix)]
    eprintln!("    {}", "chmod a-w /path/to/image.dd".bright_cyan());
    #[cfg(windows)]
    eprintln!("    {}", "attrib +R C:\\path\\to\\image.dd".bright_cyan());
    eprintln!();
    true
}

// ============================================================================
// Tests
// ============================================================================
