//! Error types for the HIKBTREE decoder.

use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for decoder operations.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Which of the two redundant HIKBTREE copies a structure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HikbtreeCopy {
    #[default]
    Primary,
    Secondary,
}

impl HikbtreeCopy {
    /// Zero-based slot in the master sector's copy table.
    pub fn slot(self) -> usize {
        match self {
            HikbtreeCopy::Primary => 0,
            HikbtreeCopy::Secondary => 1,
        }
    }

    /// The redundant copy on the other side.
    pub fn other(self) -> Self {
        match self {
            HikbtreeCopy::Primary => HikbtreeCopy::Secondary,
            HikbtreeCopy::Secondary => HikbtreeCopy::Primary,
        }
    }
}

impl fmt::Display for HikbtreeCopy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slot() + 1)
    }
}

/// On-disk structure being decoded when an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Structure {
    MasterSector,
    Hikbtree(HikbtreeCopy),
    PageList,
    Page(usize),
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Structure::MasterSector => write!(f, "master sector"),
            Structure::Hikbtree(copy) => write!(f, "HIKBTREE copy {}", copy),
            Structure::PageList => write!(f, "page list"),
            Structure::Page(index) => write!(f, "page {}", index),
        }
    }
}

/// Fatal decoding errors. Recoverable anomalies (unknown allocation markers,
/// out-of-range channels, unset timestamps) live inside the decoded records.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Magic signature absent from the searched region.
    #[error("{structure} signature not found in {len} bytes at offset {offset:#x}")]
    SignatureNotFound {
        structure: Structure,
        offset: u64,
        len: u64,
    },

    /// The image ends before a field could be read.
    #[error("truncated read in {structure}: wanted {wanted} bytes at offset {offset:#x}, image has {available}")]
    TruncatedRead {
        structure: Structure,
        offset: u64,
        wanted: usize,
        available: u64,
    },

    /// Opening or mapping the image failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DecodeError {
    /// Errors after which the other HIKBTREE copy is worth trying.
    pub fn is_copy_local(&self) -> bool {
        matches!(
            self,
            DecodeError::SignatureNotFound { .. } | DecodeError::TruncatedRead { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structure_names_in_messages() {
        let err = DecodeError::SignatureNotFound {
            structure: Structure::Hikbtree(HikbtreeCopy::Secondary),
            offset: 0x1000,
            len: 512,
        };
        let msg = err.to_string();
        assert!(msg.contains("HIKBTREE copy 2"));
        assert!(msg.contains("0x1000"));

        let err = DecodeError::TruncatedRead {
            structure: Structure::Page(3),
            offset: 64,
            wanted: 8,
            available: 66,
        };
        assert!(err.to_string().contains("page 3"));
    }

    #[test]
    fn test_copy_local_errors() {
        let io = DecodeError::Io {
            path: PathBuf::from("x.img"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert!(!io.is_copy_local());

        let sig = DecodeError::SignatureNotFound {
            structure: Structure::MasterSector,
            offset: 0,
            len: 1024,
        };
        assert!(sig.is_copy_local());
    }

    #[test]
    fn test_copy_slots() {
        assert_eq!(HikbtreeCopy::Primary.slot(), 0);
        assert_eq!(HikbtreeCopy::Secondary.slot(), 1);
        assert_eq!(HikbtreeCopy::Primary.other(), HikbtreeCopy::Secondary);
        assert_eq!(HikbtreeCopy::Secondary.to_string(), "2");
    }
}
