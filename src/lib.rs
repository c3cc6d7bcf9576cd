//! # APNG Capture Writer
//!
//! This library grows an animated PNG one frame at a time. After every call the
//! file on disk is a complete, playable APNG, and a later process can reopen it
//! and keep appending.
//!
//! The running sequence counter is persisted inside the file itself, in a
//! fixed-size `tEXt` chunk that is rewritten in place together with the
//! `acTL` frame count.

// Public API exports
pub mod checksum;
pub mod chunk;
pub mod cli;
pub mod encoder;
pub mod inspect;
pub mod muxer;
pub mod png;
pub mod utils;

pub use encoder::{FrameEncoder, PngFrameEncoder};
pub use inspect::{inspect_container, inspect_file, ContainerCheck, ContainerSummary};
pub use muxer::{append_frame, AppendAction, AppendOutcome, ApngWriter, Durability, FrameDelay, WriterOptions};

/// Result type alias for APNG operations
pub type ApngResult<T> = Result<T, ApngError>;

/// Every failure the writer can report, one variant per kind
#[derive(Debug, thiserror::Error)]
pub enum ApngError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PNG signature does not match")]
    SignatureMismatch,

    #[error("IHDR chunk does not match the frame being appended")]
    HeaderMismatch,

    #[error("bookmark chunk has wrong format: {0}")]
    Bookmark(String),

    #[error("chunk format error: {0}")]
    Format(String),

    #[error("chunk {chunk} claims {needed} bytes but only {available} remain")]
    Truncated {
        chunk: String,
        needed: usize,
        available: usize,
    },

    #[error("CRC mismatch in chunk {chunk}: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        chunk: String,
        stored: u32,
        computed: u32,
    },

    #[error("frame encoder failed: {0}")]
    Encode(#[from] ::png::EncodingError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ApngError {
    /// Validate that a chunk's stored CRC matches the recomputed value
    pub fn validate_chunk_crc(chunk_type: &[u8; 4], stored: u32, computed: u32) -> ApngResult<()> {
        if stored != computed {
            Err(ApngError::ChecksumMismatch {
                chunk: String::from_utf8_lossy(chunk_type).to_string(),
                stored,
                computed,
            })
        } else {
            Ok(())
        }
    }
}
