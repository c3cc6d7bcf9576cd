//! Fixed byte positions of the chunks every capture file starts with

use crate::chunk::{
    AnimationControl, Bookmark, ChecksumPolicy, Chunk, ChunkKind, FixedChunk, ImageEnd,
    ImageHeader, Signature,
};
use crate::{ApngError, ApngResult};

pub const IHDR_OFFSET: usize = Signature::LEN;
pub const BOOKMARK_OFFSET: usize = IHDR_OFFSET + ImageHeader::ENCODED_LEN;
pub const ACTL_OFFSET: usize = BOOKMARK_OFFSET + Bookmark::ENCODED_LEN;
pub const FIRST_FRAME_OFFSET: usize = ACTL_OFFSET + AnimationControl::ENCODED_LEN;

/// Signature, IHDR, bookmark, acTL and IEND with no frames in between
pub const MIN_CONTAINER_LEN: usize = FIRST_FRAME_OFFSET + ImageEnd::ENCODED_LEN;

/// Decode the bookmark, reporting any structural problem as a bookmark error.
/// A bad CRC under `ChecksumPolicy::Verify` stays a checksum error.
pub(crate) fn read_bookmark(bytes: &[u8], policy: ChecksumPolicy) -> ApngResult<Bookmark> {
    let (chunk, _) = Chunk::decode(bytes, None, policy).map_err(|e| match e {
        ApngError::ChecksumMismatch { .. } => e,
        other => ApngError::Bookmark(other.to_string()),
    })?;
    Bookmark::from_chunk(&chunk)
}
