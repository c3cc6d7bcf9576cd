//! Reading a capture file back and checking its frame bookkeeping

use std::fmt;
use std::fs;
use std::path::Path;

use crate::chunk::{
    AnimationControl, Bookmark, ChecksumPolicy, Chunk, ChunkKind, FixedChunk, FrameControl,
    FrameData, ImageEnd, ImageHeader, ACTL, FCTL, FDAT, IDAT, IEND, IHDR,
};
use crate::muxer::layout::{read_bookmark, BOOKMARK_OFFSET, IHDR_OFFSET};
use crate::utils::{chunk_type_name, is_png_signature};
use crate::{ApngError, ApngResult};

/// One fcTL and the data chunks that follow it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSummary {
    pub control: FrameControl,
    /// Byte offset of the fcTL chunk
    pub offset: usize,
    pub image_data_chunks: usize,
    pub frame_data_sequences: Vec<u32>,
    /// Compressed pixel bytes, sequence numbers excluded
    pub data_bytes: usize,
}

/// Everything the writer keeps track of in a capture file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub file_len: usize,
    pub header: ImageHeader,
    /// Value stored in the bookmark
    pub next_sequence: u32,
    pub animation: AnimationControl,
    pub frames: Vec<FrameSummary>,
    /// Chunks the walk skipped over
    pub other_chunks: Vec<String>,
}

/// Result of checking a summary's cross-chunk invariants
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerCheck {
    Consistent,
    Inconsistent(Vec<String>),
}

impl fmt::Display for ContainerCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerCheck::Consistent => write!(f, "consistent"),
            ContainerCheck::Inconsistent(problems) => {
                write!(f, "inconsistent: {}", problems.join("; "))
            }
        }
    }
}

/// Read a capture file from disk and summarise it
pub fn inspect_file(path: &Path, policy: ChecksumPolicy) -> ApngResult<ContainerSummary> {
    let data = fs::read(path)?;
    inspect_container(&data, policy)
}

/// Walk every chunk of a capture file.
///
/// The fixed prefix (signature, IHDR, bookmark, acTL) must be where the writer
/// puts it, every fdAT or IDAT must follow an fcTL, and IEND must be the last
/// chunk. Frame bookkeeping is not judged here; see [`ContainerSummary::check`].
pub fn inspect_container(data: &[u8], policy: ChecksumPolicy) -> ApngResult<ContainerSummary> {
    if !is_png_signature(data) {
        return Err(ApngError::SignatureMismatch);
    }

    let (header_chunk, used) = Chunk::decode(&data[IHDR_OFFSET..], Some(IHDR), policy)?;
    let header = ImageHeader::from_chunk(&header_chunk)?;
    let mut offset = IHDR_OFFSET + used;
    debug_assert_eq!(offset, BOOKMARK_OFFSET);

    let bookmark = read_bookmark(&data[offset..], policy)?;
    offset += Bookmark::ENCODED_LEN;

    let (actl_chunk, used) = Chunk::decode(&data[offset..], Some(ACTL), policy)?;
    let animation = AnimationControl::from_chunk(&actl_chunk)?;
    offset += used;

    let mut frames: Vec<FrameSummary> = Vec::new();
    let mut other_chunks = Vec::new();

    loop {
        if offset >= data.len() {
            return Err(ApngError::Truncated {
                chunk: "IEND".to_string(),
                needed: ImageEnd::ENCODED_LEN,
                available: 0,
            });
        }

        let chunk_offset = offset;
        let (chunk, used) = Chunk::decode(&data[offset..], None, policy)?;
        offset += used;

        match chunk.chunk_type {
            FCTL => frames.push(FrameSummary {
                control: FrameControl::from_chunk(&chunk)?,
                offset: chunk_offset,
                image_data_chunks: 0,
                frame_data_sequences: Vec::new(),
                data_bytes: 0,
            }),
            IDAT => {
                let frame = current_frame(&mut frames, &chunk)?;
                frame.image_data_chunks += 1;
                frame.data_bytes += chunk.data.len();
            }
            FDAT => {
                let fdat = FrameData::from_chunk(&chunk)?;
                let frame = current_frame(&mut frames, &chunk)?;
                frame.frame_data_sequences.push(fdat.sequence_number);
                frame.data_bytes += fdat.data.len();
            }
            IEND => {
                ImageEnd::from_chunk(&chunk)?;
                if offset != data.len() {
                    return Err(ApngError::Format(format!(
                        "{} bytes after IEND",
                        data.len() - offset
                    )));
                }
                break;
            }
            other => other_chunks.push(chunk_type_name(&other)),
        }
    }

    Ok(ContainerSummary {
        file_len: data.len(),
        header,
        next_sequence: bookmark.next_sequence,
        animation,
        frames,
        other_chunks,
    })
}

fn current_frame<'a>(
    frames: &'a mut [FrameSummary],
    chunk: &Chunk,
) -> ApngResult<&'a mut FrameSummary> {
    frames.last_mut().ok_or_else(|| {
        ApngError::Format(format!("{} chunk before the first fcTL", chunk.type_name()))
    })
}

impl ContainerSummary {
    /// Check frame count, sequence numbering and frame placement
    pub fn check(&self) -> ContainerCheck {
        let mut problems = Vec::new();

        if self.animation.num_frames as usize != self.frames.len() {
            problems.push(format!(
                "acTL counts {} frames but {} fcTL chunks exist",
                self.animation.num_frames,
                self.frames.len()
            ));
        }

        let mut expected: u32 = 0;
        for (index, frame) in self.frames.iter().enumerate() {
            if frame.control.sequence_number != expected {
                problems.push(format!(
                    "frame {index}: fcTL sequence {} where {expected} was expected",
                    frame.control.sequence_number
                ));
            }
            expected = frame.control.sequence_number.wrapping_add(1);

            for &seq in &frame.frame_data_sequences {
                if seq != expected {
                    problems.push(format!(
                        "frame {index}: fdAT sequence {seq} where {expected} was expected"
                    ));
                }
                expected = seq.wrapping_add(1);
            }

            let first = index == 0;
            if first && (frame.image_data_chunks == 0 || !frame.frame_data_sequences.is_empty()) {
                problems.push("frame 0 must be carried in IDAT chunks only".to_string());
            }
            if !first && (frame.image_data_chunks != 0 || frame.frame_data_sequences.is_empty()) {
                problems.push(format!("frame {index} must be carried in fdAT chunks only"));
            }

            let right = u64::from(frame.control.x_offset) + u64::from(frame.control.width);
            let bottom = u64::from(frame.control.y_offset) + u64::from(frame.control.height);
            if right > u64::from(self.header.width) || bottom > u64::from(self.header.height) {
                problems.push(format!("frame {index} extends past the canvas"));
            }
        }

        if self.next_sequence != expected {
            problems.push(format!(
                "bookmark says next sequence is {} but {expected} is next",
                self.next_sequence
            ));
        }

        if problems.is_empty() {
            ContainerCheck::Consistent
        } else {
            ContainerCheck::Inconsistent(problems)
        }
    }

    /// Total display time in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.frames
            .iter()
            .map(|frame| {
                // a zero denominator means 1/100 s
                let den = match frame.control.delay_den {
                    0 => 100,
                    den => u64::from(den),
                };
                u64::from(frame.control.delay_num) * 1000 / den
            })
            .sum()
    }
}
