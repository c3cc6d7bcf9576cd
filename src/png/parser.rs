//! Low-level parsing of one baseline PNG into the chunks an APNG frame needs

use crate::chunk::{
    ChecksumPolicy, Chunk, ChunkKind, ImageEnd, ImageHeader, Signature, CHUNK_OVERHEAD, IDAT,
    IEND, IHDR,
};
use crate::utils::{chunk_type_name, read_u32_be};
use crate::{ApngError, ApngResult};

/// The pieces of a single-frame PNG that get repackaged into the animation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedImage {
    pub signature: Signature,
    pub header: ImageHeader,
    /// IHDR exactly as the encoder wrote it
    pub header_chunk: Chunk,
    /// IDAT chunks in file order, CRCs as stored
    pub image_data: Vec<Chunk>,
    pub end: Chunk,
}

impl ParsedImage {
    /// Verbatim IHDR bytes, compared against an existing container's IHDR
    pub fn header_bytes(&self) -> Vec<u8> {
        self.header_chunk.encode()
    }

    /// Total IDAT payload size
    pub fn image_data_len(&self) -> usize {
        self.image_data.iter().map(|chunk| chunk.data.len()).sum()
    }
}

/// Parse signature, IHDR, every IDAT and IEND from a PNG byte buffer.
///
/// Chunks other than IDAT and IEND are skipped without being read; anything
/// after IEND is ignored.
pub fn parse_single_image(data: &[u8], policy: ChecksumPolicy) -> ApngResult<ParsedImage> {
    let signature = Signature::decode(data)?;
    let mut offset = Signature::LEN;

    let (header_chunk, consumed) = Chunk::decode(&data[offset..], Some(IHDR), policy)?;
    let header = ImageHeader::from_chunk(&header_chunk)?;
    offset += consumed;

    let mut image_data = Vec::new();
    let end = loop {
        let rest = &data[offset..];
        if rest.len() < 8 {
            return Err(ApngError::Truncated {
                chunk: "IEND".to_string(),
                needed: CHUNK_OVERHEAD,
                available: rest.len(),
            });
        }

        let length = read_u32_be(rest, 0) as usize;
        let chunk_type = [rest[4], rest[5], rest[6], rest[7]];
        let span = length.saturating_add(CHUNK_OVERHEAD);
        if span > rest.len() {
            return Err(ApngError::Truncated {
                chunk: chunk_type_name(&chunk_type),
                needed: length.saturating_add(4),
                available: rest.len() - 8,
            });
        }

        match chunk_type {
            IDAT => {
                let (chunk, _) = Chunk::decode(rest, Some(IDAT), policy)?;
                image_data.push(chunk);
            }
            IEND => {
                let (chunk, _) = Chunk::decode(rest, Some(IEND), policy)?;
                ImageEnd::from_chunk(&chunk)?;
                break chunk;
            }
            _ => {
                tracing::trace!(chunk = %chunk_type_name(&chunk_type), length, "skipping chunk");
            }
        }
        offset += span;
    };

    if image_data.is_empty() {
        return Err(ApngError::Format("No IDAT chunk found".to_string()));
    }

    Ok(ParsedImage {
        signature,
        header,
        header_chunk,
        image_data,
        end,
    })
}
