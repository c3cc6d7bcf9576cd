//! PNG chunk envelope and the typed chunk kinds an APNG capture file uses

pub mod kinds;

use std::io::{self, Write};

use byteorder::{BigEndian, WriteBytesExt};

use crate::checksum::Crc32;
use crate::utils::{chunk_type_name, read_u32_be};
use crate::{ApngError, ApngResult};

pub use kinds::{
    AnimationControl, Bookmark, FrameControl, FrameData, FrameDelay, ImageData, ImageEnd,
    ImageHeader, Signature, COLOR_TYPE_RGB,
};

pub type ChunkType = [u8; 4];

/// Image header
pub const IHDR: ChunkType = *b"IHDR";
/// Image data
pub const IDAT: ChunkType = *b"IDAT";
/// Image trailer
pub const IEND: ChunkType = *b"IEND";
/// Textual data, used for the sequence bookmark
pub const TEXT: ChunkType = *b"tEXt";
/// Animation control
pub const ACTL: ChunkType = *b"acTL";
/// Frame control
pub const FCTL: ChunkType = *b"fcTL";
/// Frame data
pub const FDAT: ChunkType = *b"fdAT";

/// Length, type and CRC fields around every payload
pub const CHUNK_OVERHEAD: usize = 12;

/// Returns true if the chunk is critical.
pub fn is_critical(chunk_type: ChunkType) -> bool {
    chunk_type[0] & 32 == 0
}

/// Returns true if decoders may ignore the chunk.
pub fn is_ancillary(chunk_type: ChunkType) -> bool {
    !is_critical(chunk_type)
}

/// Whether decoding checks the stored CRC against a recomputed one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumPolicy {
    /// Trust the stored CRC
    Ignore,
    /// Reject chunks whose stored CRC is wrong
    #[default]
    Verify,
}

/// PNG chunk structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_type: ChunkType,
    pub data: Vec<u8>,
    pub crc: u32,
}

/// CRC over the type tag followed by the payload
pub fn chunk_crc(chunk_type: &ChunkType, data: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.update(chunk_type);
    crc.update(data);
    crc.finalize()
}

impl Chunk {
    /// Build a chunk with a freshly computed CRC
    pub fn new(chunk_type: ChunkType, data: Vec<u8>) -> Self {
        let crc = chunk_crc(&chunk_type, &data);
        Self { chunk_type, data, crc }
    }

    /// Value of the length field
    pub fn length(&self) -> u32 {
        self.data.len() as u32
    }

    /// Size of the chunk on disk, envelope included
    pub fn encoded_len(&self) -> usize {
        self.data.len() + CHUNK_OVERHEAD
    }

    pub fn computed_crc(&self) -> u32 {
        chunk_crc(&self.chunk_type, &self.data)
    }

    pub fn verify_crc(&self) -> ApngResult<()> {
        ApngError::validate_chunk_crc(&self.chunk_type, self.crc, self.computed_crc())
    }

    pub fn type_name(&self) -> String {
        chunk_type_name(&self.chunk_type)
    }

    /// Write length, type, payload and the stored CRC
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<BigEndian>(self.length())?;
        writer.write_all(&self.chunk_type)?;
        writer.write_all(&self.data)?;
        writer.write_u32::<BigEndian>(self.crc)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&self.length().to_be_bytes());
        out.extend_from_slice(&self.chunk_type);
        out.extend_from_slice(&self.data);
        out.extend_from_slice(&self.crc.to_be_bytes());
        out
    }

    /// Decode one chunk from the start of `bytes`, returning it together with
    /// the number of bytes it occupied
    pub fn decode(
        bytes: &[u8],
        expected: Option<ChunkType>,
        policy: ChecksumPolicy,
    ) -> ApngResult<(Self, usize)> {
        if bytes.len() < CHUNK_OVERHEAD {
            return Err(ApngError::Format(format!(
                "need at least {CHUNK_OVERHEAD} bytes for a chunk, got {}",
                bytes.len()
            )));
        }

        let length = read_u32_be(bytes, 0) as usize;
        let chunk_type = [bytes[4], bytes[5], bytes[6], bytes[7]];

        if let Some(expected) = expected
            && chunk_type != expected
        {
            return Err(ApngError::Format(format!(
                "expected {} chunk, found {}",
                chunk_type_name(&expected),
                chunk_type_name(&chunk_type)
            )));
        }

        let available = bytes.len() - 8;
        let needed = length.saturating_add(4);
        if needed > available {
            return Err(ApngError::Truncated {
                chunk: chunk_type_name(&chunk_type),
                needed,
                available,
            });
        }

        let data = bytes[8..8 + length].to_vec();
        let crc = read_u32_be(bytes, 8 + length);
        let chunk = Self { chunk_type, data, crc };

        if policy == ChecksumPolicy::Verify {
            chunk.verify_crc()?;
        }

        Ok((chunk, 8 + needed))
    }
}

/// A chunk with a typed payload
pub trait ChunkKind: Sized {
    const TYPE: ChunkType;

    fn encode_payload(&self, out: &mut Vec<u8>);

    fn decode_payload(data: &[u8]) -> ApngResult<Self>;

    /// Wrap the payload in an envelope with a fresh CRC
    fn to_chunk(&self) -> Chunk {
        let mut data = Vec::new();
        self.encode_payload(&mut data);
        Chunk::new(Self::TYPE, data)
    }

    fn encode(&self) -> Vec<u8> {
        self.to_chunk().encode()
    }

    fn from_chunk(chunk: &Chunk) -> ApngResult<Self> {
        if chunk.chunk_type != Self::TYPE {
            return Err(ApngError::Format(format!(
                "expected {} chunk, found {}",
                chunk_type_name(&Self::TYPE),
                chunk.type_name()
            )));
        }
        Self::decode_payload(&chunk.data)
    }

    fn decode(bytes: &[u8], policy: ChecksumPolicy) -> ApngResult<Self> {
        let (chunk, _) = Chunk::decode(bytes, Some(Self::TYPE), policy)?;
        Self::from_chunk(&chunk)
    }
}

/// A chunk whose encoded size never changes, so it can be rewritten in place
pub trait FixedChunk: ChunkKind {
    const PAYLOAD_LEN: usize;
    const ENCODED_LEN: usize = Self::PAYLOAD_LEN + CHUNK_OVERHEAD;
}

/// Reject a payload whose length differs from the kind's fixed layout
pub(crate) fn expect_payload_len(chunk_type: &ChunkType, data: &[u8], len: usize) -> ApngResult<()> {
    if data.len() != len {
        return Err(ApngError::Format(format!(
            "{} payload must be {len} bytes, got {}",
            chunk_type_name(chunk_type),
            data.len()
        )));
    }
    Ok(())
}
