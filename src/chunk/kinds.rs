//! Typed payloads for each chunk kind

use super::{
    expect_payload_len, Chunk, ChunkKind, ChunkType, FixedChunk, ACTL, FCTL, FDAT, IDAT, IEND,
    IHDR, TEXT,
};
use crate::utils::{format_hex_u32, parse_hex_u32, read_u16_be, read_u32_be, PNG_SIGNATURE};
use crate::{ApngError, ApngResult};

/// The 8-byte PNG file signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature;

impl Signature {
    pub const LEN: usize = 8;

    pub fn encode(&self) -> [u8; 8] {
        PNG_SIGNATURE
    }

    pub fn decode(bytes: &[u8]) -> ApngResult<Self> {
        if bytes.len() < Self::LEN {
            return Err(ApngError::Format("too short for PNG signature".to_string()));
        }
        if bytes[..Self::LEN] != PNG_SIGNATURE {
            return Err(ApngError::Format("Invalid PNG signature".to_string()));
        }
        Ok(Signature)
    }
}

/// IHDR colour type of 8-bit-per-channel truecolour without alpha
pub const COLOR_TYPE_RGB: u8 = 2;

/// IHDR payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: u8,
    pub compression_method: u8,
    pub filter_method: u8,
    pub interlace_method: u8,
}

impl ChunkKind for ImageHeader {
    const TYPE: ChunkType = IHDR;

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.width.to_be_bytes());
        out.extend_from_slice(&self.height.to_be_bytes());
        out.extend_from_slice(&[
            self.bit_depth,
            self.color_type,
            self.compression_method,
            self.filter_method,
            self.interlace_method,
        ]);
    }

    fn decode_payload(data: &[u8]) -> ApngResult<Self> {
        expect_payload_len(&Self::TYPE, data, Self::PAYLOAD_LEN)?;
        Ok(Self {
            width: read_u32_be(data, 0),
            height: read_u32_be(data, 4),
            bit_depth: data[8],
            color_type: data[9],
            compression_method: data[10],
            filter_method: data[11],
            interlace_method: data[12],
        })
    }
}

impl FixedChunk for ImageHeader {
    const PAYLOAD_LEN: usize = 13;
}

/// IDAT payload: a slice of the zlib stream, opaque to us
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub data: Vec<u8>,
}

impl ChunkKind for ImageData {
    const TYPE: ChunkType = IDAT;

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.data);
    }

    fn decode_payload(data: &[u8]) -> ApngResult<Self> {
        Ok(Self { data: data.to_vec() })
    }
}

/// IEND, always empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageEnd;

impl ChunkKind for ImageEnd {
    const TYPE: ChunkType = IEND;

    fn encode_payload(&self, _out: &mut Vec<u8>) {}

    fn decode_payload(data: &[u8]) -> ApngResult<Self> {
        expect_payload_len(&Self::TYPE, data, Self::PAYLOAD_LEN)?;
        Ok(ImageEnd)
    }
}

impl FixedChunk for ImageEnd {
    const PAYLOAD_LEN: usize = 0;
}

/// acTL payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationControl {
    pub num_frames: u32,
    /// 0 loops forever
    pub num_plays: u32,
}

impl ChunkKind for AnimationControl {
    const TYPE: ChunkType = ACTL;

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.num_frames.to_be_bytes());
        out.extend_from_slice(&self.num_plays.to_be_bytes());
    }

    fn decode_payload(data: &[u8]) -> ApngResult<Self> {
        expect_payload_len(&Self::TYPE, data, Self::PAYLOAD_LEN)?;
        Ok(Self {
            num_frames: read_u32_be(data, 0),
            num_plays: read_u32_be(data, 4),
        })
    }
}

impl FixedChunk for AnimationControl {
    const PAYLOAD_LEN: usize = 8;
}

/// Frame display time as a fraction of a second
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDelay {
    pub numerator: u16,
    pub denominator: u16,
}

impl FrameDelay {
    /// Delay of `ms` milliseconds
    pub fn from_millis(ms: u16) -> Self {
        Self { numerator: ms, denominator: 1000 }
    }
}

impl Default for FrameDelay {
    fn default() -> Self {
        Self::from_millis(40)
    }
}

/// No disposal before the next frame
pub const DISPOSE_OP_NONE: u8 = 0;
/// Frame replaces the output buffer region
pub const BLEND_OP_SOURCE: u8 = 0;

/// fcTL payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameControl {
    pub sequence_number: u32,
    pub width: u32,
    pub height: u32,
    pub x_offset: u32,
    pub y_offset: u32,
    pub delay_num: u16,
    pub delay_den: u16,
    pub dispose_op: u8,
    pub blend_op: u8,
}

impl FrameControl {
    /// A frame covering the whole canvas with no compositing
    pub fn full_frame(sequence_number: u32, width: u32, height: u32, delay: FrameDelay) -> Self {
        Self {
            sequence_number,
            width,
            height,
            x_offset: 0,
            y_offset: 0,
            delay_num: delay.numerator,
            delay_den: delay.denominator,
            dispose_op: DISPOSE_OP_NONE,
            blend_op: BLEND_OP_SOURCE,
        }
    }
}

impl ChunkKind for FrameControl {
    const TYPE: ChunkType = FCTL;

    fn encode_payload(&self, out: &mut Vec<u8>) {
        for field in [
            self.sequence_number,
            self.width,
            self.height,
            self.x_offset,
            self.y_offset,
        ] {
            out.extend_from_slice(&field.to_be_bytes());
        }
        out.extend_from_slice(&self.delay_num.to_be_bytes());
        out.extend_from_slice(&self.delay_den.to_be_bytes());
        out.push(self.dispose_op);
        out.push(self.blend_op);
    }

    fn decode_payload(data: &[u8]) -> ApngResult<Self> {
        expect_payload_len(&Self::TYPE, data, Self::PAYLOAD_LEN)?;
        Ok(Self {
            sequence_number: read_u32_be(data, 0),
            width: read_u32_be(data, 4),
            height: read_u32_be(data, 8),
            x_offset: read_u32_be(data, 12),
            y_offset: read_u32_be(data, 16),
            delay_num: read_u16_be(data, 20),
            delay_den: read_u16_be(data, 22),
            dispose_op: data[24],
            blend_op: data[25],
        })
    }
}

impl FixedChunk for FrameControl {
    const PAYLOAD_LEN: usize = 26;
}

/// fdAT payload: a sequence number followed by what would have been IDAT data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameData {
    pub sequence_number: u32,
    pub data: Vec<u8>,
}

impl FrameData {
    /// Re-wrap an IDAT chunk for a frame after the first. The payload is kept
    /// byte for byte; the CRC is recomputed when the result is encoded.
    pub fn from_image_data(chunk: &Chunk, sequence_number: u32) -> Self {
        debug_assert_eq!(chunk.chunk_type, IDAT);
        Self {
            sequence_number,
            data: chunk.data.clone(),
        }
    }
}

impl ChunkKind for FrameData {
    const TYPE: ChunkType = FDAT;

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.reserve(4 + self.data.len());
        out.extend_from_slice(&self.sequence_number.to_be_bytes());
        out.extend_from_slice(&self.data);
    }

    fn decode_payload(data: &[u8]) -> ApngResult<Self> {
        if data.len() < 4 {
            return Err(ApngError::Format(format!(
                "fdAT payload must hold a sequence number, got {} bytes",
                data.len()
            )));
        }
        Ok(Self {
            sequence_number: read_u32_be(data, 0),
            data: data[4..].to_vec(),
        })
    }
}

/// `tEXt` chunk holding the next sequence number to allocate as eight hex digits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bookmark {
    pub next_sequence: u32,
}

impl Bookmark {
    pub const KEYWORD: &'static [u8; 8] = b"last_seq";
}

impl ChunkKind for Bookmark {
    const TYPE: ChunkType = TEXT;

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(Self::KEYWORD);
        out.push(0);
        out.extend_from_slice(&format_hex_u32(self.next_sequence));
    }

    fn decode_payload(data: &[u8]) -> ApngResult<Self> {
        if data.len() != Self::PAYLOAD_LEN {
            return Err(ApngError::Bookmark(format!(
                "payload must be {} bytes, got {}",
                Self::PAYLOAD_LEN,
                data.len()
            )));
        }
        if &data[0..8] != Self::KEYWORD || data[8] != 0 {
            return Err(ApngError::Bookmark(format!(
                "keyword is not last_seq: {:?}",
                String::from_utf8_lossy(&data[0..8])
            )));
        }
        let digits: [u8; 8] = [
            data[9], data[10], data[11], data[12], data[13], data[14], data[15], data[16],
        ];
        let next_sequence = parse_hex_u32(&digits).ok_or_else(|| {
            ApngError::Bookmark(format!(
                "counter is not hex: {:?}",
                String::from_utf8_lossy(&digits)
            ))
        })?;
        Ok(Self { next_sequence })
    }

    fn from_chunk(chunk: &Chunk) -> ApngResult<Self> {
        if chunk.chunk_type != Self::TYPE {
            return Err(ApngError::Bookmark(format!(
                "expected tEXt chunk, found {}",
                chunk.type_name()
            )));
        }
        Self::decode_payload(&chunk.data)
    }
}

impl FixedChunk for Bookmark {
    const PAYLOAD_LEN: usize = 17;
}
