//! Utility functions shared by the chunk codec, parser and muxer

use byteorder::{BigEndian, ByteOrder};

/// The eight magic bytes every PNG file starts with
pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Read a big-endian u32 from byte slice. The caller checks the bounds.
pub fn read_u32_be(bytes: &[u8], offset: usize) -> u32 {
    BigEndian::read_u32(&bytes[offset..offset + 4])
}

/// Read a big-endian u16 from byte slice. The caller checks the bounds.
pub fn read_u16_be(bytes: &[u8], offset: usize) -> u16 {
    BigEndian::read_u16(&bytes[offset..offset + 2])
}

/// Validate PNG signature
pub fn is_png_signature(data: &[u8]) -> bool {
    data.len() >= 8 && data[0..8] == PNG_SIGNATURE
}

/// Printable name of a chunk type tag
pub fn chunk_type_name(chunk_type: &[u8; 4]) -> String {
    String::from_utf8_lossy(chunk_type).to_string()
}

/// Format a u32 as exactly eight lowercase hex digits
pub fn format_hex_u32(value: u32) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(format!("{value:08x}").as_bytes());
    out
}

/// Parse eight ASCII hex digits (either case) into a u32
pub fn parse_hex_u32(digits: &[u8; 8]) -> Option<u32> {
    if !digits.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let text = std::str::from_utf8(digits).ok()?;
    u32::from_str_radix(text, 16).ok()
}
