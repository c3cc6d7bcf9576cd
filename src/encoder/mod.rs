//! Turning a raw RGB raster into a baseline single-frame PNG

use ::png::{BitDepth, ColorType, Compression, Encoder};

use crate::{ApngError, ApngResult};

/// Bytes per pixel of the tightly packed rasters the capture loop hands over
pub const RGB_BYTES_PER_PIXEL: usize = 3;

/// Produces a complete, conforming PNG file for one frame.
///
/// The muxer only relies on the output being a valid PNG with the same IHDR
/// for every frame of a given size.
pub trait FrameEncoder {
    fn encode_rgb(&self, width: u32, height: u32, raster: &[u8]) -> ApngResult<Vec<u8>>;
}

/// Check a raster against its declared dimensions before encoding
pub fn validate_raster(width: u32, height: u32, raster: &[u8]) -> ApngResult<()> {
    if width == 0 || height == 0 {
        return Err(ApngError::InvalidInput(format!(
            "frame must be at least 1x1, got {width}x{height}"
        )));
    }

    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(RGB_BYTES_PER_PIXEL))
        .ok_or_else(|| ApngError::InvalidInput(format!("{width}x{height} frame is too large")))?;

    if raster.len() != expected {
        return Err(ApngError::InvalidInput(format!(
            "{width}x{height} RGB frame needs {expected} bytes, got {}",
            raster.len()
        )));
    }
    Ok(())
}

/// `png` crate encoder: 8-bit RGB, non-interlaced
#[derive(Debug, Clone, Copy)]
pub struct PngFrameEncoder {
    compression: Compression,
}

impl PngFrameEncoder {
    pub fn new() -> Self {
        Self { compression: Compression::Default }
    }

    pub fn with_compression(compression: Compression) -> Self {
        Self { compression }
    }
}

impl Default for PngFrameEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameEncoder for PngFrameEncoder {
    fn encode_rgb(&self, width: u32, height: u32, raster: &[u8]) -> ApngResult<Vec<u8>> {
        validate_raster(width, height, raster)?;

        let mut out = Vec::new();
        let mut encoder = Encoder::new(&mut out, width, height);
        encoder.set_color(ColorType::Rgb);
        encoder.set_depth(BitDepth::Eight);
        encoder.set_compression(self.compression);

        let mut writer = encoder.write_header()?;
        writer.write_image_data(raster)?;
        writer.finish()?;

        Ok(out)
    }
}
