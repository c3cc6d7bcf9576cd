//! Helpers behind the `apng-capture` command line: raster loading and logging setup

use std::fs;
use std::path::PathBuf;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

use crate::encoder::{validate_raster, RGB_BYTES_PER_PIXEL};
use crate::utils::parse_hex_u32;
use crate::{ApngError, ApngResult};

/// Where the pixels of a frame come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RasterSource {
    /// Tightly packed 8-bit RGB bytes read from a file
    Raw(PathBuf),
    /// A single colour over the whole frame
    Fill([u8; 3]),
}

/// Parse an `RRGGBB` colour, with or without a leading `#`
pub fn parse_fill_color(text: &str) -> ApngResult<[u8; 3]> {
    let digits = text.strip_prefix('#').unwrap_or(text);
    let invalid = || ApngError::InvalidInput(format!("fill colour must be RRGGBB, got {text:?}"));

    if digits.len() != 6 {
        return Err(invalid());
    }

    let mut padded = *b"00000000";
    padded[2..].copy_from_slice(digits.as_bytes());
    let value = parse_hex_u32(&padded).ok_or_else(invalid)?;
    let [_, r, g, b] = value.to_be_bytes();
    Ok([r, g, b])
}

/// Produce the raster for one frame, checked against the frame size
pub fn load_raster(source: &RasterSource, width: u32, height: u32) -> ApngResult<Vec<u8>> {
    let raster = match source {
        RasterSource::Raw(path) => fs::read(path)?,
        RasterSource::Fill(rgb) => {
            let pixels = (width as usize)
                .checked_mul(height as usize)
                .filter(|p| p.checked_mul(RGB_BYTES_PER_PIXEL).is_some())
                .ok_or_else(|| {
                    ApngError::InvalidInput(format!("{width}x{height} frame is too large"))
                })?;
            rgb.repeat(pixels)
        }
    };

    validate_raster(width, height, &raster)?;
    Ok(raster)
}

/// Install a formatting subscriber on stderr, filtered by `RUST_LOG` (default `warn`)
pub fn init_tracing() -> Result<(), TryInitError> {
    let log_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(log_filter)
        .try_init()
}
