//! Single-frame PNG input: loading and chunk extraction

pub mod parser;

use std::fs;
use std::path::Path;

use crate::chunk::ChecksumPolicy;
use crate::ApngResult;
pub use parser::{parse_single_image, ParsedImage};

/// Load a PNG file from disk and pull out the chunks a frame needs
pub fn load_png_file(path: &Path, policy: ChecksumPolicy) -> ApngResult<ParsedImage> {
    let raw_data = fs::read(path)?;
    parse_single_image(&raw_data, policy)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::chunk::{ChunkKind, ImageData, ImageEnd, ImageHeader};
    use crate::utils::PNG_SIGNATURE;
    use std::io::Write;
    use tempfile::NamedTempFile;

    // Helper to create a minimal 1x1 RGB PNG for testing
    pub(crate) fn create_test_png() -> Vec<u8> {
        let mut png = PNG_SIGNATURE.to_vec();

        png.extend(
            ImageHeader {
                width: 1,
                height: 1,
                bit_depth: 8,
                color_type: 2,
                compression_method: 0,
                filter_method: 0,
                interlace_method: 0,
            }
            .encode(),
        );

        // IDAT chunk with minimal compressed data
        png.extend(
            ImageData {
                data: vec![
                    0x78, 0x9C, 0x63, 0x60, 0x60, 0x60, 0x00, 0x00, 0x00, 0x04, 0x00, 0x01,
                    0xF6, 0x17,
                ],
            }
            .encode(),
        );

        png.extend(ImageEnd.encode());
        png
    }

    #[test]
    fn test_png_file_load() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&create_test_png()).unwrap();

        let parsed = load_png_file(file.path(), ChecksumPolicy::Verify).unwrap();
        assert_eq!(parsed.header.color_type, 2);
        assert_eq!(parsed.image_data_len(), 14);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_png_file(&dir.path().join("absent.png"), ChecksumPolicy::Verify);
        assert!(matches!(result, Err(crate::ApngError::Io(_))));
    }
}
