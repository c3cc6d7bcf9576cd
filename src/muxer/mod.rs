//! Core capture logic: create an APNG from the first frame, then grow it in place

pub mod layout;

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tempfile::{Builder, NamedTempFile};

use crate::chunk::{
    AnimationControl, Bookmark, ChecksumPolicy, ChunkKind, FixedChunk, FrameControl, FrameData,
    ImageEnd, ImageHeader, Signature, COLOR_TYPE_RGB,
};
use crate::encoder::{validate_raster, FrameEncoder, PngFrameEncoder};
use crate::png::{parse_single_image, ParsedImage};
use crate::utils::PNG_SIGNATURE;
use crate::{ApngError, ApngResult};
pub use crate::chunk::FrameDelay;
use layout::{
    read_bookmark, ACTL_OFFSET, BOOKMARK_OFFSET, FIRST_FRAME_OFFSET, IHDR_OFFSET, MIN_CONTAINER_LEN,
};

/// How an existing file is mutated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Durability {
    /// Rewrite acTL, insert the frame before IEND, then rewrite the bookmark,
    /// all in the destination file. A failure part way through can leave acTL
    /// and the bookmark disagreeing.
    #[default]
    InPlace,
    /// Build the new file next to the destination and rename it over it
    Atomic,
}

/// Writer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    pub frame_delay: FrameDelay,
    /// 0 loops forever
    pub play_count: u32,
    /// Applied to the bookmark, acTL and IEND read back from disk
    pub checksums: ChecksumPolicy,
    pub durability: Durability,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            frame_delay: FrameDelay::default(),
            play_count: 0,
            checksums: ChecksumPolicy::Verify,
            durability: Durability::InPlace,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendAction {
    Created,
    Appended,
}

/// What a call did to the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    pub action: AppendAction,
    pub frame_count: u32,
    pub next_sequence: u32,
}

/// Appends frames to APNG files, one call per captured frame
#[derive(Debug, Clone, Default)]
pub struct ApngWriter<E: FrameEncoder = PngFrameEncoder> {
    encoder: E,
    options: WriterOptions,
}

impl ApngWriter<PngFrameEncoder> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E: FrameEncoder> ApngWriter<E> {
    pub fn with_encoder(encoder: E, options: WriterOptions) -> Self {
        Self { encoder, options }
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: WriterOptions) {
        self.options = options;
    }

    /// Encode an RGB raster and add it to the animation at `path`.
    ///
    /// Starts a new file when none exists, or when `delete_existing_first` is
    /// set (the old file is removed first). Otherwise the existing file must
    /// have been written by this writer with the same frame size.
    #[tracing::instrument(level = "debug", skip(self, path, raster), fields(path = %path.display()))]
    pub fn append_frame(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        raster: &[u8],
        delete_existing_first: bool,
    ) -> ApngResult<AppendOutcome> {
        validate_raster(width, height, raster)?;
        let png_bytes = self.encoder.encode_rgb(width, height, raster)?;
        let frame = parse_single_image(&png_bytes, ChecksumPolicy::Verify)?;

        if frame.header.width != width || frame.header.height != height {
            return Err(ApngError::InvalidInput(format!(
                "encoder produced a {}x{} image for a {width}x{height} raster",
                frame.header.width, frame.header.height
            )));
        }

        self.append_parsed(path, &frame, delete_existing_first)
    }

    /// Add an already-encoded frame to the animation at `path`
    pub fn append_parsed(
        &self,
        path: &Path,
        frame: &ParsedImage,
        delete_existing_first: bool,
    ) -> ApngResult<AppendOutcome> {
        ensure_carried(&frame.header)?;

        if delete_existing_first && path.try_exists()? {
            tracing::warn!(path = %path.display(), "deleting existing animation");
            fs::remove_file(path)?;
        }

        let outcome = if path.try_exists()? {
            self.append_existing(path, frame)?
        } else {
            self.create_new(path, frame)?
        };

        tracing::info!(
            path = %path.display(),
            action = ?outcome.action,
            frames = outcome.frame_count,
            next_sequence = outcome.next_sequence,
            "frame written"
        );
        Ok(outcome)
    }

    fn create_new(&self, path: &Path, frame: &ParsedImage) -> ApngResult<AppendOutcome> {
        let bytes = build_container(frame, &self.options);

        match self.options.durability {
            Durability::InPlace => {
                let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
                file.write_all(&bytes)?;
                file.flush()?;
            }
            Durability::Atomic => {
                // OpenOptions applies the umask; NamedTempFile::new_in would leave 0600
                let mut tmp = Builder::new().make_in(parent_dir(path), |tmp_path| {
                    OpenOptions::new().write(true).create_new(true).open(tmp_path)
                })?;
                tmp.write_all(&bytes)?;
                tmp.as_file().sync_all()?;
                tmp.persist(path).map_err(|e| e.error)?;
            }
        }

        Ok(AppendOutcome {
            action: AppendAction::Created,
            frame_count: 1,
            next_sequence: 1,
        })
    }

    fn append_existing(&self, path: &Path, frame: &ParsedImage) -> ApngResult<AppendOutcome> {
        match self.options.durability {
            Durability::InPlace => {
                let mut file = OpenOptions::new().read(true).write(true).open(path)?;
                append_to_container(&mut file, frame, &self.options)
            }
            Durability::Atomic => {
                let mut tmp = NamedTempFile::new_in(parent_dir(path))?;
                {
                    let mut original = File::open(path)?;
                    io::copy(&mut original, tmp.as_file_mut())?;
                }
                let outcome = append_to_container(tmp.as_file_mut(), frame, &self.options)?;
                tmp.as_file().sync_all()?;
                fs::set_permissions(tmp.path(), fs::metadata(path)?.permissions())?;
                tmp.persist(path).map_err(|e| e.error)?;
                Ok(outcome)
            }
        }
    }
}

/// Append one frame to the file at `path` with the default writer.
///
/// This is the whole public surface most callers need: call it once per
/// captured frame, with `delete_existing_first` set on the first frame of a
/// session that must not extend an earlier recording.
pub fn append_frame(
    path: impl AsRef<Path>,
    width: u32,
    height: u32,
    raster: &[u8],
    delete_existing_first: bool,
) -> ApngResult<AppendOutcome> {
    ApngWriter::new().append_frame(path.as_ref(), width, height, raster, delete_existing_first)
}

/// Only 8-bit truecolour frames can be carried: the muxer copies IHDR and the
/// image data, nothing else, so a palette or other auxiliary chunk would be lost.
fn ensure_carried(header: &ImageHeader) -> ApngResult<()> {
    if header.color_type != COLOR_TYPE_RGB || header.bit_depth != 8 {
        return Err(ApngError::InvalidInput(format!(
            "only 8-bit RGB frames can be appended, got colour type {} at depth {}",
            header.color_type, header.bit_depth
        )));
    }
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn log_header(header: &ImageHeader) {
    tracing::debug!(
        width = header.width,
        height = header.height,
        bit_depth = header.bit_depth,
        color_type = header.color_type,
        compression = header.compression_method,
        filter = header.filter_method,
        interlace = header.interlace_method,
        "IHDR"
    );
}

fn log_frame_control(fctl: &FrameControl) {
    tracing::debug!(
        sequence = fctl.sequence_number,
        width = fctl.width,
        height = fctl.height,
        x_offset = fctl.x_offset,
        y_offset = fctl.y_offset,
        delay_num = fctl.delay_num,
        delay_den = fctl.delay_den,
        dispose_op = fctl.dispose_op,
        blend_op = fctl.blend_op,
        "fcTL"
    );
}

/// Lay out a complete single-frame APNG.
///
/// Frame 1's IDAT chunks are written exactly as parsed, so the file's default
/// image is the encoder's own output.
pub fn build_container(frame: &ParsedImage, options: &WriterOptions) -> Vec<u8> {
    let data_len: usize = frame.image_data.iter().map(|chunk| chunk.encoded_len()).sum();
    let mut out = Vec::with_capacity(
        FIRST_FRAME_OFFSET + FrameControl::ENCODED_LEN + data_len + ImageEnd::ENCODED_LEN,
    );

    out.extend_from_slice(&Signature.encode());
    out.extend(frame.header_chunk.encode());
    log_header(&frame.header);

    out.extend(Bookmark { next_sequence: 1 }.encode());
    out.extend(
        AnimationControl {
            num_frames: 1,
            num_plays: options.play_count,
        }
        .encode(),
    );

    let fctl =
        FrameControl::full_frame(0, frame.header.width, frame.header.height, options.frame_delay);
    out.extend(fctl.encode());
    log_frame_control(&fctl);

    for chunk in &frame.image_data {
        out.extend(chunk.encode());
    }
    out.extend(ImageEnd.encode());
    out
}

/// Insert one frame into an existing capture file.
///
/// Every check runs before the first write: signature, IHDR equality with
/// `frame`, bookmark, acTL and the trailing IEND. Then acTL is rewritten with
/// the new frame count, the fcTL and fdAT chunks replace the old IEND (which
/// is re-appended after them) and the bookmark is rewritten with the next
/// free sequence number.
pub fn append_to_container<F: Read + Write + Seek>(
    file: &mut F,
    frame: &ParsedImage,
    options: &WriterOptions,
) -> ApngResult<AppendOutcome> {
    let file_len = file.seek(SeekFrom::End(0))?;

    // a short read leaves zeros, which never match the signature
    let mut prefix = [0u8; FIRST_FRAME_OFFSET];
    let available =
        usize::try_from(file_len).map_or(FIRST_FRAME_OFFSET, |len| len.min(FIRST_FRAME_OFFSET));
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(&mut prefix[..available])?;

    if prefix[..IHDR_OFFSET] != PNG_SIGNATURE {
        return Err(ApngError::SignatureMismatch);
    }
    if file_len < MIN_CONTAINER_LEN as u64 {
        return Err(ApngError::Format(format!(
            "{file_len} bytes is too short for an APNG capture file"
        )));
    }
    if prefix[IHDR_OFFSET..BOOKMARK_OFFSET] != frame.header_bytes()[..] {
        return Err(ApngError::HeaderMismatch);
    }
    let bookmark = read_bookmark(&prefix[BOOKMARK_OFFSET..ACTL_OFFSET], options.checksums)?;
    let actl = AnimationControl::decode(&prefix[ACTL_OFFSET..FIRST_FRAME_OFFSET], options.checksums)?;

    let iend_pos = file_len - ImageEnd::ENCODED_LEN as u64;
    let mut tail = [0u8; ImageEnd::ENCODED_LEN];
    file.seek(SeekFrom::Start(iend_pos))?;
    file.read_exact(&mut tail)?;
    ImageEnd::decode(&tail, options.checksums)?;

    let frame_count = actl
        .num_frames
        .checked_add(1)
        .ok_or_else(|| ApngError::Format("acTL frame count overflow".to_string()))?;
    let final_sequence = u32::try_from(frame.image_data.len() + 1)
        .ok()
        .and_then(|n| bookmark.next_sequence.checked_add(n))
        .ok_or_else(|| ApngError::Format("sequence number overflow".to_string()))?;

    let mut sequence = bookmark.next_sequence;
    let mut block = Vec::new();

    let fctl = FrameControl::full_frame(
        sequence,
        frame.header.width,
        frame.header.height,
        options.frame_delay,
    );
    sequence += 1;
    block.extend(fctl.encode());
    log_frame_control(&fctl);

    for chunk in &frame.image_data {
        block.extend(FrameData::from_image_data(chunk, sequence).encode());
        sequence += 1;
    }
    block.extend(ImageEnd.encode());
    debug_assert_eq!(sequence, final_sequence);

    file.seek(SeekFrom::Start(ACTL_OFFSET as u64))?;
    file.write_all(
        &AnimationControl {
            num_frames: frame_count,
            ..actl
        }
        .encode(),
    )?;

    file.seek(SeekFrom::Start(iend_pos))?;
    file.write_all(&block)?;

    file.seek(SeekFrom::Start(BOOKMARK_OFFSET as u64))?;
    file.write_all(&Bookmark { next_sequence: sequence }.encode())?;
    file.flush()?;

    Ok(AppendOutcome {
        action: AppendAction::Appended,
        frame_count,
        next_sequence: sequence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{Chunk, ImageData, FCTL, IDAT};
    use crate::inspect::{inspect_file, ContainerCheck};
    use crate::png::tests::create_test_png;
    use std::io::Cursor;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn movie_path(dir: &TempDir) -> PathBuf {
        dir.path().join("Movie.png")
    }

    fn raster(width: u32, height: u32, shade: u8) -> Vec<u8> {
        vec![shade; (width * height * 3) as usize]
    }

    /// Always returns the same hand-built PNG, with its IDAT split in three
    struct SplitIdatEncoder;

    impl FrameEncoder for SplitIdatEncoder {
        fn encode_rgb(&self, _width: u32, _height: u32, _raster: &[u8]) -> ApngResult<Vec<u8>> {
            let png = create_test_png();
            let iend_at = png.len() - 12;
            let mut out = png[..iend_at].to_vec();
            out.extend(ImageData { data: vec![0xAA; 5] }.encode());
            out.extend(ImageData { data: vec![0xBB; 7] }.encode());
            out.extend_from_slice(&png[iend_at..]);
            Ok(out)
        }
    }

    #[test]
    fn test_create_black_4x4() {
        let dir = tempfile::tempdir().unwrap();
        let path = movie_path(&dir);

        let outcome = append_frame(&path, 4, 4, &raster(4, 4, 0), false).unwrap();
        assert_eq!(outcome.action, AppendAction::Created);
        assert_eq!(outcome.frame_count, 1);
        assert_eq!(outcome.next_sequence, 1);

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], &PNG_SIGNATURE);

        let header = ImageHeader::decode(&bytes[IHDR_OFFSET..], ChecksumPolicy::Verify).unwrap();
        assert_eq!((header.width, header.height), (4, 4));

        let bookmark = Bookmark::decode(&bytes[BOOKMARK_OFFSET..], ChecksumPolicy::Verify).unwrap();
        assert_eq!(bookmark.next_sequence, 1);

        let actl = AnimationControl::decode(&bytes[ACTL_OFFSET..], ChecksumPolicy::Verify).unwrap();
        assert_eq!(actl, AnimationControl { num_frames: 1, num_plays: 0 });

        let fctl = FrameControl::decode(&bytes[FIRST_FRAME_OFFSET..], ChecksumPolicy::Verify).unwrap();
        assert_eq!(fctl, FrameControl::full_frame(0, 4, 4, FrameDelay::from_millis(40)));

        let (first_data, _) = Chunk::decode(
            &bytes[FIRST_FRAME_OFFSET + FrameControl::ENCODED_LEN..],
            None,
            ChecksumPolicy::Verify,
        )
        .unwrap();
        assert_eq!(first_data.chunk_type, IDAT);
        assert_eq!(&bytes[bytes.len() - 12..], ImageEnd.encode().as_slice());
    }

    #[test]
    fn test_first_frame_is_a_plain_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = movie_path(&dir);
        append_frame(&path, 4, 4, &raster(4, 4, 0x40), false).unwrap();

        let bytes = fs::read(&path).unwrap();
        let as_png = parse_single_image(&bytes, ChecksumPolicy::Verify).unwrap();
        let direct = PngFrameEncoder::new().encode_rgb(4, 4, &raster(4, 4, 0x40)).unwrap();
        let direct = parse_single_image(&direct, ChecksumPolicy::Verify).unwrap();
        assert_eq!(as_png, direct);
    }

    #[test]
    fn test_append_second_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = movie_path(&dir);
        append_frame(&path, 4, 4, &raster(4, 4, 0), false).unwrap();
        let before = fs::read(&path).unwrap();
        let last_allocated = inspect_file(&path, ChecksumPolicy::Verify).unwrap().next_sequence - 1;

        let outcome = append_frame(&path, 4, 4, &raster(4, 4, 0xFF), false).unwrap();
        assert_eq!(outcome.action, AppendAction::Appended);
        assert_eq!(outcome.frame_count, 2);

        let after = fs::read(&path).unwrap();
        assert_eq!(after[IHDR_OFFSET..BOOKMARK_OFFSET], before[IHDR_OFFSET..BOOKMARK_OFFSET]);

        let summary = inspect_file(&path, ChecksumPolicy::Verify).unwrap();
        assert_eq!(summary.animation.num_frames, 2);
        assert_eq!(summary.frames.len(), 2);
        assert_eq!(summary.frames[1].control.sequence_number, last_allocated + 1);
        assert_eq!(summary.next_sequence, outcome.next_sequence);
        assert_eq!(summary.check(), ContainerCheck::Consistent);
    }

    #[test]
    fn test_many_frames_contiguous_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = movie_path(&dir);

        for i in 0..6u8 {
            let outcome = append_frame(&path, 5, 3, &raster(5, 3, i * 40), false).unwrap();
            let summary = inspect_file(&path, ChecksumPolicy::Verify).unwrap();
            assert_eq!(summary.next_sequence, outcome.next_sequence);
            assert_eq!(summary.check(), ContainerCheck::Consistent);
        }

        let summary = inspect_file(&path, ChecksumPolicy::Verify).unwrap();
        assert_eq!(summary.frames.len(), 6);
        assert_eq!(summary.animation.num_frames, 6);

        let mut expected = 0;
        for frame in &summary.frames {
            assert_eq!(frame.control.sequence_number, expected);
            expected += 1;
            for &seq in &frame.frame_data_sequences {
                assert_eq!(seq, expected);
                expected += 1;
            }
        }
        assert_eq!(summary.next_sequence, expected);
    }

    #[test]
    fn test_new_writer_resumes_from_bookmark() {
        let dir = tempfile::tempdir().unwrap();
        let path = movie_path(&dir);
        let options = WriterOptions::default();

        ApngWriter::with_encoder(SplitIdatEncoder, options)
            .append_frame(&path, 1, 1, &[0, 0, 0], false)
            .unwrap();
        let outcome = ApngWriter::with_encoder(SplitIdatEncoder, options)
            .append_frame(&path, 1, 1, &[0, 0, 0], false)
            .unwrap();

        // frame 1: fcTL 0 (+3 IDAT), frame 2: fcTL 1, fdAT 2..=4
        assert_eq!(outcome.next_sequence, 5);
        let summary = inspect_file(&path, ChecksumPolicy::Verify).unwrap();
        assert_eq!(summary.frames[0].image_data_chunks, 3);
        assert_eq!(summary.frames[1].frame_data_sequences, vec![2, 3, 4]);
        assert_eq!(summary.check(), ContainerCheck::Consistent);
    }

    #[test]
    fn test_fdat_payloads_match_idat() {
        let frame = parse_single_image(
            &SplitIdatEncoder.encode_rgb(1, 1, &[0, 0, 0]).unwrap(),
            ChecksumPolicy::Verify,
        )
        .unwrap();
        let mut file = Cursor::new(build_container(&frame, &WriterOptions::default()));
        let first_len = file.get_ref().len();
        append_to_container(&mut file, &frame, &WriterOptions::default()).unwrap();

        let bytes = file.into_inner();
        let mut offset = first_len - 12;
        let (fctl, used) = Chunk::decode(&bytes[offset..], Some(FCTL), ChecksumPolicy::Verify).unwrap();
        assert_eq!(FrameControl::from_chunk(&fctl).unwrap().sequence_number, 1);
        offset += used;

        for (i, idat) in frame.image_data.iter().enumerate() {
            let fdat = FrameData::decode(&bytes[offset..], ChecksumPolicy::Verify).unwrap();
            assert_eq!(fdat.sequence_number, 2 + i as u32);
            assert_eq!(fdat.data, idat.data);
            offset += idat.encoded_len() + 4;
        }
        assert_eq!(&bytes[offset..], ImageEnd.encode().as_slice());
    }

    #[test]
    fn test_corrupted_header_rejected_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = movie_path(&dir);
        append_frame(&path, 4, 4, &raster(4, 4, 0), false).unwrap();
        append_frame(&path, 4, 4, &raster(4, 4, 9), false).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        bytes[IHDR_OFFSET + 8 + 3] ^= 0x01; // width low byte
        fs::write(&path, &bytes).unwrap();

        let result = append_frame(&path, 4, 4, &raster(4, 4, 0), false);
        assert!(matches!(result, Err(ApngError::HeaderMismatch)));

        let after = fs::read(&path).unwrap();
        assert_eq!(after, bytes);
        let actl = AnimationControl::decode(&after[ACTL_OFFSET..], ChecksumPolicy::Verify).unwrap();
        assert_eq!(actl.num_frames, 2);
    }

    #[test]
    fn test_resolution_change_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = movie_path(&dir);
        append_frame(&path, 4, 4, &raster(4, 4, 0), false).unwrap();
        let before = fs::read(&path).unwrap();

        let result = append_frame(&path, 8, 4, &raster(8, 4, 0), false);
        assert!(matches!(result, Err(ApngError::HeaderMismatch)));
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_bad_signature_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = movie_path(&dir);
        append_frame(&path, 2, 2, &raster(2, 2, 0), false).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        bytes[1] = b'Q';
        fs::write(&path, &bytes).unwrap();

        let result = append_frame(&path, 2, 2, &raster(2, 2, 0), false);
        assert!(matches!(result, Err(ApngError::SignatureMismatch)));
        assert_eq!(fs::read(&path).unwrap(), bytes);
    }

    #[test]
    fn test_bad_bookmark_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = movie_path(&dir);
        append_frame(&path, 2, 2, &raster(2, 2, 0), false).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        bytes[BOOKMARK_OFFSET + 8..BOOKMARK_OFFSET + 16].copy_from_slice(b"Software");
        fs::write(&path, &bytes).unwrap();

        let options = WriterOptions {
            checksums: ChecksumPolicy::Ignore,
            ..WriterOptions::default()
        };
        let writer = ApngWriter::with_encoder(PngFrameEncoder::new(), options);
        let result = writer.append_frame(&path, 2, 2, &raster(2, 2, 0), false);
        assert!(matches!(result, Err(ApngError::Bookmark(_))));
        assert_eq!(fs::read(&path).unwrap(), bytes);

        let strict = append_frame(&path, 2, 2, &raster(2, 2, 0), false);
        assert!(matches!(strict, Err(ApngError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_missing_trailing_iend_rejected() {
        let frame = parse_single_image(&create_test_png(), ChecksumPolicy::Verify).unwrap();
        let mut bytes = build_container(&frame, &WriterOptions::default());
        let len = bytes.len();
        bytes[len - 8..len - 4].copy_from_slice(b"IENX");

        let mut file = Cursor::new(bytes.clone());
        let result = append_to_container(&mut file, &frame, &WriterOptions::default());
        assert!(matches!(result, Err(ApngError::Format(_))));
        assert_eq!(file.into_inner(), bytes);
    }

    #[test]
    fn test_too_short_container() {
        let frame = parse_single_image(&create_test_png(), ChecksumPolicy::Verify).unwrap();
        let mut file = Cursor::new(create_test_png());
        let result = append_to_container(&mut file, &frame, &WriterOptions::default());
        assert!(matches!(result, Err(ApngError::Format(_))));
    }

    #[test]
    fn test_short_foreign_file_is_signature_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = movie_path(&dir);

        for contents in [&b"hello"[..], &b""[..]] {
            fs::write(&path, contents).unwrap();
            let result = append_frame(&path, 2, 2, &raster(2, 2, 0), false);
            assert!(matches!(result, Err(ApngError::SignatureMismatch)));
            assert_eq!(fs::read(&path).unwrap(), contents);
        }
    }

    fn indexed_png() -> Vec<u8> {
        let mut out = Vec::new();
        let mut encoder = ::png::Encoder::new(&mut out, 2, 2);
        encoder.set_color(::png::ColorType::Indexed);
        encoder.set_depth(::png::BitDepth::Eight);
        encoder.set_palette(vec![0u8, 0, 0, 255, 255, 255]);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&[0, 1, 1, 0]).unwrap();
        writer.finish().unwrap();
        out
    }

    #[test]
    fn test_palette_frame_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = movie_path(&dir);
        let frame = parse_single_image(&indexed_png(), ChecksumPolicy::Verify).unwrap();
        assert_eq!(frame.header.color_type, 3);

        let result = ApngWriter::new().append_parsed(&path, &frame, false);
        assert!(matches!(result, Err(ApngError::InvalidInput(_))));
        assert!(!path.exists());

        // an existing movie is not deleted for a frame that cannot be carried
        append_frame(&path, 2, 2, &raster(2, 2, 0), false).unwrap();
        let before = fs::read(&path).unwrap();
        let result = ApngWriter::new().append_parsed(&path, &frame, true);
        assert!(matches!(result, Err(ApngError::InvalidInput(_))));
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_delete_existing_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = movie_path(&dir);
        for shade in [0, 1, 2] {
            append_frame(&path, 4, 4, &raster(4, 4, shade), false).unwrap();
        }

        let outcome = append_frame(&path, 4, 4, &raster(4, 4, 3), true).unwrap();
        assert_eq!(outcome.action, AppendAction::Created);

        let summary = inspect_file(&path, ChecksumPolicy::Verify).unwrap();
        assert_eq!(summary.animation.num_frames, 1);
        assert_eq!(summary.frames.len(), 1);
    }

    #[test]
    fn test_delete_allows_new_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let path = movie_path(&dir);
        append_frame(&path, 4, 4, &raster(4, 4, 0), false).unwrap();

        append_frame(&path, 6, 2, &raster(6, 2, 0), true).unwrap();
        let summary = inspect_file(&path, ChecksumPolicy::Verify).unwrap();
        assert_eq!((summary.header.width, summary.header.height), (6, 2));
    }

    #[test]
    fn test_invalid_raster_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = movie_path(&dir);
        let result = append_frame(&path, 4, 4, &[0u8; 10], false);
        assert!(matches!(result, Err(ApngError::InvalidInput(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_atomic_matches_in_place() {
        let in_place_dir = tempfile::tempdir().unwrap();
        let atomic_dir = tempfile::tempdir().unwrap();
        let in_place = ApngWriter::new();
        let atomic = ApngWriter::with_encoder(
            PngFrameEncoder::new(),
            WriterOptions {
                durability: Durability::Atomic,
                ..WriterOptions::default()
            },
        );

        for shade in [10, 20, 30] {
            in_place
                .append_frame(&movie_path(&in_place_dir), 3, 3, &raster(3, 3, shade), false)
                .unwrap();
            atomic
                .append_frame(&movie_path(&atomic_dir), 3, 3, &raster(3, 3, shade), false)
                .unwrap();
        }

        assert_eq!(
            fs::read(movie_path(&in_place_dir)).unwrap(),
            fs::read(movie_path(&atomic_dir)).unwrap()
        );
        // nothing but the movie is left in the directory
        assert_eq!(fs::read_dir(atomic_dir.path()).unwrap().count(), 1);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = |dir: &TempDir| {
                fs::metadata(movie_path(dir)).unwrap().permissions().mode() & 0o777
            };
            assert_eq!(mode(&in_place_dir), mode(&atomic_dir));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_create_is_not_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = movie_path(&dir);
        let atomic = ApngWriter::with_encoder(
            PngFrameEncoder::new(),
            WriterOptions {
                durability: Durability::Atomic,
                ..WriterOptions::default()
            },
        );
        atomic.append_frame(&path, 2, 2, &raster(2, 2, 0), false).unwrap();

        let reference = dir.path().join("reference");
        File::create(&reference).unwrap();
        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&path), mode(&reference));
    }

    #[test]
    fn test_options_flow_into_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = movie_path(&dir);
        let writer = ApngWriter::with_encoder(
            PngFrameEncoder::new(),
            WriterOptions {
                frame_delay: FrameDelay::from_millis(100),
                play_count: 3,
                ..WriterOptions::default()
            },
        );
        writer.append_frame(&path, 2, 2, &raster(2, 2, 0), false).unwrap();
        writer.append_frame(&path, 2, 2, &raster(2, 2, 1), false).unwrap();

        let summary = inspect_file(&path, ChecksumPolicy::Verify).unwrap();
        assert_eq!(summary.animation.num_plays, 3);
        for frame in &summary.frames {
            assert_eq!((frame.control.delay_num, frame.control.delay_den), (100, 1000));
        }
    }
}
