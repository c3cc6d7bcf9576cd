use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use apng_capture::chunk::ChecksumPolicy;
use apng_capture::cli::{self, RasterSource};
use apng_capture::png::load_png_file;
use apng_capture::{
    inspect_file, ApngWriter, ContainerCheck, Durability, FrameDelay, PngFrameEncoder, WriterOptions,
};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "apng-capture")]
#[command(about = "Grow an animated PNG one frame at a time")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append frames to an animation, creating it if needed
    Append {
        /// Path of the animated PNG to grow
        #[arg(short, long)]
        output: PathBuf,

        /// Frame width in pixels
        #[arg(long, conflicts_with = "png")]
        width: Option<u32>,

        /// Frame height in pixels
        #[arg(long, conflicts_with = "png")]
        height: Option<u32>,

        /// File of packed 8-bit RGB pixels
        #[arg(long, conflicts_with_all = ["fill", "png"])]
        raw: Option<PathBuf>,

        /// Solid colour as RRGGBB
        #[arg(long, conflicts_with = "png")]
        fill: Option<String>,

        /// Existing single-frame PNG to use as the frame
        #[arg(long)]
        png: Option<PathBuf>,

        /// Start a new animation instead of extending an existing one
        #[arg(long)]
        overwrite: bool,

        /// How many copies of the frame to append
        #[arg(short = 'n', long, default_value_t = 1)]
        frames: u32,

        /// Display time of each new frame
        #[arg(long, default_value_t = 40)]
        delay_ms: u16,

        /// Number of times to play the animation, 0 loops forever
        #[arg(long, default_value_t = 0)]
        plays: u32,

        /// Write through a temporary file and rename it into place
        #[arg(long)]
        atomic: bool,

        /// Accept chunks with a bad CRC
        #[arg(long)]
        no_verify_checksums: bool,
    },

    /// Print the frame layout of an animation and check its bookkeeping
    Inspect {
        /// Path of the animated PNG
        #[arg(short, long)]
        input: PathBuf,

        /// List every frame
        #[arg(short, long)]
        verbose: bool,

        /// Accept chunks with a bad CRC
        #[arg(long)]
        no_verify_checksums: bool,
    },
}

fn checksum_policy(no_verify: bool) -> ChecksumPolicy {
    if no_verify {
        ChecksumPolicy::Ignore
    } else {
        ChecksumPolicy::Verify
    }
}

fn main() -> anyhow::Result<()> {
    cli::init_tracing().context("failed to install log subscriber")?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Append {
            output,
            width,
            height,
            raw,
            fill,
            png,
            overwrite,
            frames,
            delay_ms,
            plays,
            atomic,
            no_verify_checksums,
        } => {
            let options = WriterOptions {
                frame_delay: FrameDelay::from_millis(delay_ms),
                play_count: plays,
                checksums: checksum_policy(no_verify_checksums),
                durability: if atomic { Durability::Atomic } else { Durability::InPlace },
            };
            let writer = ApngWriter::with_encoder(PngFrameEncoder::new(), options);

            if frames == 0 {
                bail!("--frames must be at least 1");
            }

            let mut last = None;
            if let Some(png_path) = png {
                let frame = load_png_file(&png_path, options.checksums)
                    .with_context(|| format!("failed to read {}", png_path.display()))?;
                for i in 0..frames {
                    let outcome = writer
                        .append_parsed(&output, &frame, overwrite && i == 0)
                        .with_context(|| format!("failed to append to {}", output.display()))?;
                    last = Some(outcome);
                }
            } else {
                let (Some(width), Some(height)) = (width, height) else {
                    bail!("--width and --height are required unless --png is given");
                };
                let source = match (raw, fill) {
                    (Some(path), None) => RasterSource::Raw(path),
                    (None, Some(color)) => RasterSource::Fill(cli::parse_fill_color(&color)?),
                    _ => bail!("exactly one of --raw, --fill or --png is required"),
                };
                let raster = cli::load_raster(&source, width, height)
                    .context("failed to load frame pixels")?;

                for i in 0..frames {
                    let outcome = writer
                        .append_frame(&output, width, height, &raster, overwrite && i == 0)
                        .with_context(|| format!("failed to append to {}", output.display()))?;
                    last = Some(outcome);
                }
            }

            if let Some(outcome) = last {
                println!(
                    "{}: {} frames, next sequence {}",
                    output.display(),
                    outcome.frame_count,
                    outcome.next_sequence
                );
            }
        }

        Commands::Inspect { input, verbose, no_verify_checksums } => {
            print_summary(&input, verbose, checksum_policy(no_verify_checksums))?;
        }
    }

    Ok(())
}

fn print_summary(input: &Path, verbose: bool, policy: ChecksumPolicy) -> anyhow::Result<()> {
    let summary = inspect_file(input, policy)
        .with_context(|| format!("failed to inspect {}", input.display()))?;

    println!("Animation: {}", input.display());
    println!("  size:      {}x{}", summary.header.width, summary.header.height);
    println!("  frames:    {}", summary.animation.num_frames);
    println!("  plays:     {}", summary.animation.num_plays);
    println!("  duration:  {} ms", summary.duration_ms());
    println!("  next seq:  {}", summary.next_sequence);
    println!("  file size: {} bytes", summary.file_len);

    if verbose {
        for (index, frame) in summary.frames.iter().enumerate() {
            println!(
                "  frame {index:>4} @ {:>8}: seq {:>5}, delay {}/{}, {} IDAT, fdAT {:?}, {} bytes",
                frame.offset,
                frame.control.sequence_number,
                frame.control.delay_num,
                frame.control.delay_den,
                frame.image_data_chunks,
                frame.frame_data_sequences,
                frame.data_bytes
            );
        }
        for name in &summary.other_chunks {
            println!("  other chunk: {name}");
        }
    }

    match summary.check() {
        ContainerCheck::Consistent => println!("[OK] Frame bookkeeping is consistent"),
        ContainerCheck::Inconsistent(problems) => {
            for problem in &problems {
                println!("[ERROR] {problem}");
            }
            bail!("{} problems found in {}", problems.len(), input.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_conflicts_with_dimensions() {
        let result = Cli::try_parse_from([
            "apng-capture", "append", "-o", "movie.png", "--png", "frame.png", "--width", "4",
        ]);
        assert!(result.is_err());

        let result = Cli::try_parse_from([
            "apng-capture", "append", "-o", "movie.png", "--png", "frame.png", "--height", "4",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_png_alone_parses() {
        let cli =
            Cli::try_parse_from(["apng-capture", "append", "-o", "movie.png", "--png", "frame.png"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Append { png: Some(_), width: None, height: None, .. }
        ));
    }
}
