//! Command line arguments.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use transonic_core::queue::CollisionPolicy;
use transonic_core::Config;
use transonic_core::OutputFormat;

#[derive(Parser)]
#[command(
    name = "transonic",
    version,
    about = "Convert batches of audio files with an external transcoding engine"
)]
pub struct Args {
    /// Files or directories to convert
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Convert into this folder instead of next to the sources
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,

    /// Constant bitrate in kbps (lossy formats)
    #[arg(short, long)]
    pub bitrate: Option<u32>,

    /// Number of concurrent conversions
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// What to do when the target file already exists
    #[arg(long, value_enum)]
    pub collision: Option<CollisionArg>,

    /// Delete sources after successful conversion
    #[arg(long)]
    pub delete_original: bool,

    /// Output name pattern, e.g. "%(track-number)02d-%(title)s"
    #[arg(long)]
    pub pattern: Option<String>,

    /// Subfolder pattern below the output folder, e.g. "%(artist)s/%(album)s"
    #[arg(long)]
    pub subfolder_pattern: Option<String>,

    /// Replace characters that tend to break scripts and URLs
    #[arg(long)]
    pub replace_messy: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    Flac,
    Mp3,
    Aac,
    OggVorbis,
    Opus,
    Wav,
    Alac,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Flac => OutputFormat::Flac,
            FormatArg::Mp3 => OutputFormat::Mp3,
            FormatArg::Aac => OutputFormat::Aac,
            FormatArg::OggVorbis => OutputFormat::OggVorbis,
            FormatArg::Opus => OutputFormat::Opus,
            FormatArg::Wav => OutputFormat::Wav,
            FormatArg::Alac => OutputFormat::Alac,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CollisionArg {
    Increment,
    Overwrite,
    Skip,
}

impl From<CollisionArg> for CollisionPolicy {
    fn from(arg: CollisionArg) -> Self {
        match arg {
            CollisionArg::Increment => CollisionPolicy::Increment,
            CollisionArg::Overwrite => CollisionPolicy::Overwrite,
            CollisionArg::Skip => CollisionPolicy::Skip,
        }
    }
}

/// Applies command line overrides on top of the loaded configuration.
pub fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(dir) = &args.output_dir {
        config.naming.into_folder = Some(dir.clone());
    }
    if let Some(format) = args.format {
        config.output.format = format.into();
    }
    if let Some(bitrate) = args.bitrate {
        config.output.bitrate_kbps = Some(bitrate);
        config.output.vbr_quality = None;
    }
    if let Some(jobs) = args.jobs {
        config.queue.max_jobs = jobs;
    }
    if let Some(collision) = args.collision {
        config.output.collision = collision.into();
    }
    if args.delete_original {
        config.output.delete_original = true;
    }
    if let Some(pattern) = &args.pattern {
        config.naming.basename_pattern = pattern.clone();
    }
    if let Some(pattern) = &args.subfolder_pattern {
        config.naming.subfolder_pattern = Some(pattern.clone());
    }
    if args.replace_messy {
        config.naming.replace_messy = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply() {
        let args = Args::parse_from([
            "transonic",
            "-o",
            "/music/out",
            "-f",
            "opus",
            "-b",
            "128",
            "-j",
            "8",
            "--collision",
            "skip",
            "--delete-original",
            "in.flac",
        ]);

        let mut config = Config::default();
        apply_overrides(&mut config, &args);

        assert_eq!(
            config.naming.into_folder.as_deref(),
            Some(std::path::Path::new("/music/out"))
        );
        assert_eq!(config.output.format, OutputFormat::Opus);
        assert_eq!(config.output.bitrate_kbps, Some(128));
        assert_eq!(config.output.vbr_quality, None);
        assert_eq!(config.queue.max_jobs, 8);
        assert_eq!(config.output.collision, CollisionPolicy::Skip);
        assert!(config.output.delete_original);
    }

    #[test]
    fn test_defaults_untouched_without_flags() {
        let args = Args::parse_from(["transonic", "in.flac"]);
        let mut config = Config::default();
        apply_overrides(&mut config, &args);

        assert_eq!(config.output.format, OutputFormat::OggVorbis);
        assert_eq!(config.queue.max_jobs, 4);
        assert!(!config.output.delete_original);
    }
}
