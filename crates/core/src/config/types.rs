//! Configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::{EncodeParams, FfmpegConfig, OutputFormat};
use crate::naming::{NamingOptions, TargetFolder};
use crate::queue::{CollisionPolicy, ConvertOptions, QueueConfig};

/// Top-level configuration.
///
/// Loaded once at startup; everything job-relevant is frozen into
/// [`ConvertOptions`] and [`NamingOptions`] snapshots before the queue is
/// built, so nothing reads this live mid-job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Engine backend settings.
    #[serde(default)]
    pub engine: FfmpegConfig,

    /// Output format and placement policy.
    #[serde(default)]
    pub output: OutputSection,

    /// Output naming.
    #[serde(default)]
    pub naming: NamingSection,

    /// Scheduler settings.
    #[serde(default)]
    pub queue: QueueSection,
}

/// The `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    /// Target format.
    #[serde(default = "default_format")]
    pub format: OutputFormat,

    /// Constant bitrate in kbps (lossy formats).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u32>,

    /// VBR quality (0-10 for Vorbis). Wins over bitrate where supported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vbr_quality: Option<f32>,

    /// Output sample rate in Hz; keeps the source rate when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate_hz: Option<u32>,

    /// Output channel count; keeps the source layout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,

    /// Compression level for lossless formats (0-12 for FLAC).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_level: Option<u8>,

    /// What to do when the target file already exists.
    #[serde(default)]
    pub collision: CollisionPolicy,

    /// Delete sources after successful conversion.
    #[serde(default)]
    pub delete_original: bool,
}

fn default_format() -> OutputFormat {
    OutputFormat::OggVorbis
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            format: default_format(),
            bitrate_kbps: None,
            vbr_quality: None,
            sample_rate_hz: None,
            channels: None,
            compression_level: None,
            collision: CollisionPolicy::default(),
            delete_original: false,
        }
    }
}

impl OutputSection {
    /// Builds the encode parameters handed to the engine.
    pub fn encode_params(&self) -> EncodeParams {
        // A VBR-capable format with nothing configured gets a sane default
        // quality rather than an unconstrained encode.
        let vbr_capable = matches!(self.format, OutputFormat::OggVorbis | OutputFormat::Mp3);
        let vbr_quality = self.vbr_quality.or_else(|| {
            (vbr_capable && self.bitrate_kbps.is_none()).then_some(6.0)
        });

        EncodeParams {
            format: self.format,
            bitrate_kbps: self.bitrate_kbps,
            vbr_quality,
            sample_rate_hz: self.sample_rate_hz,
            channels: self.channels,
            compression_level: self.compression_level,
        }
    }

    /// Freezes the per-job conversion snapshot.
    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            encode: self.encode_params(),
            collision: self.collision,
            delete_original: self.delete_original,
        }
    }
}

/// The `[naming]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingSection {
    /// Convert into this folder; next to the source when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub into_folder: Option<PathBuf>,

    /// Pattern for subfolders below the output folder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subfolder_pattern: Option<String>,

    /// Pattern for the output file name, without extension.
    #[serde(default = "default_basename_pattern")]
    pub basename_pattern: String,

    /// Replace characters that tend to break scripts and URLs.
    #[serde(default)]
    pub replace_messy: bool,
}

fn default_basename_pattern() -> String {
    "%(filename)s".to_string()
}

impl Default for NamingSection {
    fn default() -> Self {
        Self {
            into_folder: None,
            subfolder_pattern: None,
            basename_pattern: default_basename_pattern(),
            replace_messy: false,
        }
    }
}

impl NamingSection {
    /// Freezes the naming snapshot for the given output suffix.
    pub fn naming_options(&self, suffix: &str) -> NamingOptions {
        NamingOptions {
            target: match &self.into_folder {
                Some(folder) => TargetFolder::Folder(folder.clone()),
                None => TargetFolder::SameAsSource,
            },
            subfolder_pattern: self.subfolder_pattern.clone(),
            basename_pattern: self.basename_pattern.clone(),
            suffix: suffix.to_string(),
            replace_messy: self.replace_messy,
        }
    }
}

/// The `[queue]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSection {
    /// Maximum number of concurrent conversions.
    #[serde(default = "default_max_jobs")]
    pub max_jobs: usize,
}

fn default_max_jobs() -> usize {
    4
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            max_jobs: default_max_jobs(),
        }
    }
}

impl QueueSection {
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            max_jobs: self.max_jobs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.output.format, OutputFormat::OggVorbis);
        assert_eq!(config.output.collision, CollisionPolicy::Increment);
        assert!(!config.output.delete_original);
        assert_eq!(config.naming.basename_pattern, "%(filename)s");
        assert_eq!(config.queue.max_jobs, 4);
    }

    #[test]
    fn test_encode_params_default_vbr() {
        let section = OutputSection::default();
        let params = section.encode_params();
        assert_eq!(params.vbr_quality, Some(6.0));
        assert_eq!(params.bitrate_kbps, None);
    }

    #[test]
    fn test_encode_params_bitrate_disables_default_vbr() {
        let section = OutputSection {
            bitrate_kbps: Some(192),
            ..Default::default()
        };
        let params = section.encode_params();
        assert_eq!(params.vbr_quality, None);
        assert_eq!(params.bitrate_kbps, Some(192));
    }

    #[test]
    fn test_naming_options_target() {
        let section = NamingSection {
            into_folder: Some(PathBuf::from("/music/out")),
            ..Default::default()
        };
        let options = section.naming_options("ogg");
        assert_eq!(
            options.target,
            TargetFolder::Folder(PathBuf::from("/music/out"))
        );
        assert_eq!(options.suffix, "ogg");
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.queue.max_jobs, config.queue.max_jobs);
    }
}
