//! Types for the engine boundary.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::soundfile::TagMap;

/// Output audio format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Free Lossless Audio Codec (lossless)
    Flac,
    /// MPEG Audio Layer III
    Mp3,
    /// Advanced Audio Coding
    Aac,
    /// Ogg Vorbis
    OggVorbis,
    /// Opus (modern, efficient)
    Opus,
    /// WAVE (uncompressed)
    Wav,
    /// Apple Lossless
    Alac,
}

impl OutputFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Flac => "flac",
            Self::Mp3 => "mp3",
            Self::Aac => "m4a",
            Self::OggVorbis => "ogg",
            Self::Opus => "opus",
            Self::Wav => "wav",
            Self::Alac => "m4a",
        }
    }

    /// Returns the ffmpeg codec name for this format.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::Flac => "flac",
            Self::Mp3 => "libmp3lame",
            Self::Aac => "aac",
            Self::OggVorbis => "libvorbis",
            Self::Opus => "libopus",
            Self::Wav => "pcm_s16le",
            Self::Alac => "alac",
        }
    }

    /// Whether this format is lossless.
    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Flac | Self::Wav | Self::Alac)
    }
}

/// Encoding parameters handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeParams {
    /// Target format.
    pub format: OutputFormat,
    /// Target bitrate in kbps (lossy formats, constant bitrate).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u32>,
    /// Variable-bitrate quality (0.0-10.0 for Vorbis). Takes precedence
    /// over `bitrate_kbps` when the codec supports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vbr_quality: Option<f32>,
    /// Target sample rate in Hz.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate_hz: Option<u32>,
    /// Number of channels (1 = mono, 2 = stereo).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    /// Compression level for lossless formats (0-12 for FLAC).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_level: Option<u8>,
}

impl Default for EncodeParams {
    fn default() -> Self {
        Self {
            format: OutputFormat::OggVorbis,
            bitrate_kbps: None,
            vbr_quality: Some(6.0),
            sample_rate_hz: None, // Keep original
            channels: None,       // Keep original
            compression_level: None,
        }
    }
}

/// Decode-side options for a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodeRequest {
    /// Audio stream to select when the container holds several.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_stream: Option<u32>,
    /// Start offset in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_secs: Option<f64>,
}

/// Structured description of one decode+encode pipeline.
///
/// This is the only value crossing the engine boundary; it is serialized to
/// the engine's own argument format inside the backend, never by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Source file.
    pub source: PathBuf,
    /// Decode-side options.
    #[serde(default)]
    pub decode: DecodeRequest,
    /// Encode-side options.
    pub encode: EncodeParams,
    /// Destination file. Always a private temporary path; committing the
    /// result to its final name is the caller's job.
    pub destination: PathBuf,
}

/// Asynchronous event emitted by a running pipeline or a probe.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A tag was discovered in the stream.
    TagDiscovered { key: String, value: String },
    /// Total duration of the source became known.
    Duration { seconds: f64 },
    /// Decode position advanced.
    Position { seconds: f64 },
    /// The pipeline failed. Terminal.
    Error { message: String },
    /// The pipeline drained its input and flushed its output. Terminal.
    EndOfStream,
}

/// Result of probing a media file.
#[derive(Debug, Clone, Default)]
pub struct ProbeReport {
    /// Duration in seconds, if the container reports one.
    pub duration_secs: Option<f64>,
    /// Normalized tags (lowercase keys, `-` separators).
    pub tags: TagMap,
    /// Container format name (e.g. "flac").
    pub format: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_extension() {
        assert_eq!(OutputFormat::Flac.extension(), "flac");
        assert_eq!(OutputFormat::Mp3.extension(), "mp3");
        assert_eq!(OutputFormat::OggVorbis.extension(), "ogg");
        assert_eq!(OutputFormat::Opus.extension(), "opus");
        assert_eq!(OutputFormat::Alac.extension(), "m4a");
    }

    #[test]
    fn test_output_format_codec() {
        assert_eq!(OutputFormat::Flac.ffmpeg_codec(), "flac");
        assert_eq!(OutputFormat::Mp3.ffmpeg_codec(), "libmp3lame");
        assert_eq!(OutputFormat::OggVorbis.ffmpeg_codec(), "libvorbis");
    }

    #[test]
    fn test_output_format_lossless() {
        assert!(OutputFormat::Flac.is_lossless());
        assert!(OutputFormat::Wav.is_lossless());
        assert!(OutputFormat::Alac.is_lossless());
        assert!(!OutputFormat::Mp3.is_lossless());
        assert!(!OutputFormat::OggVorbis.is_lossless());
    }

    #[test]
    fn test_format_serde_names() {
        let json = serde_json::to_string(&OutputFormat::OggVorbis).unwrap();
        assert_eq!(json, "\"ogg_vorbis\"");
        let parsed: OutputFormat = serde_json::from_str("\"opus\"").unwrap();
        assert_eq!(parsed, OutputFormat::Opus);
    }
}
