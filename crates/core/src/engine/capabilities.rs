//! Encoder capability detection.

use std::process::Stdio;
use tokio::process::Command;

use super::config::FfmpegConfig;
use super::types::OutputFormat;

/// Encoders available in the installed engine.
///
/// Detected once at startup so that a missing capability is caught before
/// any job is queued, not mid-run.
#[derive(Debug, Clone, Default)]
pub struct EncoderCaps {
    encoders: String,
}

impl EncoderCaps {
    /// Detect available encoders by probing ffmpeg.
    pub async fn detect(config: &FfmpegConfig) -> Self {
        let output = Command::new(&config.ffmpeg_path)
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await;

        let encoders = match output {
            Ok(o) if o.status.success() => String::from_utf8_lossy(&o.stdout).to_string(),
            _ => String::new(),
        };

        Self { encoders }
    }

    /// Builds capabilities from a raw `-encoders` listing.
    pub fn from_listing(listing: impl Into<String>) -> Self {
        Self {
            encoders: listing.into(),
        }
    }

    /// Whether the given codec name is available.
    pub fn has_codec(&self, codec: &str) -> bool {
        self.encoders.contains(codec)
    }

    /// Whether the engine can encode the given output format.
    pub fn supports(&self, format: OutputFormat) -> bool {
        self.has_codec(format.ffmpeg_codec())
    }
}
