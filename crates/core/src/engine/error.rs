//! Error types for the engine boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur talking to the transcoding engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// FFmpeg binary not found.
    #[error("ffmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// FFprobe binary not found.
    #[error("ffprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    /// Input file not found.
    #[error("input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// The installed engine lacks an encoder for the requested format.
    #[error("no encoder for {format} (codec {codec}) in the installed engine")]
    MissingEncoder { format: String, codec: String },

    /// Failed to launch a pipeline.
    #[error("failed to start pipeline: {reason}")]
    StartFailed { reason: String },

    /// Failed to probe a media file.
    #[error("failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    /// Failed to parse probe output.
    #[error("failed to parse media info: {reason}")]
    ParseError { reason: String },

    /// I/O error at the engine boundary.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Creates a new start-failed error.
    pub fn start_failed(reason: impl Into<String>) -> Self {
        Self::StartFailed {
            reason: reason.into(),
        }
    }

    /// Creates a new probe-failed error.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }
}
