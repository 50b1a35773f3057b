//! Engine boundary for transcoding work.
//!
//! The engine is an opaque collaborator: it accepts a structured
//! [`PipelineSpec`] and reports back through a small event protocol
//! ([`EngineEvent`]) while the real decode/encode work happens in its own
//! processes. The scheduler never blocks on the engine; it consumes the
//! events from its own loop.
//!
//! # Example
//!
//! ```ignore
//! use transonic_core::engine::{FfmpegEngine, TranscodeEngine, PipelineSpec, EncodeParams};
//!
//! let engine = FfmpegEngine::with_defaults();
//!
//! // Catch missing encoders before queueing anything.
//! engine.validate(&[OutputFormat::OggVorbis]).await?;
//!
//! let report = engine.probe(Path::new("/music/in/song.flac")).await?;
//! println!("duration: {:?}", report.duration_secs);
//! ```

mod capabilities;
mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use capabilities::EncoderCaps;
pub use config::FfmpegConfig;
pub use error::EngineError;
pub use ffmpeg::FfmpegEngine;
pub use traits::{AddressedEvent, EnginePipeline, EventSink, TranscodeEngine};
pub use types::{
    DecodeRequest, EncodeParams, EngineEvent, OutputFormat, PipelineSpec, ProbeReport,
};
