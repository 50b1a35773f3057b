//! FFmpeg-based engine implementation.

use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::oneshot;

use crate::soundfile::TagMap;

use super::capabilities::EncoderCaps;
use super::config::FfmpegConfig;
use super::error::EngineError;
use super::traits::{EnginePipeline, EventSink, TranscodeEngine};
use super::types::{EngineEvent, OutputFormat, PipelineSpec, ProbeReport};

/// FFmpeg-based engine implementation.
pub struct FfmpegEngine {
    config: FfmpegConfig,
}

impl FfmpegEngine {
    /// Creates a new FFmpeg engine with the given configuration.
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }

    /// Creates an engine with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(FfmpegConfig::default())
    }

    /// Serializes a pipeline spec into ffmpeg arguments.
    ///
    /// This is the only place where the structured spec meets the engine's
    /// own argument format.
    fn build_args(&self, spec: &PipelineSpec) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(start) = spec.decode.start_secs {
            args.extend(["-ss".to_string(), format!("{start}")]);
        }

        args.extend([
            "-y".to_string(),
            "-nostdin".to_string(),
            "-i".to_string(),
            spec.source.to_string_lossy().to_string(),
        ]);

        // Audio only; cover-art video streams must not leak into the output.
        args.push("-vn".to_string());

        if let Some(stream) = spec.decode.audio_stream {
            args.extend(["-map".to_string(), format!("0:a:{stream}")]);
        }

        let encode = &spec.encode;
        args.extend([
            "-c:a".to_string(),
            encode.format.ffmpeg_codec().to_string(),
        ]);

        if encode.format.is_lossless() {
            if let Some(level) = encode.compression_level {
                args.extend(["-compression_level".to_string(), level.to_string()]);
            }
        } else {
            // VBR quality where the codec has a quality scale, bitrate otherwise.
            let vbr_capable = matches!(encode.format, OutputFormat::OggVorbis | OutputFormat::Mp3);
            match (encode.vbr_quality, encode.bitrate_kbps) {
                (Some(q), _) if vbr_capable => {
                    args.extend(["-q:a".to_string(), format!("{q}")]);
                }
                (_, Some(bitrate)) => {
                    args.extend(["-b:a".to_string(), format!("{bitrate}k")]);
                }
                _ => {}
            }
        }

        if let Some(rate) = encode.sample_rate_hz {
            args.extend(["-ar".to_string(), rate.to_string()]);
        }

        if let Some(channels) = encode.channels {
            args.extend(["-ac".to_string(), channels.to_string()]);
        }

        args.extend(["-loglevel".to_string(), self.config.log_level.clone()]);

        // Machine-readable progress on stderr, interleaved with the log.
        args.extend(["-progress".to_string(), "pipe:2".to_string()]);

        args.extend(self.config.extra_args.iter().cloned());

        args.push(spec.destination.to_string_lossy().to_string());

        args
    }

    /// Parses ffprobe JSON output into a probe report.
    fn parse_probe_output(output: &str) -> Result<ProbeReport, EngineError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            format_name: String,
            duration: Option<String>,
            tags: Option<HashMap<String, String>>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
            duration: Option<String>,
            tags: Option<HashMap<String, String>>,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| EngineError::ParseError {
                reason: format!("failed to parse ffprobe output: {e}"),
            })?;

        let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");

        let duration_secs = probe
            .format
            .duration
            .as_deref()
            .or_else(|| audio_stream.and_then(|s| s.duration.as_deref()))
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| *d > 0.0);

        // Stream tags first (vorbis comments), then format tags (id3) on top.
        let mut tags = TagMap::new();
        if let Some(stream_tags) = audio_stream.and_then(|s| s.tags.as_ref()) {
            for (key, value) in stream_tags {
                normalize_tag(key, value, &mut tags);
            }
        }
        if let Some(format_tags) = probe.format.tags.as_ref() {
            for (key, value) in format_tags {
                normalize_tag(key, value, &mut tags);
            }
        }

        let format = probe
            .format
            .format_name
            .split(',')
            .next()
            .unwrap_or("unknown")
            .to_string();

        Ok(ProbeReport {
            duration_secs,
            tags,
            format,
        })
    }
}

/// Folds one raw container tag into the normalized tag map.
fn normalize_tag(key: &str, value: &str, tags: &mut TagMap) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    let key = key
        .trim()
        .to_ascii_lowercase()
        .replace(['_', ' '], "-");

    match key.as_str() {
        "track" | "tracknumber" | "track-number" => {
            let mut parts = value.splitn(2, '/');
            if let Some(number) = parts.next() {
                tags.insert("track-number".to_string(), number.trim().to_string());
            }
            if let Some(total) = parts.next() {
                tags.insert("track-total".to_string(), total.trim().to_string());
            }
        }
        "tracktotal" | "totaltracks" | "track-total" => {
            tags.insert("track-total".to_string(), value.to_string());
        }
        "disc" | "discnumber" | "disc-number" => {
            let number = value.splitn(2, '/').next().unwrap_or(value).trim();
            tags.insert("disc-number".to_string(), number.to_string());
        }
        "albumartist" | "album-artist" => {
            tags.insert("album-artist".to_string(), value.to_string());
        }
        "date" | "year" => {
            // "2024-03-01" and plain "2024" both reduce to the year.
            let year: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
            if !year.is_empty() {
                tags.insert("year".to_string(), year);
            }
        }
        _ => {
            tags.insert(key, value.to_string());
        }
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn validate(&self, formats: &[OutputFormat]) -> Result<(), EngineError> {
        let ffmpeg_result = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        if let Err(e) = ffmpeg_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(EngineError::FfmpegNotFound {
                    path: self.config.ffmpeg_path.clone(),
                });
            }
            return Err(EngineError::Io(e));
        }

        let ffprobe_result = Command::new(&self.config.ffprobe_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        if let Err(e) = ffprobe_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(EngineError::FfprobeNotFound {
                    path: self.config.ffprobe_path.clone(),
                });
            }
            return Err(EngineError::Io(e));
        }

        let caps = EncoderCaps::detect(&self.config).await;
        for format in formats {
            if !caps.supports(*format) {
                return Err(EngineError::MissingEncoder {
                    format: format!("{format:?}"),
                    codec: format.ffmpeg_codec().to_string(),
                });
            }
        }

        Ok(())
    }

    async fn probe(&self, path: &Path) -> Result<ProbeReport, EngineError> {
        if !path.exists() {
            return Err(EngineError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let output = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::FfprobeNotFound {
                        path: self.config.ffprobe_path.clone(),
                    }
                } else {
                    EngineError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(EngineError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_probe_output(&stdout)
    }

    async fn start(
        &self,
        spec: PipelineSpec,
        sink: EventSink,
    ) -> Result<Box<dyn EnginePipeline>, EngineError> {
        let args = self.build_args(&spec);
        tracing::debug!(source = %spec.source.display(), "starting ffmpeg pipeline");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    EngineError::Io(e)
                }
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::start_failed("stderr not captured"))?;

        let pid = child.id();
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let time_regex = Regex::new(r"out_time_ms=(\d+)").expect("valid regex");
            let duration_regex =
                Regex::new(r"Duration: (\d+):(\d+):(\d+\.?\d*)").expect("valid regex");
            let mut duration_sent = false;
            let mut error_output = String::new();

            loop {
                tokio::select! {
                    _ = &mut cancel_rx => {
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        return;
                    }
                    line = lines.next_line() => {
                        let line = match line {
                            Ok(Some(line)) => line,
                            Ok(None) | Err(_) => break,
                        };

                        if line.contains("Error") || line.contains("error") {
                            error_output.push_str(&line);
                            error_output.push('\n');
                        }

                        if !duration_sent {
                            if let Some(caps) = duration_regex.captures(&line) {
                                let secs = parse_clock(&caps[1], &caps[2], &caps[3]);
                                if let Some(seconds) = secs {
                                    sink.emit(EngineEvent::Duration { seconds });
                                    duration_sent = true;
                                }
                            }
                        }

                        if let Some(caps) = time_regex.captures(&line) {
                            if let Ok(us) = caps[1].parse::<f64>() {
                                // out_time_ms is in microseconds despite the name.
                                sink.emit(EngineEvent::Position {
                                    seconds: us / 1_000_000.0,
                                });
                            }
                        }
                    }
                }
            }

            match child.wait().await {
                Ok(status) if status.success() => sink.emit(EngineEvent::EndOfStream),
                Ok(status) => {
                    let mut message = format!("ffmpeg exited with code {:?}", status.code());
                    if !error_output.is_empty() {
                        message.push_str(": ");
                        message.push_str(error_output.trim());
                    }
                    sink.emit(EngineEvent::Error { message });
                }
                Err(e) => sink.emit(EngineEvent::Error {
                    message: format!("failed to wait for ffmpeg: {e}"),
                }),
            }
        });

        Ok(Box::new(FfmpegPipeline {
            pid,
            cancel_tx: Some(cancel_tx),
        }))
    }
}

/// Control handle for one running ffmpeg process.
struct FfmpegPipeline {
    pid: Option<u32>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

impl FfmpegPipeline {
    #[cfg(unix)]
    fn signal(&self, signal: i32) -> Result<(), EngineError> {
        let Some(pid) = self.pid else {
            return Ok(()); // Already reaped.
        };
        // SAFETY: plain kill(2) on a pid we spawned; no memory is touched.
        let rc = unsafe { libc::kill(pid as i32, signal) };
        if rc == 0 {
            Ok(())
        } else {
            Err(EngineError::Io(std::io::Error::last_os_error()))
        }
    }

    #[cfg(not(unix))]
    fn signal(&self, _signal: i32) -> Result<(), EngineError> {
        tracing::warn!("pipeline suspension is not supported on this platform");
        Ok(())
    }
}

#[async_trait]
impl EnginePipeline for FfmpegPipeline {
    async fn pause(&mut self) -> Result<(), EngineError> {
        #[cfg(unix)]
        return self.signal(libc::SIGSTOP);
        #[cfg(not(unix))]
        self.signal(0)
    }

    async fn resume(&mut self) -> Result<(), EngineError> {
        #[cfg(unix)]
        return self.signal(libc::SIGCONT);
        #[cfg(not(unix))]
        self.signal(0)
    }

    async fn cancel(&mut self) -> Result<(), EngineError> {
        // A stopped process cannot die; wake it first.
        let _ = self.resume().await;
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
        Ok(())
    }
}

/// Parses an `HH:MM:SS.ss` clock into seconds.
fn parse_clock(hours: &str, minutes: &str, seconds: &str) -> Option<f64> {
    let h = hours.parse::<f64>().ok()?;
    let m = minutes.parse::<f64>().ok()?;
    let s = seconds.parse::<f64>().ok()?;
    Some(h * 3600.0 + m * 60.0 + s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{DecodeRequest, EncodeParams};
    use std::path::PathBuf;

    fn spec(encode: EncodeParams) -> PipelineSpec {
        PipelineSpec {
            source: PathBuf::from("/in/song.flac"),
            decode: DecodeRequest::default(),
            encode,
            destination: PathBuf::from("/out/.song.tmp.ogg"),
        }
    }

    #[test]
    fn test_build_args_vorbis_vbr() {
        let engine = FfmpegEngine::with_defaults();
        let args = engine.build_args(&spec(EncodeParams {
            format: OutputFormat::OggVorbis,
            bitrate_kbps: Some(192),
            vbr_quality: Some(6.0),
            sample_rate_hz: None,
            channels: None,
            compression_level: None,
        }));

        assert!(args.contains(&"-c:a".to_string()));
        assert!(args.contains(&"libvorbis".to_string()));
        // VBR quality wins over bitrate for Vorbis.
        assert!(args.contains(&"-q:a".to_string()));
        assert!(args.contains(&"6".to_string()));
        assert!(!args.contains(&"-b:a".to_string()));
        assert!(args.contains(&"-vn".to_string()));
        assert_eq!(args.last().unwrap(), "/out/.song.tmp.ogg");
    }

    #[test]
    fn test_build_args_opus_bitrate() {
        let engine = FfmpegEngine::with_defaults();
        let args = engine.build_args(&spec(EncodeParams {
            format: OutputFormat::Opus,
            bitrate_kbps: Some(128),
            vbr_quality: Some(6.0),
            sample_rate_hz: Some(48000),
            channels: Some(2),
            compression_level: None,
        }));

        // Opus has no -q:a scale here; falls back to bitrate.
        assert!(args.contains(&"libopus".to_string()));
        assert!(args.contains(&"-b:a".to_string()));
        assert!(args.contains(&"128k".to_string()));
        assert!(args.contains(&"-ar".to_string()));
        assert!(args.contains(&"48000".to_string()));
        assert!(args.contains(&"-ac".to_string()));
    }

    #[test]
    fn test_build_args_flac_compression() {
        let engine = FfmpegEngine::with_defaults();
        let args = engine.build_args(&spec(EncodeParams {
            format: OutputFormat::Flac,
            bitrate_kbps: Some(320),
            vbr_quality: None,
            sample_rate_hz: None,
            channels: None,
            compression_level: Some(8),
        }));

        assert!(args.contains(&"flac".to_string()));
        assert!(args.contains(&"-compression_level".to_string()));
        assert!(args.contains(&"8".to_string()));
        // No bitrate for lossless.
        assert!(!args.contains(&"-b:a".to_string()));
    }

    #[test]
    fn test_build_args_stream_selection() {
        let engine = FfmpegEngine::with_defaults();
        let mut s = spec(EncodeParams::default());
        s.decode.audio_stream = Some(1);
        let args = engine.build_args(&s);

        assert!(args.contains(&"-map".to_string()));
        assert!(args.contains(&"0:a:1".to_string()));
    }

    #[test]
    fn test_parse_probe_output_with_tags() {
        let json = r#"{
            "format": {
                "format_name": "flac",
                "duration": "180.5",
                "tags": {
                    "ARTIST": "Foo Bar",
                    "TITLE": "Hi Ho",
                    "track": "1/12",
                    "date": "2024-03-01"
                }
            },
            "streams": [
                {
                    "codec_type": "audio",
                    "codec_name": "flac"
                }
            ]
        }"#;

        let report = FfmpegEngine::parse_probe_output(json).unwrap();
        assert_eq!(report.format, "flac");
        assert!((report.duration_secs.unwrap() - 180.5).abs() < 0.01);
        assert_eq!(report.tags.get("artist").map(String::as_str), Some("Foo Bar"));
        assert_eq!(report.tags.get("title").map(String::as_str), Some("Hi Ho"));
        assert_eq!(report.tags.get("track-number").map(String::as_str), Some("1"));
        assert_eq!(report.tags.get("track-total").map(String::as_str), Some("12"));
        assert_eq!(report.tags.get("year").map(String::as_str), Some("2024"));
    }

    #[test]
    fn test_parse_probe_output_stream_tags() {
        let json = r#"{
            "format": {
                "format_name": "ogg",
                "duration": "10.0"
            },
            "streams": [
                {
                    "codec_type": "audio",
                    "tags": { "ALBUM_ARTIST": "Various" }
                }
            ]
        }"#;

        let report = FfmpegEngine::parse_probe_output(json).unwrap();
        assert_eq!(
            report.tags.get("album-artist").map(String::as_str),
            Some("Various")
        );
    }

    #[test]
    fn test_parse_probe_output_invalid() {
        let result = FfmpegEngine::parse_probe_output("not json");
        assert!(matches!(result, Err(EngineError::ParseError { .. })));
    }

    #[test]
    fn test_parse_clock() {
        assert_eq!(parse_clock("0", "03", "05.5"), Some(185.5));
        assert_eq!(parse_clock("1", "00", "00"), Some(3600.0));
        assert_eq!(parse_clock("x", "00", "00"), None);
    }

    #[test]
    fn test_normalize_tag_ignores_empty_values() {
        let mut tags = TagMap::new();
        normalize_tag("ARTIST", "   ", &mut tags);
        assert!(tags.is_empty());
    }
}
