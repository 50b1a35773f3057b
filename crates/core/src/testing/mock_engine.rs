//! Mock transcoding engine.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::engine::{
    EngineError, EngineEvent, EnginePipeline, EventSink, OutputFormat, PipelineSpec, ProbeReport,
    TranscodeEngine,
};

#[derive(Default)]
struct MockState {
    /// When set, started pipelines complete immediately with this duration.
    instant_duration: Option<f64>,
    started: Vec<PipelineSpec>,
    sinks: Vec<EventSink>,
    probes: HashMap<PathBuf, ProbeReport>,
    fail_probe: HashSet<PathBuf>,
    fail_convert: HashSet<PathBuf>,
    pauses: usize,
    resumes: usize,
    cancels: usize,
}

/// Scriptable in-memory engine.
///
/// In instant mode every started pipeline writes its destination file and
/// completes before `start` returns; in manual mode the test emits events
/// by pipeline index. Cloning shares state, so tests keep one handle while
/// the queue owns the `Arc<dyn TranscodeEngine>`.
#[derive(Clone, Default)]
pub struct MockEngine {
    inner: Arc<Mutex<MockState>>,
}

impl MockEngine {
    /// Pipelines wait for the test to emit events.
    pub fn manual() -> Self {
        Self::default()
    }

    /// Pipelines complete immediately, reporting the given duration.
    pub fn instant(duration_secs: f64) -> Self {
        let engine = Self::default();
        engine.inner.lock().unwrap().instant_duration = Some(duration_secs);
        engine
    }

    /// Sets the probe report for a path.
    pub fn set_probe(&self, path: impl Into<PathBuf>, report: ProbeReport) {
        self.inner.lock().unwrap().probes.insert(path.into(), report);
    }

    /// Makes probing the given path fail.
    pub fn fail_probe(&self, path: impl Into<PathBuf>) {
        self.inner.lock().unwrap().fail_probe.insert(path.into());
    }

    /// Makes converting the given source fail with an engine error event.
    pub fn fail_convert(&self, path: impl Into<PathBuf>) {
        self.inner.lock().unwrap().fail_convert.insert(path.into());
    }

    /// Specs of every pipeline started so far.
    pub fn started(&self) -> Vec<PipelineSpec> {
        self.inner.lock().unwrap().started.clone()
    }

    pub fn start_count(&self) -> usize {
        self.inner.lock().unwrap().started.len()
    }

    pub fn pause_count(&self) -> usize {
        self.inner.lock().unwrap().pauses
    }

    pub fn resume_count(&self) -> usize {
        self.inner.lock().unwrap().resumes
    }

    pub fn cancel_count(&self) -> usize {
        self.inner.lock().unwrap().cancels
    }

    /// Emits one event from the pipeline started `index`-th (manual mode).
    pub fn emit(&self, index: usize, event: EngineEvent) {
        let sink = self.inner.lock().unwrap().sinks[index].clone();
        sink.emit(event);
    }

    /// Completes the pipeline started `index`-th (manual mode).
    pub fn finish(&self, index: usize) {
        self.emit(index, EngineEvent::EndOfStream);
    }
}

#[async_trait]
impl TranscodeEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn validate(&self, _formats: &[OutputFormat]) -> Result<(), EngineError> {
        Ok(())
    }

    async fn probe(&self, path: &Path) -> Result<ProbeReport, EngineError> {
        let (fail, report) = {
            let state = self.inner.lock().unwrap();
            (
                state.fail_probe.contains(path),
                state.probes.get(path).cloned(),
            )
        };

        if fail {
            return Err(EngineError::probe_failed(format!(
                "unreadable: {}",
                path.display()
            )));
        }

        Ok(report.unwrap_or(ProbeReport {
            duration_secs: Some(180.0),
            tags: Default::default(),
            format: "mock".to_string(),
        }))
    }

    async fn start(
        &self,
        spec: PipelineSpec,
        sink: EventSink,
    ) -> Result<Box<dyn EnginePipeline>, EngineError> {
        let (fail, instant) = {
            let mut state = self.inner.lock().unwrap();
            let fail = state.fail_convert.contains(&spec.source);
            state.started.push(spec.clone());
            state.sinks.push(sink.clone());
            (fail, state.instant_duration)
        };

        if fail {
            sink.emit(EngineEvent::Error {
                message: format!("mock conversion failure: {}", spec.source.display()),
            });
        } else {
            // A real pipeline writes the destination; tests exercise the
            // rename path against an actual file.
            tokio::fs::write(&spec.destination, b"mock audio data")
                .await
                .map_err(EngineError::Io)?;

            if let Some(duration) = instant {
                sink.emit(EngineEvent::Duration { seconds: duration });
                sink.emit(EngineEvent::Position { seconds: duration });
                sink.emit(EngineEvent::EndOfStream);
            }
        }

        Ok(Box::new(MockPipeline {
            inner: Arc::clone(&self.inner),
        }))
    }
}

struct MockPipeline {
    inner: Arc<Mutex<MockState>>,
}

#[async_trait]
impl EnginePipeline for MockPipeline {
    async fn pause(&mut self) -> Result<(), EngineError> {
        self.inner.lock().unwrap().pauses += 1;
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), EngineError> {
        self.inner.lock().unwrap().resumes += 1;
        Ok(())
    }

    async fn cancel(&mut self) -> Result<(), EngineError> {
        self.inner.lock().unwrap().cancels += 1;
        Ok(())
    }
}
