//! Tag and duration discovery task.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::engine::{EngineEvent, TranscodeEngine};
use crate::soundfile::{Discovery, TagMap};

use super::error::TaskError;
use super::task::{RunOutcome, Task, TaskContext, TaskProgress};

/// Probes one file for tags and duration.
///
/// Discovery results are not written into the shared `SoundFile` from here;
/// the owner collects the [`Discovery`] from the done list and applies it
/// before building conversion tasks.
pub struct DiscoverTask {
    engine: Arc<dyn TranscodeEngine>,
    path: PathBuf,
    tags: TagMap,
    duration_secs: Option<f64>,
    readable: bool,
    done: bool,
    error: Option<TaskError>,
}

impl DiscoverTask {
    pub fn new(engine: Arc<dyn TranscodeEngine>, path: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            path: path.into(),
            tags: TagMap::new(),
            duration_secs: None,
            readable: false,
            done: false,
            error: None,
        }
    }

    /// The probed path.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// What was discovered. Meaningful once the task is done.
    pub fn discovery(&self) -> Discovery {
        Discovery {
            tags: self.tags.clone(),
            duration_secs: self.duration_secs,
            readable: self.readable,
        }
    }
}

#[async_trait]
impl Task for DiscoverTask {
    fn progress(&self) -> TaskProgress {
        TaskProgress::new(if self.done { 1.0 } else { 0.0 }, None)
    }

    fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    async fn run(&mut self, ctx: TaskContext) -> RunOutcome {
        let engine = Arc::clone(&self.engine);
        let path = self.path.clone();
        let sink = ctx.sink();

        // The probe runs outside the drive loop and reports back through
        // the same event protocol the pipelines use.
        tokio::spawn(async move {
            match engine.probe(&path).await {
                Ok(report) => {
                    if let Some(seconds) = report.duration_secs {
                        sink.emit(EngineEvent::Duration { seconds });
                    }
                    for (key, value) in report.tags {
                        sink.emit(EngineEvent::TagDiscovered { key, value });
                    }
                    sink.emit(EngineEvent::EndOfStream);
                }
                Err(e) => sink.emit(EngineEvent::Error {
                    message: e.to_string(),
                }),
            }
        });

        RunOutcome::Running
    }

    async fn dispatch(&mut self, event: EngineEvent) -> RunOutcome {
        match event {
            EngineEvent::TagDiscovered { key, value } => {
                self.tags.insert(key, value);
                RunOutcome::Running
            }
            EngineEvent::Duration { seconds } => {
                self.duration_secs = Some(seconds);
                RunOutcome::Running
            }
            EngineEvent::Position { .. } => RunOutcome::Running,
            EngineEvent::Error { message } => {
                debug!(path = %self.path.display(), %message, "file not readable");
                self.readable = false;
                self.error = Some(TaskError::Engine { message });
                self.done = true;
                RunOutcome::Done
            }
            EngineEvent::EndOfStream => {
                self.readable = true;
                self.done = true;
                RunOutcome::Done
            }
        }
    }

    async fn pause(&mut self) {
        // Probes are short; nothing to suspend.
    }

    async fn resume(&mut self) {}

    async fn cancel(&mut self) {
        self.tags.clear();
        self.duration_secs = None;
        self.readable = false;
        self.done = false;
        self.error = None;
    }
}
