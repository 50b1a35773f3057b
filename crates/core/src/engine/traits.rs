//! Trait definitions for the engine boundary.

use async_trait::async_trait;
use std::path::Path;
use tokio::sync::mpsc;

use super::error::EngineError;
use super::types::{EngineEvent, OutputFormat, PipelineSpec, ProbeReport};

/// An engine event addressed to the task whose pipeline produced it.
#[derive(Debug)]
pub struct AddressedEvent {
    pub task_id: u64,
    pub epoch: u64,
    pub event: EngineEvent,
}

/// Handle a pipeline uses to report events back to the scheduler.
///
/// Sends are fire-and-forget: once the receiving queue is gone the events
/// are simply dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    task_id: u64,
    epoch: u64,
    tx: mpsc::UnboundedSender<AddressedEvent>,
}

impl EventSink {
    pub fn new(task_id: u64, epoch: u64, tx: mpsc::UnboundedSender<AddressedEvent>) -> Self {
        Self { task_id, epoch, tx }
    }

    /// Emits one event into the scheduler's event channel.
    pub fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(AddressedEvent {
            task_id: self.task_id,
            epoch: self.epoch,
            event,
        });
    }
}

/// An external engine that can probe and transcode audio files.
///
/// The engine performs real decode/encode work in its own processes; it
/// communicates back only through the [`EventSink`] handed to
/// [`TranscodeEngine::start`].
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// Validates that the engine is installed and can encode all of the
    /// given formats. Must be called before any job is queued so that a
    /// missing capability aborts the run up front.
    async fn validate(&self, formats: &[OutputFormat]) -> Result<(), EngineError>;

    /// Probes a media file for duration and tags.
    async fn probe(&self, path: &Path) -> Result<ProbeReport, EngineError>;

    /// Starts a decode+encode pipeline.
    ///
    /// Returns immediately with a control handle; progress, errors and
    /// completion arrive asynchronously through `sink`.
    async fn start(
        &self,
        spec: PipelineSpec,
        sink: EventSink,
    ) -> Result<Box<dyn EnginePipeline>, EngineError>;
}

/// Control handle for one running pipeline.
#[async_trait]
pub trait EnginePipeline: Send {
    /// Suspends the pipeline without losing position.
    async fn pause(&mut self) -> Result<(), EngineError>;

    /// Resumes a suspended pipeline.
    async fn resume(&mut self) -> Result<(), EngineError>;

    /// Tears the pipeline down. The partial destination file is left in
    /// place; deleting it is the caller's job. Teardown completes
    /// asynchronously within a bounded grace period.
    async fn cancel(&mut self) -> Result<(), EngineError>;
}
