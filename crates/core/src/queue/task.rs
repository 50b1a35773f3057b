//! The task contract.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::engine::{AddressedEvent, EngineEvent, EventSink};

use super::error::TaskError;

/// Identifier of a task within one queue.
pub type TaskId = u64;

/// Progress of one task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskProgress {
    /// Completed fraction in [0, 1].
    pub fraction: f64,
    /// Expected duration in seconds, `None` until discovered. Used for
    /// duration-weighted aggregation: conversion time scales with audio
    /// length, not file count.
    pub weight: Option<f64>,
}

impl TaskProgress {
    pub fn new(fraction: f64, weight: Option<f64>) -> Self {
        Self { fraction, weight }
    }
}

/// What a task reports back from `run` or `dispatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The task has asynchronous work in flight; events will follow.
    Running,
    /// The task completed this run cycle (successfully or not).
    Done,
}

/// Per-run handle given to a task when it is started.
///
/// Carries the addressed event sink the task (or its engine pipeline) uses
/// to report back into the queue's loop.
pub struct TaskContext {
    sink: EventSink,
}

impl TaskContext {
    pub(crate) fn new(
        task_id: TaskId,
        epoch: u64,
        tx: mpsc::UnboundedSender<AddressedEvent>,
    ) -> Self {
        Self {
            sink: EventSink::new(task_id, epoch, tx),
        }
    }

    /// The event sink for this run cycle.
    pub fn sink(&self) -> EventSink {
        self.sink.clone()
    }
}

/// One unit of asynchronous, cancelable, pausable work.
///
/// All methods are invoked from the queue's single drive loop; a task's
/// state is never touched from two execution contexts at once. `run` must
/// not block: it starts the work and returns, and everything that happens
/// afterwards arrives as [`EngineEvent`]s through `dispatch`.
#[async_trait]
pub trait Task: Send {
    /// Current progress and expected duration.
    fn progress(&self) -> TaskProgress;

    /// The error recorded on this task, if any.
    fn error(&self) -> Option<&TaskError>;

    /// Starts (or restarts, after a cancel) the task's work from scratch.
    async fn run(&mut self, ctx: TaskContext) -> RunOutcome;

    /// Advances the task's state machine with one event.
    async fn dispatch(&mut self, event: EngineEvent) -> RunOutcome;

    /// Suspends in-flight work without losing position.
    async fn pause(&mut self);

    /// Resumes suspended work.
    async fn resume(&mut self);

    /// Tears down in-flight work and resets to a state from which `run`
    /// can start over. No resumable checkpoint is kept.
    async fn cancel(&mut self);
}
