//! Externally-driven task for scheduler tests.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::engine::{EngineEvent, EventSink};
use crate::queue::{RunOutcome, Task, TaskContext, TaskError, TaskProgress};

#[derive(Default)]
struct ScriptedState {
    sink: Option<EventSink>,
    runs: usize,
    pauses: usize,
    resumes: usize,
    cancels: usize,
}

/// A task whose lifecycle is driven entirely by its [`ScriptedHandle`].
///
/// `run` does nothing but register the event sink; the test then feeds
/// position/duration/finish/fail events through the handle and observes the
/// queue's behavior.
pub struct ScriptedTask {
    shared: Arc<Mutex<ScriptedState>>,
    fraction: f64,
    weight: Option<f64>,
    error: Option<TaskError>,
}

impl ScriptedTask {
    pub fn new() -> (Self, ScriptedHandle) {
        let shared = Arc::new(Mutex::new(ScriptedState::default()));
        let task = Self {
            shared: Arc::clone(&shared),
            fraction: 0.0,
            weight: None,
            error: None,
        };
        (task, ScriptedHandle { shared })
    }

    /// Creates a task with a fixed expected duration.
    pub fn with_weight(weight: f64) -> (Self, ScriptedHandle) {
        let (mut task, handle) = Self::new();
        task.weight = Some(weight);
        (task, handle)
    }
}

#[async_trait]
impl Task for ScriptedTask {
    fn progress(&self) -> TaskProgress {
        TaskProgress::new(self.fraction, self.weight)
    }

    fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    async fn run(&mut self, ctx: TaskContext) -> RunOutcome {
        self.fraction = 0.0;
        self.error = None;
        let mut state = self.shared.lock().unwrap();
        state.sink = Some(ctx.sink());
        state.runs += 1;
        RunOutcome::Running
    }

    async fn dispatch(&mut self, event: EngineEvent) -> RunOutcome {
        match event {
            EngineEvent::Position { seconds } => {
                // Seconds double as the completed fraction here.
                self.fraction = seconds.clamp(0.0, 1.0);
                RunOutcome::Running
            }
            EngineEvent::Duration { seconds } => {
                self.weight = Some(seconds);
                RunOutcome::Running
            }
            EngineEvent::TagDiscovered { .. } => RunOutcome::Running,
            EngineEvent::Error { message } => {
                self.error = Some(TaskError::Engine { message });
                RunOutcome::Done
            }
            EngineEvent::EndOfStream => {
                self.fraction = 1.0;
                RunOutcome::Done
            }
        }
    }

    async fn pause(&mut self) {
        self.shared.lock().unwrap().pauses += 1;
    }

    async fn resume(&mut self) {
        self.shared.lock().unwrap().resumes += 1;
    }

    async fn cancel(&mut self) {
        self.fraction = 0.0;
        let mut state = self.shared.lock().unwrap();
        state.cancels += 1;
        state.sink = None;
    }
}

/// Test-side handle for one [`ScriptedTask`].
#[derive(Clone)]
pub struct ScriptedHandle {
    shared: Arc<Mutex<ScriptedState>>,
}

impl ScriptedHandle {
    fn emit(&self, event: EngineEvent) {
        let sink = self.shared.lock().unwrap().sink.clone();
        if let Some(sink) = sink {
            sink.emit(event);
        }
    }

    /// Advances the task to the given fraction.
    pub fn set_progress(&self, fraction: f64) {
        self.emit(EngineEvent::Position { seconds: fraction });
    }

    /// Reports the task's expected duration.
    pub fn set_weight(&self, seconds: f64) {
        self.emit(EngineEvent::Duration { seconds });
    }

    /// Completes the task successfully.
    pub fn finish(&self) {
        self.emit(EngineEvent::EndOfStream);
    }

    /// Fails the task.
    pub fn fail(&self, message: impl Into<String>) {
        self.emit(EngineEvent::Error {
            message: message.into(),
        });
    }

    /// How many times the task was started.
    pub fn runs(&self) -> usize {
        self.shared.lock().unwrap().runs
    }

    pub fn pauses(&self) -> usize {
        self.shared.lock().unwrap().pauses
    }

    pub fn resumes(&self) -> usize {
        self.shared.lock().unwrap().resumes
    }

    pub fn cancels(&self) -> usize {
        self.shared.lock().unwrap().cancels
    }

    /// Whether the task currently holds a live event sink.
    pub fn is_running(&self) -> bool {
        self.shared.lock().unwrap().sink.is_some()
    }
}
