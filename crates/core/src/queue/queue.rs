//! Bounded-concurrency task scheduler.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::AddressedEvent;

use super::task::{RunOutcome, Task, TaskContext, TaskId};

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of tasks running at once.
    pub max_jobs: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { max_jobs: 4 }
    }
}

struct Entry<T> {
    id: TaskId,
    /// Incremented on every `run` cycle; events from a torn-down pipeline
    /// of an earlier cycle carry a stale epoch and are dropped.
    epoch: u64,
    task: T,
}

/// A bounded worker pool over pending tasks.
///
/// Every task is in exactly one of pending, running or done at any instant.
/// All state transitions happen inside the caller's drive loop: `run` starts
/// work without blocking and [`TaskQueue::step`] consumes one engine event
/// at a time, so no scheduler state ever needs a lock.
pub struct TaskQueue<T: Task> {
    config: QueueConfig,
    /// Job limit captured at `run()` time, not re-read live.
    slots: usize,
    next_id: TaskId,
    pending: VecDeque<Entry<T>>,
    running: Vec<Entry<T>>,
    done: Vec<Entry<T>>,
    paused: bool,
    started: bool,
    finished: bool,
    started_at: Option<Instant>,
    /// Accumulated known duration of finished tasks.
    finished_weight: f64,
    events_tx: mpsc::UnboundedSender<AddressedEvent>,
    events_rx: mpsc::UnboundedReceiver<AddressedEvent>,
    on_finished: Option<Box<dyn FnOnce() + Send>>,
}

impl<T: Task> TaskQueue<T> {
    /// Creates an empty queue.
    pub fn new(config: QueueConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let slots = config.max_jobs.max(1);
        Self {
            config,
            slots,
            next_id: 0,
            pending: VecDeque::new(),
            running: Vec::new(),
            done: Vec::new(),
            paused: false,
            started: false,
            finished: false,
            started_at: None,
            finished_weight: 0.0,
            events_tx,
            events_rx,
            on_finished: None,
        }
    }

    /// Sets the one-shot callback invoked when the queue finishes.
    pub fn on_finished(&mut self, callback: impl FnOnce() + Send + 'static) {
        self.on_finished = Some(Box::new(callback));
    }

    /// Appends a task to the pending queue.
    ///
    /// While the queue is live (started, not paused, not finished) and a
    /// slot is free, the task starts immediately; a queue that has already
    /// finished holds it in pending until the next `run` call.
    pub async fn add(&mut self, task: T) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.push_back(Entry { id, epoch: 0, task });

        if self.started && !self.paused && !self.finished {
            self.fill_slots().await;
        }
        id
    }

    /// Starts tasks from pending until the job limit is reached.
    ///
    /// Non-blocking: pipelines run in the engine's own processes and report
    /// back through the event channel. Also re-opens a finished or
    /// cancelled queue.
    pub async fn run(&mut self) {
        self.slots = self.config.max_jobs.max(1);
        self.started = true;
        self.finished = false;
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
        self.fill_slots().await;
        self.check_finished();
    }

    /// Suspends every running task. No new tasks start while paused.
    pub async fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        for entry in &mut self.running {
            entry.task.pause().await;
        }
        debug!(running = self.running.len(), "queue paused");
    }

    /// Resumes every running task and refills free slots.
    pub async fn resume(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        for entry in &mut self.running {
            entry.task.resume().await;
        }
        debug!(running = self.running.len(), "queue resumed");
        if self.started && !self.finished {
            self.fill_slots().await;
        }
    }

    /// Cancels every running task and moves it back to pending.
    ///
    /// Cancel does not abandon work: a cancelled task restarts from scratch
    /// on the next `run` call. The running set is empty afterwards and
    /// nothing starts until `run` is called again.
    pub async fn cancel(&mut self) {
        let mut cancelled: Vec<Entry<T>> = self.running.drain(..).collect();
        for entry in &mut cancelled {
            entry.task.cancel().await;
        }
        debug!(cancelled = cancelled.len(), "tasks returned to pending");
        for entry in cancelled {
            self.pending.push_back(entry);
        }
        self.started = false;
    }

    /// Awaits one engine event and dispatches it. Returns the finished flag.
    pub async fn step(&mut self) -> bool {
        if self.finished {
            return true;
        }
        // The queue holds its own sender, so recv() cannot see a closed
        // channel while `self` is alive.
        if let Some(addressed) = self.events_rx.recv().await {
            self.handle_event(addressed).await;
        }
        self.finished
    }

    /// Drives the queue until it finishes. For batch callers.
    pub async fn drive(&mut self) {
        while !self.step().await {}
    }

    /// Overall fraction in [0, 1], counting each task equally.
    pub fn get_progress(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let running: f64 = self
            .running
            .iter()
            .map(|e| e.task.progress().fraction)
            .sum();
        (running + self.done.len() as f64) / total as f64
    }

    /// Duration-weighted overall fraction in [0, 1].
    ///
    /// Tasks are weighted by their expected duration so one long album side
    /// does not read as a single file among many. Tasks whose duration was
    /// never discovered get the mean of the known weights.
    pub fn weighted_progress(&self) -> f64 {
        let (processed, total) = self.weighted_amounts();
        if total <= f64::EPSILON {
            0.0
        } else {
            (processed / total).clamp(0.0, 1.0)
        }
    }

    /// Estimated remaining wall time, once enough progress exists to
    /// extrapolate from.
    pub fn eta(&self) -> Option<Duration> {
        let started_at = self.started_at?;
        let (processed, total) = self.weighted_amounts();
        if processed <= f64::EPSILON {
            return None;
        }
        let elapsed = started_at.elapsed().as_secs_f64();
        if elapsed <= f64::EPSILON {
            return None;
        }
        let speed = processed / elapsed;
        let remaining = (total - processed).max(0.0) / speed;
        Some(Duration::from_secs_f64(remaining))
    }

    /// Number of tasks waiting to start.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of tasks currently running.
    pub fn running_len(&self) -> usize {
        self.running.len()
    }

    /// Number of completed tasks, in completion order.
    pub fn done_len(&self) -> usize {
        self.done.len()
    }

    /// Total number of tasks ever added.
    pub fn total(&self) -> usize {
        self.pending.len() + self.running.len() + self.done.len()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Completed tasks in completion order.
    pub fn done_tasks(&self) -> impl Iterator<Item = &T> {
        self.done.iter().map(|e| &e.task)
    }

    /// Tasks that completed with an error recorded.
    pub fn error_count(&self) -> usize {
        self.done
            .iter()
            .filter(|e| e.task.error().is_some())
            .count()
    }

    async fn fill_slots(&mut self) {
        while !self.paused && self.running.len() < self.slots {
            let Some(mut entry) = self.pending.pop_front() else {
                break;
            };
            entry.epoch += 1;
            let ctx = TaskContext::new(entry.id, entry.epoch, self.events_tx.clone());
            match entry.task.run(ctx).await {
                RunOutcome::Running => {
                    debug!(task = entry.id, "task started");
                    self.running.push(entry);
                }
                RunOutcome::Done => {
                    // Completed synchronously: skipped target or failed start.
                    if let Some(error) = entry.task.error() {
                        warn!(task = entry.id, %error, "task failed to start");
                    }
                    self.record_done(entry);
                }
            }
        }
    }

    async fn handle_event(&mut self, addressed: AddressedEvent) {
        let AddressedEvent {
            task_id,
            epoch,
            event,
        } = addressed;

        let Some(idx) = self
            .running
            .iter()
            .position(|e| e.id == task_id && e.epoch == epoch)
        else {
            // Cancelled or re-run since the event was emitted.
            debug!(task = task_id, "dropping stale event");
            return;
        };

        match self.running[idx].task.dispatch(event).await {
            RunOutcome::Running => {}
            RunOutcome::Done => {
                let entry = self.running.remove(idx);
                match entry.task.error() {
                    Some(error) => warn!(task = entry.id, %error, "task finished with error"),
                    None => debug!(task = entry.id, "task finished"),
                }
                self.record_done(entry);
                self.fill_slots().await;
                self.check_finished();
            }
        }
    }

    fn record_done(&mut self, entry: Entry<T>) {
        if let Some(weight) = entry.task.progress().weight {
            self.finished_weight += weight;
        }
        self.done.push(entry);
    }

    fn check_finished(&mut self) {
        if self.started && !self.finished && self.pending.is_empty() && self.running.is_empty() {
            self.finished = true;
            debug!(done = self.done.len(), "queue finished");
            if let Some(callback) = self.on_finished.take() {
                callback();
            }
        }
    }

    fn weighted_amounts(&self) -> (f64, f64) {
        let entries = || {
            self.pending
                .iter()
                .chain(self.running.iter())
                .chain(self.done.iter())
        };

        let mut known = 0.0;
        let mut known_count = 0usize;
        for entry in entries() {
            if let Some(weight) = entry.task.progress().weight {
                known += weight;
                known_count += 1;
            }
        }
        let fallback = if known_count == 0 {
            1.0
        } else {
            known / known_count as f64
        };

        let total: f64 = entries()
            .map(|e| e.task.progress().weight.unwrap_or(fallback))
            .sum();

        let unknown_done = self
            .done
            .iter()
            .filter(|e| e.task.progress().weight.is_none())
            .count();
        let running: f64 = self
            .running
            .iter()
            .map(|e| {
                let p = e.task.progress();
                p.fraction * p.weight.unwrap_or(fallback)
            })
            .sum();

        let processed = self.finished_weight + unknown_done as f64 * fallback + running;
        (processed, total)
    }
}
