//! Conversion scheduler.
//!
//! A [`TaskQueue`] runs many independent, long-running tasks with a bounded
//! concurrency limit, FIFO start order, pause/resume/cancel across the whole
//! queue, and duration-weighted aggregate progress. Tasks implement the
//! [`Task`] contract: `run` starts work without blocking, and everything
//! that happens afterwards arrives as engine events through `dispatch`,
//! consumed one at a time by the caller's drive loop.
//!
//! # Example
//!
//! ```ignore
//! use transonic_core::queue::{ConvertTask, QueueConfig, TaskQueue};
//!
//! let mut queue = TaskQueue::new(QueueConfig { max_jobs: 4 });
//! for sound_file in files {
//!     let task = ConvertTask::new(sound_file, engine.clone(), generator.clone(), options.clone());
//!     queue.add(task).await;
//! }
//! queue.run().await;
//! queue.drive().await;
//! println!("{} of {} failed", queue.error_count(), queue.total());
//! ```

mod converter;
mod discoverer;
mod error;
#[allow(clippy::module_inception)]
mod queue;
mod task;

pub use converter::{CollisionPolicy, ConvertOptions, ConvertState, ConvertTask};
pub use discoverer::DiscoverTask;
pub use error::TaskError;
pub use queue::{QueueConfig, TaskQueue};
pub use task::{RunOutcome, Task, TaskContext, TaskId, TaskProgress};
