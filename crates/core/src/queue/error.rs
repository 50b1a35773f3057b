//! Error type for queued tasks.

use thiserror::Error;

use crate::engine::EngineError;
use crate::fsops::FsError;
use crate::naming::NamingError;

/// Why a task failed.
///
/// Task errors are data: they never cross the Task/TaskQueue boundary as
/// early returns. A failed task still completes, the caller inspects the
/// done list afterwards, and one bad file never stops a batch.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The engine reported an error event mid-pipeline.
    #[error("engine reported: {message}")]
    Engine { message: String },

    /// The pipeline could not be started at all.
    #[error("failed to start pipeline: {0}")]
    Start(#[source] EngineError),

    /// The output name could not be computed.
    #[error(transparent)]
    Naming(#[from] NamingError),

    /// A filesystem operation failed.
    #[error(transparent)]
    Fs(#[from] FsError),
}
