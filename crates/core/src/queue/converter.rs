//! Per-file conversion task.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::engine::{
    DecodeRequest, EncodeParams, EngineEvent, EnginePipeline, PipelineSpec, TranscodeEngine,
};
use crate::fsops;
use crate::naming::NameGenerator;
use crate::soundfile::{SoundFile, TagMap};

use super::error::TaskError;
use super::task::{RunOutcome, Task, TaskContext, TaskProgress};

/// What to do when the computed output path already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Append ` (n)` before the extension until a free name is found.
    #[default]
    Increment,
    /// Replace the existing file.
    Overwrite,
    /// Leave the existing file alone and produce no output.
    Skip,
}

/// Frozen per-job configuration.
///
/// Copied at construction time so that configuration edits during a running
/// batch cannot corrupt in-flight jobs.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Encoding parameters for the output.
    pub encode: EncodeParams,
    /// Collision resolution policy.
    pub collision: CollisionPolicy,
    /// Delete the source file after a successful conversion.
    pub delete_original: bool,
}

/// States of one conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertState {
    Idle,
    ResolvingTarget,
    Converting,
    Renaming,
    Skipped,
    Done,
    Error,
}

/// One file's transcode-and-place-on-disk operation.
///
/// Resolves a collision-free output name, writes through a private temp
/// file, and commits the result with a single atomic rename. A failed
/// conversion still completes from the queue's point of view; the error is
/// data on the task.
pub struct ConvertTask {
    engine: Arc<dyn TranscodeEngine>,
    generator: NameGenerator,
    options: ConvertOptions,
    sound_file: SoundFile,
    /// Live tag view: discovery results plus tags the engine reports
    /// mid-stream. The shared `SoundFile` itself is never mutated here.
    tags: TagMap,
    state: ConvertState,
    pipeline: Option<Box<dyn EnginePipeline>>,
    temp_path: Option<PathBuf>,
    target_path: Option<PathBuf>,
    final_path: Option<PathBuf>,
    duration_secs: Option<f64>,
    position_secs: f64,
    error: Option<TaskError>,
}

impl ConvertTask {
    pub fn new(
        sound_file: SoundFile,
        engine: Arc<dyn TranscodeEngine>,
        generator: NameGenerator,
        options: ConvertOptions,
    ) -> Self {
        let tags = sound_file.tags.clone();
        let duration_secs = sound_file.duration_secs;
        Self {
            engine,
            generator,
            options,
            sound_file,
            tags,
            state: ConvertState::Idle,
            pipeline: None,
            temp_path: None,
            target_path: None,
            final_path: None,
            duration_secs,
            position_secs: 0.0,
            error: None,
        }
    }

    /// The source file this task converts.
    pub fn source(&self) -> &SoundFile {
        &self.sound_file
    }

    /// Current state.
    pub fn state(&self) -> ConvertState {
        self.state
    }

    /// Whether the target existed and the skip policy applied.
    pub fn skipped(&self) -> bool {
        self.state == ConvertState::Skipped
    }

    /// The committed output path, once renaming succeeded.
    pub fn final_path(&self) -> Option<&PathBuf> {
        self.final_path.as_ref()
    }

    /// Tags known for this file, including ones discovered mid-stream.
    pub fn tags(&self) -> &TagMap {
        &self.tags
    }

    async fn fail(&mut self, error: TaskError) -> RunOutcome {
        self.cleanup_temp().await;
        warn!(source = %self.sound_file.path.display(), %error, "conversion failed");
        self.error = Some(error);
        self.state = ConvertState::Error;
        RunOutcome::Done
    }

    /// Best-effort temp file removal. The temp file is left in place only
    /// when deletion itself fails, and that is logged.
    async fn cleanup_temp(&mut self) {
        if let Some(temp) = self.temp_path.take() {
            if fsops::exists(&temp).await {
                if let Err(error) = fsops::remove_file(&temp).await {
                    warn!(path = %temp.display(), %error, "leaving temp file behind");
                }
            }
        }
    }

    async fn finalize(&mut self) -> RunOutcome {
        self.pipeline = None;
        self.state = ConvertState::Renaming;

        let (Some(temp), Some(target)) = (self.temp_path.clone(), self.target_path.clone())
        else {
            return self
                .fail(TaskError::Engine {
                    message: "pipeline finished without a resolved target".to_string(),
                })
                .await;
        };

        if self.options.collision == CollisionPolicy::Overwrite && fsops::exists(&target).await {
            if let Err(e) = fsops::remove_file(&target).await {
                return self.fail(e.into()).await;
            }
        }

        // The target may have re-appeared since resolution; increment
        // re-checks at the rename itself.
        let final_path = match self.options.collision {
            CollisionPolicy::Increment => {
                match fsops::rename_with_increment(&temp, &target).await {
                    Ok(path) => path,
                    Err(e) => return self.fail(e.into()).await,
                }
            }
            _ => match fsops::rename(&temp, &target).await {
                Ok(()) => target.clone(),
                Err(e) => return self.fail(e.into()).await,
            },
        };
        self.temp_path = None;

        if let Err(error) = fsops::copy_attributes(&self.sound_file.path, &final_path).await {
            warn!(path = %final_path.display(), %error, "could not copy source attributes");
        }

        if self.options.delete_original {
            if let Err(e) = fsops::remove_file(&self.sound_file.path).await {
                // The output is committed; record the failure without
                // discarding it.
                self.error = Some(e.into());
            }
        }

        info!(
            source = %self.sound_file.path.display(),
            target = %final_path.display(),
            "conversion committed"
        );
        self.final_path = Some(final_path);
        if let Some(duration) = self.duration_secs {
            self.position_secs = duration;
        }
        self.state = ConvertState::Done;
        RunOutcome::Done
    }
}

#[async_trait]
impl Task for ConvertTask {
    fn progress(&self) -> TaskProgress {
        let fraction = match self.state {
            ConvertState::Done | ConvertState::Skipped => 1.0,
            _ => match self.duration_secs {
                Some(duration) if duration > 0.0 => {
                    (self.position_secs / duration).clamp(0.0, 1.0)
                }
                _ => 0.0,
            },
        };
        TaskProgress::new(fraction, self.duration_secs)
    }

    fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    async fn run(&mut self, ctx: TaskContext) -> RunOutcome {
        self.state = ConvertState::ResolvingTarget;

        let target = match self.generator.generate(&self.sound_file).await {
            Ok(target) => target,
            Err(e) => return self.fail(e.into()).await,
        };

        if let Err(e) = fsops::ensure_parent_dirs(&target).await {
            return self.fail(e.into()).await;
        }

        if self.options.collision == CollisionPolicy::Skip && fsops::exists(&target).await {
            info!(
                source = %self.sound_file.path.display(),
                target = %target.display(),
                "target exists, skipping"
            );
            self.state = ConvertState::Skipped;
            return RunOutcome::Done;
        }
        self.target_path = Some(target.clone());

        let temp = match fsops::unique_temp_sibling(&target).await {
            Ok(temp) => temp,
            Err(e) => return self.fail(e.into()).await,
        };
        self.temp_path = Some(temp.clone());

        let spec = PipelineSpec {
            source: self.sound_file.path.clone(),
            decode: DecodeRequest::default(),
            encode: self.options.encode.clone(),
            destination: temp,
        };

        match self.engine.start(spec, ctx.sink()).await {
            Ok(pipeline) => {
                debug!(source = %self.sound_file.path.display(), "pipeline started");
                self.pipeline = Some(pipeline);
                self.state = ConvertState::Converting;
                RunOutcome::Running
            }
            Err(e) => self.fail(TaskError::Start(e)).await,
        }
    }

    async fn dispatch(&mut self, event: EngineEvent) -> RunOutcome {
        match event {
            EngineEvent::TagDiscovered { key, value } => {
                self.tags.insert(key, value);
                RunOutcome::Running
            }
            EngineEvent::Duration { seconds } => {
                if self.duration_secs.is_none() {
                    self.duration_secs = Some(seconds);
                }
                RunOutcome::Running
            }
            EngineEvent::Position { seconds } => {
                // Monotone by contract.
                self.position_secs = self.position_secs.max(seconds);
                RunOutcome::Running
            }
            EngineEvent::Error { message } => {
                self.pipeline = None;
                self.fail(TaskError::Engine { message }).await
            }
            EngineEvent::EndOfStream => self.finalize().await,
        }
    }

    async fn pause(&mut self) {
        if let Some(pipeline) = &mut self.pipeline {
            if let Err(error) = pipeline.pause().await {
                warn!(source = %self.sound_file.path.display(), %error, "pause failed");
            }
        }
    }

    async fn resume(&mut self) {
        if let Some(pipeline) = &mut self.pipeline {
            if let Err(error) = pipeline.resume().await {
                warn!(source = %self.sound_file.path.display(), %error, "resume failed");
            }
        }
    }

    async fn cancel(&mut self) {
        if let Some(mut pipeline) = self.pipeline.take() {
            if let Err(error) = pipeline.cancel().await {
                warn!(source = %self.sound_file.path.display(), %error, "teardown failed");
            }
        }
        self.cleanup_temp().await;
        self.target_path = None;
        self.final_path = None;
        self.position_secs = 0.0;
        self.error = None;
        self.state = ConvertState::Idle;
    }
}
