pub mod config;
pub mod engine;
pub mod fsops;
pub mod naming;
pub mod queue;
pub mod soundfile;
pub mod testing;

pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use engine::{
    EncodeParams, EngineError, EngineEvent, FfmpegConfig, FfmpegEngine, OutputFormat,
    PipelineSpec, ProbeReport, TranscodeEngine,
};
pub use naming::{FilenamePattern, NameGenerator, NamingError, NamingOptions, TargetFolder};
pub use queue::{
    CollisionPolicy, ConvertOptions, ConvertState, ConvertTask, DiscoverTask, QueueConfig, Task,
    TaskError, TaskProgress, TaskQueue,
};
pub use soundfile::{Discovery, SoundFile, TagMap};
