//! Testing utilities and mock implementations.
//!
//! Mock implementations of the engine boundary and a scriptable task,
//! allowing full conversions and scheduler scenarios to run in tests
//! without a real ffmpeg installation.
//!
//! # Example
//!
//! ```rust,ignore
//! use transonic_core::testing::MockEngine;
//!
//! let engine = MockEngine::instant(180.0);
//! let shared: Arc<dyn TranscodeEngine> = Arc::new(engine.clone());
//!
//! // ... build ConvertTasks against `shared`, then:
//! assert_eq!(engine.start_count(), 5);
//! ```

mod mock_engine;
mod scripted_task;

pub use mock_engine::MockEngine;
pub use scripted_task::{ScriptedHandle, ScriptedTask};
