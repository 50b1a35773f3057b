//! Output name computation.
//!
//! Maps (source metadata, naming snapshot) onto a target path: pattern
//! substitution with defined fallbacks for missing tags, folder placement
//! policy, and an optional messy-character transform that never touches
//! directories already present on disk.

mod generator;
mod pattern;

use thiserror::Error;

pub use generator::{NameGenerator, NamingOptions, TargetFolder};
pub use pattern::FilenamePattern;

/// Errors from pattern parsing.
#[derive(Debug, Error)]
pub enum NamingError {
    /// A pattern referenced a key the generator does not know.
    #[error("unknown pattern key: {key}")]
    UnknownKey { key: String },

    /// A pattern could not be parsed.
    #[error("malformed pattern: {reason}")]
    Malformed { reason: String },
}
