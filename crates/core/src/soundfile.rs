//! Source-file model.
//!
//! A [`SoundFile`] identifies one input file together with the metadata the
//! discovery pass has found for it. It is created when a path is first
//! encountered, filled in exactly once by applying a [`Discovery`], and
//! treated as immutable afterward; conversion tasks take their own clone.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Key-value tag mapping (artist, title, album, ...).
///
/// Keys are lowercase with `-` separators, e.g. `track-number`.
pub type TagMap = BTreeMap<String, String>;

/// One input file and everything known about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoundFile {
    /// Absolute path of the source file.
    pub path: PathBuf,
    /// Common ancestor used to reconstruct subfolder structure in the output
    /// tree. `None` for files queued individually.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<PathBuf>,
    /// Discovered tags.
    #[serde(default)]
    pub tags: TagMap,
    /// Duration in seconds, `None` until discovered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    /// Whether the engine could read the file at all.
    pub readable: bool,
}

impl SoundFile {
    /// Creates a sound file for a path queued on its own.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            base: None,
            tags: TagMap::new(),
            duration_secs: None,
            readable: true,
        }
    }

    /// Creates a sound file discovered below a base folder.
    pub fn with_base(path: impl Into<PathBuf>, base: impl Into<PathBuf>) -> Self {
        Self {
            base: Some(base.into()),
            ..Self::new(path)
        }
    }

    /// Source file name without extension.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Directory of the source file relative to the base folder, if any.
    ///
    /// Used to mirror the input tree below the output folder.
    pub fn relative_dir(&self) -> Option<PathBuf> {
        let base = self.base.as_deref()?;
        let parent = self.path.parent()?;
        parent.strip_prefix(base).ok().map(Path::to_path_buf)
    }

    /// Looks up a tag by key.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Merges the result of a discovery pass into this file.
    pub fn apply(&mut self, discovery: Discovery) {
        for (key, value) in discovery.tags {
            self.tags.insert(key, value);
        }
        if discovery.duration_secs.is_some() {
            self.duration_secs = discovery.duration_secs;
        }
        self.readable = discovery.readable;
    }
}

/// What a discovery task found out about one file.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub tags: TagMap,
    pub duration_secs: Option<f64>,
    pub readable: bool,
}
