//! Target path computation.

use std::path::{Component, Path, PathBuf};

use crate::fsops;
use crate::soundfile::SoundFile;

use super::pattern::FilenamePattern;
use super::NamingError;

/// Where converted files go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetFolder {
    /// Next to the source file.
    SameAsSource,
    /// Into a chosen folder.
    Folder(PathBuf),
}

/// Naming configuration snapshot.
///
/// Captured once when the queue is built; later configuration edits cannot
/// affect jobs already in flight.
#[derive(Debug, Clone)]
pub struct NamingOptions {
    /// Folder placement policy.
    pub target: TargetFolder,
    /// Pattern for subfolders below the target folder. When unset, the
    /// source tree below the base folder is mirrored instead.
    pub subfolder_pattern: Option<String>,
    /// Pattern for the file name without extension.
    pub basename_pattern: String,
    /// Extension of the output format, without the dot.
    pub suffix: String,
    /// Replace characters that tend to break scripts and URLs.
    pub replace_messy: bool,
}

impl Default for NamingOptions {
    fn default() -> Self {
        Self {
            target: TargetFolder::SameAsSource,
            subfolder_pattern: None,
            basename_pattern: "%(filename)s".to_string(),
            suffix: "ogg".to_string(),
            replace_messy: false,
        }
    }
}

/// Computes the output path for a sound file.
///
/// Pure apart from filesystem existence checks: the same file, options and
/// filesystem state always produce the same path (time-dependent patterns
/// excepted).
#[derive(Debug, Clone)]
pub struct NameGenerator {
    options: NamingOptions,
    basename: FilenamePattern,
    subfolder: Option<FilenamePattern>,
}

impl NameGenerator {
    /// Parses the patterns out of a naming snapshot.
    pub fn new(options: NamingOptions) -> Result<Self, NamingError> {
        let basename = FilenamePattern::parse(&options.basename_pattern)?;
        let subfolder = options
            .subfolder_pattern
            .as_deref()
            .map(FilenamePattern::parse)
            .transpose()?;

        Ok(Self {
            options,
            basename,
            subfolder,
        })
    }

    /// Computes the target path for one sound file.
    pub async fn generate(&self, sound_file: &SoundFile) -> Result<PathBuf, NamingError> {
        let parent = match &self.options.target {
            TargetFolder::SameAsSource => sound_file
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
            TargetFolder::Folder(folder) => match &self.subfolder {
                Some(pattern) => folder.join(pattern.render(sound_file)),
                None => match sound_file.relative_dir() {
                    Some(rel) => folder.join(rel),
                    None => folder.clone(),
                },
            },
        };

        let file_name = format!("{}.{}", self.basename.render(sound_file), self.options.suffix);
        let full = parent.join(file_name);

        if self.options.replace_messy {
            Ok(scrub_below_existing(&full).await)
        } else {
            Ok(full)
        }
    }
}

/// Applies the messy-character transform to every path component below the
/// deepest ancestor that already exists on disk.
///
/// An existing directory is never re-escaped; doing so would split the same
/// logical location into mismatched duplicate folders.
async fn scrub_below_existing(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    let mut prefix_exists = true;

    for component in path.components() {
        match component {
            Component::Normal(name) => {
                let name = name.to_string_lossy();
                let kept = out.join(name.as_ref());
                if prefix_exists && fsops::exists(&kept).await {
                    out = kept;
                } else {
                    prefix_exists = false;
                    out.push(scrub_component(&name));
                }
            }
            other => out.push(other.as_os_str()),
        }
    }

    out
}

/// Maps one path component onto safe characters.
fn scrub_component(component: &str) -> String {
    component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tagged_file(path: &str) -> SoundFile {
        let mut sf = SoundFile::new(path);
        sf.tags.insert("artist".to_string(), "Foo Bar".to_string());
        sf.tags.insert("title".to_string(), "Hi Ho".to_string());
        sf.tags.insert("track-number".to_string(), "1".to_string());
        sf
    }

    #[tokio::test]
    async fn test_same_folder_as_source() {
        let generator = NameGenerator::new(NamingOptions {
            basename_pattern: "%(title)s".to_string(),
            suffix: "ogg".to_string(),
            ..Default::default()
        })
        .unwrap();

        let path = generator
            .generate(&tagged_file("/in/deep/song.flac"))
            .await
            .unwrap();
        assert_eq!(path, PathBuf::from("/in/deep/Hi Ho.ogg"));
    }

    #[tokio::test]
    async fn test_target_folder_with_subfolder_pattern() {
        let generator = NameGenerator::new(NamingOptions {
            target: TargetFolder::Folder(PathBuf::from("/music/out")),
            subfolder_pattern: Some("%(artist)s/%(album)s".to_string()),
            basename_pattern: "%(title)s".to_string(),
            suffix: "ogg".to_string(),
            replace_messy: false,
        })
        .unwrap();

        let path = generator
            .generate(&tagged_file("/in/song.flac"))
            .await
            .unwrap();
        assert_eq!(
            path,
            PathBuf::from("/music/out/Foo Bar/Unknown Album/Hi Ho.ogg")
        );
    }

    #[tokio::test]
    async fn test_target_folder_mirrors_base_subpath() {
        let generator = NameGenerator::new(NamingOptions {
            target: TargetFolder::Folder(PathBuf::from("/out")),
            basename_pattern: "%(filename)s".to_string(),
            suffix: "mp3".to_string(),
            ..Default::default()
        })
        .unwrap();

        let sf = SoundFile::with_base("/in/Artist/Album/01.flac", "/in");
        let path = generator.generate(&sf).await.unwrap();
        assert_eq!(path, PathBuf::from("/out/Artist/Album/01.mp3"));
    }

    #[tokio::test]
    async fn test_messy_replacement_spares_existing_dirs() {
        let temp = TempDir::new().unwrap();
        // The existing root contains characters the scrubber would eat.
        let root = temp.path().join("my music");
        tokio::fs::create_dir(&root).await.unwrap();

        let generator = NameGenerator::new(NamingOptions {
            target: TargetFolder::Folder(root.clone()),
            subfolder_pattern: Some("%(artist)s".to_string()),
            basename_pattern: "%(track-number)02d-%(title)s".to_string(),
            suffix: "ogg".to_string(),
            replace_messy: true,
        })
        .unwrap();

        let path = generator
            .generate(&tagged_file("/in/song.flac"))
            .await
            .unwrap();
        // "my music" exists and is preserved; the new components are scrubbed.
        assert_eq!(path, root.join("Foo_Bar/01-Hi_Ho.ogg"));
    }

    #[tokio::test]
    async fn test_generate_is_idempotent() {
        let generator = NameGenerator::new(NamingOptions {
            target: TargetFolder::Folder(PathBuf::from("/out")),
            basename_pattern: "%(artist)s - %(title)s".to_string(),
            suffix: "opus".to_string(),
            replace_messy: true,
            ..Default::default()
        })
        .unwrap();

        let sf = tagged_file("/in/song.flac");
        let first = generator.generate(&sf).await.unwrap();
        let second = generator.generate(&sf).await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_bad_pattern_rejected_at_construction() {
        let result = NameGenerator::new(NamingOptions {
            basename_pattern: "%(nope)s".to_string(),
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_scrub_component() {
        assert_eq!(scrub_component("Hi Ho"), "Hi_Ho");
        assert_eq!(scrub_component("01-track.ogg"), "01-track.ogg");
        assert_eq!(scrub_component("naïve?"), "na_ve_");
    }
}
