//! Input scanning.
//!
//! Walks the given files and directories into a flat, sorted list of
//! sound files. Glue around the core; the scheduler only ever sees the
//! resulting list.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use transonic_core::SoundFile;

/// Extensions treated as audio input.
const AUDIO_EXTENSIONS: &[&str] = &[
    "flac", "mp3", "ogg", "oga", "opus", "m4a", "aac", "wav", "wma", "ape", "aiff", "aif", "mpc",
];

fn has_audio_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
}

/// Collects sound files from the given inputs.
///
/// Directories are walked recursively and become the base folder of the
/// files below them, so the output tree can mirror the input tree. Files
/// given directly are taken as-is, whatever their extension.
pub fn collect_sound_files(inputs: &[PathBuf]) -> Vec<SoundFile> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input)
                .follow_links(true)
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(error) => {
                        warn!(%error, "skipping unreadable directory entry");
                        None
                    }
                })
            {
                if entry.file_type().is_file() && has_audio_extension(entry.path()) {
                    files.push(SoundFile::with_base(entry.path(), input));
                }
            }
        } else if input.is_file() {
            files.push(SoundFile::new(input));
        } else {
            warn!(path = %input.display(), "input not found");
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(count = files.len(), "inputs collected");
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_walks_directories_recursively() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("album/cd1")).unwrap();
        std::fs::write(temp.path().join("album/cd1/01.flac"), b"x").unwrap();
        std::fs::write(temp.path().join("album/02.mp3"), b"x").unwrap();
        std::fs::write(temp.path().join("album/cover.jpg"), b"x").unwrap();

        let files = collect_sound_files(&[temp.path().to_path_buf()]);
        assert_eq!(files.len(), 2);
        // Non-audio files are filtered out; bases point at the scanned root.
        assert!(files.iter().all(|f| f.base.as_deref() == Some(temp.path())));
    }

    #[test]
    fn test_direct_files_have_no_base() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("song.flac");
        std::fs::write(&file, b"x").unwrap();

        let files = collect_sound_files(&[file.clone()]);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, file);
        assert!(files[0].base.is_none());
    }

    #[test]
    fn test_missing_inputs_are_skipped() {
        let files = collect_sound_files(&[PathBuf::from("/definitely/not/here.flac")]);
        assert!(files.is_empty());
    }

    #[test]
    fn test_extension_filter_is_case_insensitive() {
        assert!(has_audio_extension(Path::new("/a/b.FLAC")));
        assert!(has_audio_extension(Path::new("/a/b.Mp3")));
        assert!(!has_audio_extension(Path::new("/a/b.txt")));
        assert!(!has_audio_extension(Path::new("/a/noext")));
    }
}
