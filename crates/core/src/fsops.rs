//! Filesystem helpers for conversion jobs.
//!
//! Every operation is fallible and failures are per-file: a conversion task
//! records them as its own error, the queue keeps going.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

/// Errors from filesystem operations.
#[derive(Debug, Error)]
pub enum FsError {
    /// Failed to create a directory.
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to rename a file.
    #[error("failed to rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    /// Failed to delete a file.
    #[error("failed to delete {path}: {source}")]
    Delete {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Could not find a free temporary name next to the target.
    #[error("no free temporary name next to {path}")]
    NoFreeTempName { path: PathBuf },

    /// Path has no parent directory or no file name to work with.
    #[error("unusable path: {path}")]
    UnusablePath { path: PathBuf },
}

/// Whether a path exists.
pub async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

/// Creates the parent directories of `path` as needed.
pub async fn ensure_parent_dirs(path: &Path) -> Result<(), FsError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(|e| FsError::CreateDir {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Picks a temporary sibling path for `target` that does not exist yet.
///
/// The name carries a random fragment and is re-rolled until the filesystem
/// confirms non-existence, so concurrent jobs writing into the same
/// directory can never pick the same temp file.
pub async fn unique_temp_sibling(target: &Path) -> Result<PathBuf, FsError> {
    let parent = target.parent().ok_or_else(|| FsError::UnusablePath {
        path: target.to_path_buf(),
    })?;
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| FsError::UnusablePath {
            path: target.to_path_buf(),
        })?;

    for _ in 0..16 {
        let fragment = &Uuid::new_v4().simple().to_string()[..8];
        let candidate = parent.join(format!(".{name}.{fragment}.part"));
        if !exists(&candidate).await {
            return Ok(candidate);
        }
    }

    Err(FsError::NoFreeTempName {
        path: target.to_path_buf(),
    })
}

/// Renames `from` to `to` as a single atomic filesystem operation.
pub async fn rename(from: &Path, to: &Path) -> Result<(), FsError> {
    fs::rename(from, to).await.map_err(|e| FsError::Rename {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source: e,
    })
}

/// Renames `from` onto `to`, appending ` (n)` before the extension until a
/// free name is found. Returns the path actually used.
pub async fn rename_with_increment(from: &Path, to: &Path) -> Result<PathBuf, FsError> {
    let mut candidate = to.to_path_buf();
    let mut n = 1u32;

    while exists(&candidate).await {
        candidate = numbered_variant(to, n)?;
        n += 1;
    }

    rename(from, &candidate).await?;
    Ok(candidate)
}

/// Deletes a file.
pub async fn remove_file(path: &Path) -> Result<(), FsError> {
    fs::remove_file(path).await.map_err(|e| FsError::Delete {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Copies permission bits from `src` onto `dst`. Best-effort by contract:
/// callers log the error and move on.
pub async fn copy_attributes(src: &Path, dst: &Path) -> Result<(), std::io::Error> {
    let meta = fs::metadata(src).await?;
    fs::set_permissions(dst, meta.permissions()).await
}

/// Builds the `name (n).ext` variant of a path.
fn numbered_variant(path: &Path, n: u32) -> Result<PathBuf, FsError> {
    let parent = path.parent().ok_or_else(|| FsError::UnusablePath {
        path: path.to_path_buf(),
    })?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| FsError::UnusablePath {
            path: path.to_path_buf(),
        })?;

    let name = match path.extension() {
        Some(ext) => format!("{stem} ({n}).{}", ext.to_string_lossy()),
        None => format!("{stem} ({n})"),
    };

    Ok(parent.join(name))
}
