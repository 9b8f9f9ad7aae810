//! File mover: the only code that relocates or deletes tracked files
//!
//! Every state change is one `rename(2)` inside a single filesystem, so a
//! file is never visible in two state folders at once. Destinations are
//! never overwritten: an occupied destination is a `FilesystemConflict`.

use crate::error::{PipelineError, PipelineResult};
use crate::models::MetadataRecord;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Move `from` to exactly `to`, creating the destination folder if needed
pub async fn relocate(from: &Path, to: &Path) -> PipelineResult<PathBuf> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PipelineError::io(parent, e))?;
    }

    if tokio::fs::try_exists(to).await.unwrap_or(false) {
        return Err(PipelineError::FilesystemConflict {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });
    }

    match tokio::fs::rename(from, to).await {
        Ok(()) => {
            tracing::debug!(from = %from.display(), to = %to.display(), "Relocated file");
            Ok(to.to_path_buf())
        }
        Err(e) if e.kind() == IoErrorKind::NotFound && !path_exists(from).await => {
            Err(PipelineError::Vanished(from.to_path_buf()))
        }
        Err(e) => Err(PipelineError::io(from, e)),
    }
}

/// Move `path` from the `from` state folder into the `to` state folder
pub async fn transition(path: &Path, from: &Path, to: &Path) -> PipelineResult<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| PipelineError::Vanished(path.to_path_buf()))?;
    let destination = to.join(file_name);

    if path.parent() != Some(from) {
        return Err(PipelineError::FilesystemConflict {
            from: path.to_path_buf(),
            to: destination,
        });
    }

    relocate(path, &destination).await
}

/// Move `path` into `folder`, appending ` (n)` to the stem if the name is taken
///
/// Used for quarantine and archive folders, where several files with the
/// same name may legitimately accumulate across passes.
pub async fn relocate_unique(path: &Path, folder: &Path) -> PipelineResult<PathBuf> {
    const MAX_ATTEMPTS: u32 = 1000;

    for n in 0..MAX_ATTEMPTS {
        let candidate = folder.join(numbered_name(path, n));
        match relocate(path, &candidate).await {
            Err(PipelineError::FilesystemConflict { .. }) => continue,
            other => return other,
        }
    }

    Err(PipelineError::FilesystemConflict {
        from: path.to_path_buf(),
        to: folder.to_path_buf(),
    })
}

/// Delete a tracked file; already gone counts as success
pub async fn discard(path: &Path) -> PipelineResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(file = %path.display(), "Discarded file");
            Ok(())
        }
        Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
        Err(e) => Err(PipelineError::io(path, e)),
    }
}

/// Final file name: `"{track:02} - {title}.mp3"`, track defaulting to 1
pub fn final_file_name(record: &MetadataRecord) -> String {
    let track = record.track_number().unwrap_or(1);
    let title = record.title.as_deref().unwrap_or("Unknown");
    format!("{:02} - {}.mp3", track, title)
}

fn numbered_name(path: &Path, n: u32) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());

    let stem = if n == 0 {
        stem
    } else {
        format!("{} ({})", stem, n)
    };
    match ext {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Scratch directory for one item's intermediates, removed on drop
#[derive(Debug)]
pub struct TempWorkspace {
    path: PathBuf,
}

impl TempWorkspace {
    pub async fn create(temp_root: &Path) -> PipelineResult<Self> {
        let path = temp_root.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| PipelineError::io(&path, e))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for TempWorkspace {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != IoErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove temp workspace");
            }
        }
    }
}
