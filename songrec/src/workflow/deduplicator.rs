//! Deduplicator: at most one file per canonical name in a folder
//!
//! On a collision the higher bit rate wins. Ties, and files whose bit rate
//! cannot be read (counted as 0), keep the file that was already there.

use super::locks::NameLocks;
use super::mover;
use crate::error::{PipelineError, PipelineResult};
use crate::services::Prober;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of placing a candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No collision; candidate placed at the path
    Placed(PathBuf),
    /// Existing lower-quality file deleted, candidate placed at `path`
    Replaced { path: PathBuf, displaced: PathBuf },
    /// Existing file kept, candidate deleted
    Discarded { kept: PathBuf },
}

impl Resolution {
    /// Path of the candidate after resolution, if it survived
    pub fn placed_path(&self) -> Option<&Path> {
        match self {
            Resolution::Placed(path) | Resolution::Replaced { path, .. } => Some(path),
            Resolution::Discarded { .. } => None,
        }
    }
}

pub struct Deduplicator {
    prober: Arc<dyn Prober>,
    locks: NameLocks,
}

impl Deduplicator {
    pub fn new(prober: Arc<dyn Prober>, locks: NameLocks) -> Self {
        Self { prober, locks }
    }

    /// Place `candidate` into `folder` under its own file name
    pub async fn resolve(&self, candidate: &Path, folder: &Path) -> PipelineResult<Resolution> {
        let file_name = candidate
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| PipelineError::Vanished(candidate.to_path_buf()))?;
        self.resolve_as(candidate, folder, &file_name).await
    }

    /// Place `candidate` into `folder` as `file_name`
    pub async fn resolve_as(
        &self,
        candidate: &Path,
        folder: &Path,
        file_name: &str,
    ) -> PipelineResult<Resolution> {
        let target = folder.join(file_name);
        let canonical = canonical_name(&target);

        let _guard = self.locks.lock(folder, &canonical).await;

        let existing = match find_existing(folder, &canonical, candidate).await? {
            Some(existing) => existing,
            None => {
                let placed = mover::relocate(candidate, &target).await?;
                return Ok(Resolution::Placed(placed));
            }
        };

        let candidate_kbps = self.bitrate_kbps(candidate).await;
        let existing_kbps = self.bitrate_kbps(&existing).await;

        if candidate_kbps > existing_kbps {
            mover::discard(&existing).await?;
            let placed = mover::relocate(candidate, &target).await?;
            tracing::info!(
                file = %placed.display(),
                candidate_kbps,
                existing_kbps,
                "Replaced duplicate with higher bitrate version"
            );
            Ok(Resolution::Replaced {
                path: placed,
                displaced: existing,
            })
        } else {
            mover::discard(candidate).await?;
            tracing::info!(
                file = %existing.display(),
                candidate_kbps,
                existing_kbps,
                "Duplicate discarded, existing file has higher or equal bitrate"
            );
            Ok(Resolution::Discarded { kept: existing })
        }
    }

    /// Bit rate in kbps; unreadable counts as 0
    async fn bitrate_kbps(&self, path: &Path) -> u32 {
        match self.prober.probe(path).await {
            Ok(report) => report.audio_bitrate_kbps().unwrap_or(0),
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Bitrate probe failed during dedup");
                0
            }
        }
    }
}

fn canonical_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// File in `folder` with stem `canonical`, other than `candidate` itself
async fn find_existing(
    folder: &Path,
    canonical: &str,
    candidate: &Path,
) -> PipelineResult<Option<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(folder).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PipelineError::io(folder, e)),
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PipelineError::io(folder, e))?
    {
        let path = entry.path();
        if path == candidate {
            continue;
        }
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file && canonical_name(&path) == canonical {
            return Ok(Some(path));
        }
    }
    Ok(None)
}
