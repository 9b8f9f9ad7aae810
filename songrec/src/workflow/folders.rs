//! Folder-to-state mapping
//!
//! Each persisted [`State`] owns exactly one folder; the mapping must be
//! injective so a file's location alone identifies its state.

use crate::models::State;
use songrec_common::config::FolderConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Resolved folder table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderSet {
    config: FolderConfig,
}

impl FolderSet {
    pub fn new(config: FolderConfig) -> Self {
        Self { config }
    }

    /// Default layout rooted at `base`
    pub fn under(base: &Path) -> Self {
        Self::new(FolderConfig::default().resolve_against(base))
    }

    pub fn raw(&self) -> &Path {
        &self.config.raw
    }

    pub fn video(&self) -> &Path {
        &self.config.video
    }

    pub fn converted(&self) -> &Path {
        &self.config.converted
    }

    pub fn archive(&self) -> &Path {
        &self.config.archive
    }

    pub fn success(&self) -> &Path {
        &self.config.success
    }

    pub fn temp(&self) -> &Path {
        &self.config.temp
    }

    /// Folder that holds files in `state`
    ///
    /// `None` for the in-flight states that only exist while a worker owns
    /// the file (`Validated`, `Identified`, `Tagged`). `Deduplicated` shares
    /// the converted folder: placement there is what completes dedup.
    pub fn folder_for(&self, state: State) -> Option<&Path> {
        let q = &self.config.quarantine;
        let path = match state {
            State::Raw => &self.config.raw,
            State::Converted | State::Deduplicated => &self.config.converted,
            State::Finalized => &self.config.success,
            State::Video => &self.config.video,
            State::Corrupt => &q.corrupt,
            State::UnsupportedFormat => &q.unsupported,
            State::ConversionFailed => &q.conversion_failed,
            State::IdentificationFailed => &q.identification_failed,
            State::TaggingFailed => &q.tagging_failed,
            State::Validated | State::Identified | State::Tagged => return None,
        };
        Some(path.as_path())
    }

    /// Reject folder tables where two roles share a directory
    pub fn validate(&self) -> songrec_common::Result<()> {
        let mut seen: HashMap<PathBuf, &'static str> = HashMap::new();
        for (label, path) in self.config.labelled() {
            let key = normalize(path);
            if let Some(previous) = seen.insert(key, label) {
                return Err(songrec_common::Error::Config(format!(
                    "Folders '{}' and '{}' both point to {}",
                    previous,
                    label,
                    path.display()
                )));
            }
        }
        Ok(())
    }

    /// Create every folder that does not exist yet
    pub async fn ensure_exist(&self) -> std::io::Result<()> {
        for (label, path) in self.config.labelled() {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                tracing::info!(folder = label, path = %path.display(), "Creating folder");
            }
            tokio::fs::create_dir_all(path).await?;
        }
        Ok(())
    }

    pub fn config(&self) -> &FolderConfig {
        &self.config
    }
}

/// Lexical normalization so `a/b` and `a/./b/` compare equal
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}
