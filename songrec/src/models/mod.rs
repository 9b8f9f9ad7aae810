//! Data models for the recovery pipeline
//!
//! - [`AudioItem`]: one file as it moves through the pipeline
//! - [`State`] / [`Stage`]: lifecycle states and the stages that drive them
//! - [`MetadataRecord`]: descriptive tags from recognition or from the file

pub(crate) mod lenient;
pub mod metadata;
pub mod state;

pub use metadata::{MetadataChange, MetadataField, MetadataRecord};
pub use state::{Stage, State, StateTransition};

use chrono::Utc;
use std::path::{Path, PathBuf};

/// One file being processed
///
/// Owned by exactly one worker for the duration of a pass.
#[derive(Debug, Clone)]
pub struct AudioItem {
    /// Current location on disk
    pub source_path: PathBuf,
    /// File stem, used for collision detection
    pub canonical_name: String,
    /// Lowercased extension without the dot ("" when absent)
    pub extension: String,
    pub current_state: State,
    /// Bitrate reported by the validation probe, in kbps
    pub detected_bitrate_kbps: Option<u32>,
    /// Canonical metadata once identified
    pub metadata: Option<MetadataRecord>,
    /// Message of the error that sent the item to quarantine
    pub last_error: Option<String>,
}

impl AudioItem {
    /// Item for a file discovered in `state`'s folder
    pub fn from_path(path: &Path, state: State) -> Self {
        let canonical_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        Self {
            source_path: path.to_path_buf(),
            canonical_name,
            extension,
            current_state: state,
            detected_bitrate_kbps: None,
            metadata: None,
            last_error: None,
        }
    }

    /// File name as it currently sits on disk
    pub fn file_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.canonical_name.clone())
    }

    /// Record a state change, optionally at a new location
    pub fn transition_to(&mut self, new_state: State, new_path: Option<PathBuf>) -> StateTransition {
        let old_state = self.current_state;
        if let Some(path) = new_path {
            self.source_path = path;
        }
        self.current_state = new_state;

        StateTransition {
            path: self.source_path.clone(),
            old_state,
            new_state,
            transitioned_at: Utc::now(),
        }
    }
}
