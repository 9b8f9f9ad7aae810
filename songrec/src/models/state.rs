//! Per-file state machine
//!
//! A file moves `Raw → Validated → Converted → Deduplicated → Identified →
//! Tagged → Finalized`. Every failure branch is terminal and has its own
//! quarantine folder. `Video` is a terminal holding state for video files.
//!
//! Only `Raw`, `Converted`, `Finalized`, `Video` and the quarantine states
//! are persisted as folders; the remaining states exist while a worker holds
//! the file between two relocations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// File lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Discovered in the raw folder
    Raw,
    /// Probed and classified as supported audio
    Validated,
    /// Transcoded (or already MP3), not yet placed
    Converted,
    /// Placed in the converted folder after name-collision resolution
    Deduplicated,
    /// Recognized, canonical metadata resolved
    Identified,
    /// Tags written (or already up to date)
    Tagged,
    /// Renamed and relocated into the success folder
    Finalized,
    /// Video file parked in the video holding area
    Video,
    /// Probe failed or reported no usable audio stream
    Corrupt,
    /// Extension outside the supported audio set
    UnsupportedFormat,
    /// Transcode subprocess failed or timed out
    ConversionFailed,
    /// No recognition match, collaborator error, or unusable metadata
    IdentificationFailed,
    /// Tag write failed
    TaggingFailed,
}

impl State {
    /// Quarantine states, in a stable order
    pub const QUARANTINE: [State; 5] = [
        State::Corrupt,
        State::UnsupportedFormat,
        State::ConversionFailed,
        State::IdentificationFailed,
        State::TaggingFailed,
    ];

    /// No further processing once reached
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Finalized | State::Video) || self.is_quarantine()
    }

    pub fn is_quarantine(self) -> bool {
        Self::QUARANTINE.contains(&self)
    }

    /// Legal forward step on the happy path
    pub fn next(self) -> Option<State> {
        match self {
            State::Raw => Some(State::Validated),
            State::Validated => Some(State::Converted),
            State::Converted => Some(State::Deduplicated),
            State::Deduplicated => Some(State::Identified),
            State::Identified => Some(State::Tagged),
            State::Tagged => Some(State::Finalized),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            State::Raw => "raw",
            State::Validated => "validated",
            State::Converted => "converted",
            State::Deduplicated => "deduplicated",
            State::Identified => "identified",
            State::Tagged => "tagged",
            State::Finalized => "finalized",
            State::Video => "video",
            State::Corrupt => "corrupt",
            State::UnsupportedFormat => "unsupported_format",
            State::ConversionFailed => "conversion_failed",
            State::IdentificationFailed => "identification_failed",
            State::TaggingFailed => "tagging_failed",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validate,
    Convert,
    Deduplicate,
    Identify,
    Reconcile,
    Tag,
    Finalize,
}

impl Stage {
    /// Quarantine used when this stage fails without a more specific kind
    pub fn failure_state(self) -> State {
        match self {
            Stage::Validate => State::Corrupt,
            Stage::Convert | Stage::Deduplicate => State::ConversionFailed,
            Stage::Identify | Stage::Reconcile => State::IdentificationFailed,
            Stage::Tag | Stage::Finalize => State::TaggingFailed,
        }
    }
}

/// Recorded state change of one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub path: PathBuf,
    pub old_state: State,
    pub new_state: State,
    pub transitioned_at: DateTime<Utc>,
}
