//! Folder-as-state recovery pipeline
//!
//! One pass drives every file in the raw folder through
//! Validate → Convert → Deduplicate → Identify → Reconcile → Tag → Finalize.
//! The folder a file sits in is its persisted state; the [`mover`] is the
//! only code that relocates tracked files.
//!
//! # Error Handling
//! - Per-file isolation: a failure quarantines that file and the pass goes on
//! - Transient probe failures and vanished files are skipped, not quarantined
//! - Retry is by re-running the pass, never by in-process loops

pub mod context;
pub mod converter;
pub mod deduplicator;
pub mod folders;
pub mod identifier;
pub mod locks;
pub mod mover;
pub mod orchestrator;
pub mod reconciler;
pub mod validator;

pub use context::{Collaborators, PipelineContext};
pub use converter::{ConversionEngine, StagedConversion};
pub use deduplicator::{Deduplicator, Resolution};
pub use folders::FolderSet;
pub use identifier::Identifier;
pub use locks::{NameGuard, NameLocks};
pub use orchestrator::Orchestrator;
pub use validator::{Classification, Validator};

use crate::models::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Structured pipeline events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    PassStarted {
        /// Files found in the raw folder
        raw_files: usize,
        /// Files resumed from the converted folder
        resumed_files: usize,
        timestamp: DateTime<Utc>,
    },

    ItemTransitioned {
        file: PathBuf,
        from: State,
        to: State,
        timestamp: DateTime<Utc>,
    },

    ItemQuarantined {
        file: PathBuf,
        state: State,
        error_kind: String,
        error_message: String,
    },

    /// Left in place for the next pass
    ItemSkipped { file: PathBuf, reason: String },

    PassCompleted { summary: PassSummary },
}

/// Terminal result of one file's run in a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Finalized(PathBuf),
    /// Lost a dedup comparison against an equal or better copy
    Discarded,
    Video(PathBuf),
    Quarantined(State),
    Skipped,
}

/// End-of-pass counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub processed: usize,
    pub succeeded: usize,
    pub discarded: usize,
    pub video: usize,
    pub skipped: usize,
    pub quarantined: BTreeMap<State, usize>,
}

impl PassSummary {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            processed: 0,
            succeeded: 0,
            discarded: 0,
            video: 0,
            skipped: 0,
            quarantined: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, outcome: &ItemOutcome) {
        self.processed += 1;
        match outcome {
            ItemOutcome::Finalized(_) => self.succeeded += 1,
            ItemOutcome::Discarded => self.discarded += 1,
            ItemOutcome::Video(_) => self.video += 1,
            ItemOutcome::Quarantined(state) => *self.quarantined.entry(*state).or_insert(0) += 1,
            ItemOutcome::Skipped => self.skipped += 1,
        }
    }

    pub fn quarantined_total(&self) -> usize {
        self.quarantined.values().sum()
    }

    pub fn quarantined_in(&self, state: State) -> usize {
        self.quarantined.get(&state).copied().unwrap_or(0)
    }
}
