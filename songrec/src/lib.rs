//! songrec library interface
//!
//! Recovers identity and quality for batches of unlabelled audio files:
//! validate, transcode, deduplicate, recognize and re-tag, with each file's
//! state persisted as the folder it lives in.

pub mod error;
pub mod models;
pub mod services;
pub mod workflow;

pub use crate::error::{ErrorKind, PipelineError, PipelineResult};
pub use crate::workflow::{
    Collaborators, FolderSet, ItemOutcome, Orchestrator, PassSummary, PipelineContext,
    PipelineEvent,
};
