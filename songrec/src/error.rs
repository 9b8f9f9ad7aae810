//! Pipeline error taxonomy
//!
//! Every per-file failure maps to an [`ErrorKind`]. All kinds except
//! `TransientProbe` and `Vanished` are terminal for the file and send it to
//! a quarantine folder; those two leave the file where it is for the next
//! pass.

use crate::models::{Stage, State};
use crate::services::{ProbeError, RecognitionError, TagError, TranscodeError};
use std::path::PathBuf;
use thiserror::Error;

/// Per-file pipeline error
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Probe tool unavailable or timed out
    #[error("Transient probe failure for {path}: {source}")]
    TransientProbe {
        path: PathBuf,
        #[source]
        source: ProbeError,
    },

    #[error("Corrupt media {path}: {reason}")]
    CorruptMedia { path: PathBuf, reason: String },

    #[error("Unsupported format .{extension}: {path}")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("Conversion failed for {path}: {reason}")]
    ConversionFailure { path: PathBuf, reason: String },

    #[error("Identification failed for {path}: {reason}")]
    IdentificationFailure { path: PathBuf, reason: String },

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("Tag write failed: {0}")]
    TagWriteFailure(#[from] TagError),

    /// Destination already occupied, or relocation contention
    #[error("Filesystem conflict moving {from} to {to}")]
    FilesystemConflict { from: PathBuf, to: PathBuf },

    /// File disappeared between listing and processing
    #[error("File vanished: {0}")]
    Vanished(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Classification of a [`PipelineError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    TransientProbe,
    CorruptMedia,
    UnsupportedFormat,
    ConversionFailure,
    IdentificationFailure,
    InvalidMetadata,
    TagWriteFailure,
    FilesystemConflict,
    Vanished,
    Io,
}

impl ErrorKind {
    /// File stays in place and is retried on the next pass
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::TransientProbe | ErrorKind::Vanished)
    }

    /// Quarantine state for this kind; `None` for retryable kinds
    ///
    /// Kinds not tied to a specific failure (conflicts, I/O) fall back to
    /// the failure state of the stage they occurred in.
    pub fn quarantine_state(self, stage: Stage) -> Option<State> {
        match self {
            ErrorKind::TransientProbe | ErrorKind::Vanished => None,
            ErrorKind::CorruptMedia => Some(State::Corrupt),
            ErrorKind::UnsupportedFormat => Some(State::UnsupportedFormat),
            ErrorKind::ConversionFailure => Some(State::ConversionFailed),
            ErrorKind::IdentificationFailure | ErrorKind::InvalidMetadata => {
                Some(State::IdentificationFailed)
            }
            ErrorKind::TagWriteFailure => Some(State::TaggingFailed),
            ErrorKind::FilesystemConflict | ErrorKind::Io => Some(stage.failure_state()),
        }
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::TransientProbe { .. } => ErrorKind::TransientProbe,
            PipelineError::CorruptMedia { .. } => ErrorKind::CorruptMedia,
            PipelineError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            PipelineError::ConversionFailure { .. } => ErrorKind::ConversionFailure,
            PipelineError::IdentificationFailure { .. } => ErrorKind::IdentificationFailure,
            PipelineError::InvalidMetadata(_) => ErrorKind::InvalidMetadata,
            PipelineError::TagWriteFailure(_) => ErrorKind::TagWriteFailure,
            PipelineError::FilesystemConflict { .. } => ErrorKind::FilesystemConflict,
            PipelineError::Vanished(_) => ErrorKind::Vanished,
            PipelineError::Io { .. } => ErrorKind::Io,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn conversion(path: impl Into<PathBuf>, err: TranscodeError) -> Self {
        PipelineError::ConversionFailure {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    pub fn identification(path: impl Into<PathBuf>, err: RecognitionError) -> Self {
        PipelineError::IdentificationFailure {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds_have_no_quarantine() {
        for kind in [ErrorKind::TransientProbe, ErrorKind::Vanished] {
            assert!(kind.is_retryable());
            assert_eq!(kind.quarantine_state(Stage::Validate), None);
        }
    }

    #[test]
    fn test_invalid_metadata_goes_to_identification_failed() {
        assert_eq!(
            ErrorKind::InvalidMetadata.quarantine_state(Stage::Reconcile),
            Some(State::IdentificationFailed)
        );
    }

    #[test]
    fn test_conflict_follows_stage() {
        assert_eq!(
            ErrorKind::FilesystemConflict.quarantine_state(Stage::Convert),
            Some(State::ConversionFailed)
        );
        assert_eq!(
            ErrorKind::FilesystemConflict.quarantine_state(Stage::Finalize),
            Some(State::TaggingFailed)
        );
        assert_eq!(
            ErrorKind::Io.quarantine_state(Stage::Identify),
            Some(State::IdentificationFailed)
        );
    }

    #[test]
    fn test_kind_of_error() {
        let err = PipelineError::Vanished(PathBuf::from("/raw/a.wav"));
        assert_eq!(err.kind(), ErrorKind::Vanished);

        let err = PipelineError::conversion(
            "/raw/a.wav",
            TranscodeError::Timeout(std::time::Duration::from_secs(300)),
        );
        assert_eq!(err.kind(), ErrorKind::ConversionFailure);
        assert!(err.to_string().contains("timed out"));
    }
}
