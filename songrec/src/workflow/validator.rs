//! Validator: classify a raw file before any work is spent on it

use crate::error::{PipelineError, PipelineResult};
use crate::services::{ProbeReport, Prober};
use std::path::Path;
use std::sync::Arc;

/// Extensions routed to the video holding area
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "flv", "wmv"];

/// Extensions the conversion engine accepts
pub const SUPPORTED_AUDIO_EXTENSIONS: &[&str] =
    &["wav", "m4a", "m4p", "aac", "flac", "ogg", "wma", "mp3"];

/// Validator verdict
#[derive(Debug, Clone)]
pub enum Classification {
    /// Playable, supported audio; the probe report is kept for conversion
    Audio(ProbeReport),
    Video,
    Corrupt(String),
    Unsupported,
}

pub struct Validator {
    prober: Arc<dyn Prober>,
}

impl Validator {
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self { prober }
    }

    /// Classify `path`
    ///
    /// Order: video extension, probe, supported extension. A probe tool
    /// failure (missing binary, timeout) is returned as `TransientProbe` so
    /// the file stays in place for the next pass.
    pub async fn classify(&self, path: &Path) -> PipelineResult<Classification> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
            return Ok(Classification::Video);
        }

        let report = match self.prober.probe(path).await {
            Ok(report) => report,
            Err(e) if e.is_transient() => {
                return Err(PipelineError::TransientProbe {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
            Err(e) => return Ok(Classification::Corrupt(e.to_string())),
        };

        if !report.has_playable_audio() {
            return Ok(Classification::Corrupt(
                "no audio stream with a positive channel count".to_string(),
            ));
        }

        if !SUPPORTED_AUDIO_EXTENSIONS.contains(&extension.as_str()) {
            return Ok(Classification::Unsupported);
        }

        Ok(Classification::Audio(report))
    }
}
