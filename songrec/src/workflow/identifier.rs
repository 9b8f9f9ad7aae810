//! Identifier: fingerprint sample → recognition → merged metadata record

use crate::error::{PipelineError, PipelineResult};
use crate::models::MetadataRecord;
use crate::services::{expand_artwork_url, Recognizer, SampleSpec, Transcoder};
use std::path::Path;
use std::sync::Arc;

pub struct Identifier {
    transcoder: Arc<dyn Transcoder>,
    recognizer: Arc<dyn Recognizer>,
    sample: SampleSpec,
    artwork_size: u32,
}

impl Identifier {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        recognizer: Arc<dyn Recognizer>,
        sample: SampleSpec,
        artwork_size: u32,
    ) -> Self {
        Self {
            transcoder,
            recognizer,
            sample,
            artwork_size,
        }
    }

    /// Identify the track in `path`
    ///
    /// No match, an unusable sample, or any recognition error is an
    /// `IdentificationFailure`. A failed details lookup is not: the primary
    /// match fields are used on their own.
    pub async fn identify(&self, path: &Path) -> PipelineResult<MetadataRecord> {
        let sample = self.extract_sample(path).await?;

        let track = self
            .recognizer
            .detect(&sample)
            .await
            .map_err(|e| PipelineError::identification(path, e))?
            .ok_or_else(|| PipelineError::IdentificationFailure {
                path: path.to_path_buf(),
                reason: "no match".to_string(),
            })?;

        let mut record = track.primary_record();

        match track.track_id() {
            Some(track_id) => match self.recognizer.details(track_id).await {
                Ok(details) => record = record.overlay(&details.secondary_record()),
                Err(e) => {
                    tracing::warn!(
                        file = %path.display(),
                        track_id,
                        error = %e,
                        "Details lookup failed, using primary match fields"
                    );
                }
            },
            None => {
                tracing::warn!(file = %path.display(), "Match has no track id, skipping details lookup");
            }
        }

        record.artwork_url = record
            .artwork_url
            .map(|url| expand_artwork_url(&url, self.artwork_size));

        tracing::info!(
            file = %path.display(),
            title = record.title.as_deref().unwrap_or(""),
            artist = record.artist.as_deref().unwrap_or(""),
            "Identified"
        );

        Ok(record)
    }

    /// Sample at the configured offset, falling back to the start of the
    /// file when the offset lies past its end
    async fn extract_sample(&self, path: &Path) -> PipelineResult<Vec<u8>> {
        let sample = self
            .transcoder
            .extract_sample(path, self.sample)
            .await
            .map_err(|e| PipelineError::IdentificationFailure {
                path: path.to_path_buf(),
                reason: format!("sample extraction failed: {}", e),
            })?;

        if !sample.is_empty() || self.sample.offset_secs == 0 {
            return non_empty(path, sample);
        }

        tracing::debug!(file = %path.display(), "Empty sample at offset, retrying from start");
        let from_start = SampleSpec {
            offset_secs: 0,
            ..self.sample
        };
        let sample = self
            .transcoder
            .extract_sample(path, from_start)
            .await
            .map_err(|e| PipelineError::IdentificationFailure {
                path: path.to_path_buf(),
                reason: format!("sample extraction failed: {}", e),
            })?;
        non_empty(path, sample)
    }
}

fn non_empty(path: &Path, sample: Vec<u8>) -> PipelineResult<Vec<u8>> {
    if sample.is_empty() {
        Err(PipelineError::IdentificationFailure {
            path: path.to_path_buf(),
            reason: "empty audio sample".to_string(),
        })
    } else {
        Ok(sample)
    }
}
