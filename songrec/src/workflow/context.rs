//! Explicit pipeline context
//!
//! Built once at startup and handed to the orchestrator; nothing in the
//! pipeline reads global configuration.

use super::folders::FolderSet;
use super::locks::NameLocks;
use super::PipelineEvent;
use crate::services::{
    ArtworkFetcher, FfmpegTranscoder, FfprobeProber, HttpArtworkFetcher, LoftyTagWriter, Prober,
    Recognizer, SampleSpec, ShazamClient, TagWriter, Transcoder,
};
use songrec_common::config::{PipelineSettings, TomlConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// External collaborators behind their traits
#[derive(Clone)]
pub struct Collaborators {
    pub prober: Arc<dyn Prober>,
    pub transcoder: Arc<dyn Transcoder>,
    pub recognizer: Arc<dyn Recognizer>,
    pub tag_writer: Arc<dyn TagWriter>,
    /// Cover art download; artwork is skipped when absent
    pub artwork: Option<Arc<dyn ArtworkFetcher>>,
}

impl Collaborators {
    /// ffprobe / ffmpeg / Shazam / lofty / HTTP artwork
    pub fn production(config: &TomlConfig, api_key: String) -> anyhow::Result<Self> {
        let recognizer = ShazamClient::new(api_key, config.recognition.clone())?;
        let artwork =
            HttpArtworkFetcher::new(Duration::from_secs(config.recognition.request_timeout_secs))?;

        Ok(Self {
            prober: Arc::new(FfprobeProber::new(
                config.tools.ffprobe.clone(),
                Duration::from_secs(config.timeouts.probe_secs),
            )),
            transcoder: Arc::new(FfmpegTranscoder::new(
                config.tools.ffmpeg.clone(),
                Duration::from_secs(config.timeouts.transcode_secs),
            )),
            recognizer: Arc::new(recognizer),
            tag_writer: Arc::new(LoftyTagWriter::new()),
            artwork: Some(Arc::new(artwork)),
        })
    }
}

/// Everything a pass needs
pub struct PipelineContext {
    pub folders: FolderSet,
    pub settings: PipelineSettings,
    pub collaborators: Collaborators,
    pub locks: NameLocks,
    event_tx: Option<mpsc::Sender<PipelineEvent>>,
}

impl PipelineContext {
    pub fn new(folders: FolderSet, settings: PipelineSettings, collaborators: Collaborators) -> Self {
        Self {
            folders,
            settings,
            collaborators,
            locks: NameLocks::new(),
            event_tx: None,
        }
    }

    /// Attach a structured event channel
    pub fn with_events(mut self, event_tx: mpsc::Sender<PipelineEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn sample_spec(&self) -> SampleSpec {
        SampleSpec {
            offset_secs: self.settings.sample_offset_secs,
            duration_secs: self.settings.sample_duration_secs,
            sample_rate: self.settings.sample_rate,
        }
    }

    pub async fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}
