//! Conversion engine: normalize any supported input to MP3
//!
//! Outputs are staged in a per-item temp workspace and only become visible
//! when the deduplicator places them into the converted folder. The
//! workspace (partial transcodes, unwrapped intermediates) is removed when
//! the [`StagedConversion`] is dropped, on success and failure alike.

use super::mover::TempWorkspace;
use crate::error::{PipelineError, PipelineResult};
use crate::models::AudioItem;
use crate::services::{Prober, TranscodeMode, Transcoder};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Target format extension
pub const TARGET_EXTENSION: &str = "mp3";

/// Extension of rights-managed sources that need a stream-copy unwrap first
pub const DRM_EXTENSION: &str = "m4p";

/// Conversion result awaiting placement
#[derive(Debug)]
pub struct StagedConversion {
    /// File to place into the converted folder
    pub output: PathBuf,
    /// Encoded bitrate; `None` for passthrough MP3s
    pub bitrate_kbps: Option<u32>,
    /// Source was already MP3 and is placed as-is
    pub passthrough: bool,
    workspace: Option<TempWorkspace>,
}

impl StagedConversion {
    pub fn workspace(&self) -> Option<&Path> {
        self.workspace.as_ref().map(TempWorkspace::path)
    }
}

pub struct ConversionEngine {
    prober: Arc<dyn Prober>,
    transcoder: Arc<dyn Transcoder>,
    temp_root: PathBuf,
    max_bitrate_kbps: u32,
}

impl ConversionEngine {
    pub fn new(
        prober: Arc<dyn Prober>,
        transcoder: Arc<dyn Transcoder>,
        temp_root: PathBuf,
        max_bitrate_kbps: u32,
    ) -> Self {
        Self {
            prober,
            transcoder,
            temp_root,
            max_bitrate_kbps,
        }
    }

    /// Target bitrate: source bitrate capped at the ceiling, ceiling when unknown
    pub fn target_bitrate(&self, source_kbps: Option<u32>) -> u32 {
        source_kbps
            .filter(|&k| k > 0)
            .map_or(self.max_bitrate_kbps, |k| k.min(self.max_bitrate_kbps))
    }

    /// Convert `item` to a staged MP3
    pub async fn convert(&self, item: &AudioItem) -> PipelineResult<StagedConversion> {
        let source = item.source_path.as_path();

        if item.extension == TARGET_EXTENSION {
            tracing::debug!(file = %source.display(), "Already MP3, no transcode needed");
            return Ok(StagedConversion {
                output: source.to_path_buf(),
                bitrate_kbps: None,
                passthrough: true,
                workspace: None,
            });
        }

        let source_kbps = match item.detected_bitrate_kbps {
            Some(kbps) => Some(kbps),
            None => match self.prober.probe(source).await {
                Ok(report) => report.audio_bitrate_kbps(),
                Err(e) => {
                    tracing::warn!(file = %source.display(), error = %e, "Bitrate probe failed, using ceiling");
                    None
                }
            },
        };
        let bitrate_kbps = self.target_bitrate(source_kbps);

        let workspace = TempWorkspace::create(&self.temp_root).await?;
        let output = workspace.file(&format!("{}.{}", item.canonical_name, TARGET_EXTENSION));

        let transcode_input = if item.extension == DRM_EXTENSION {
            let intermediate = workspace.file(&format!("{}.m4a", item.canonical_name));
            self.transcoder
                .transcode(source, &intermediate, TranscodeMode::StreamCopy)
                .await
                .map_err(|e| PipelineError::conversion(source, e))?;
            tracing::debug!(
                file = %source.display(),
                intermediate = %intermediate.display(),
                "Unwrapped rights-managed container"
            );
            Some(intermediate)
        } else {
            None
        };

        let result = self
            .transcoder
            .transcode(
                transcode_input.as_deref().unwrap_or(source),
                &output,
                TranscodeMode::Mp3 { bitrate_kbps },
            )
            .await;

        if let Some(intermediate) = &transcode_input {
            if let Err(e) = tokio::fs::remove_file(intermediate).await {
                tracing::warn!(file = %intermediate.display(), error = %e, "Failed to remove intermediate");
            }
        }
        result.map_err(|e| PipelineError::conversion(source, e))?;

        self.verify_output(source, &output).await?;

        tracing::info!(
            file = %source.display(),
            bitrate_kbps,
            source_kbps = ?source_kbps,
            "Converted to MP3"
        );

        Ok(StagedConversion {
            output,
            bitrate_kbps: Some(bitrate_kbps),
            passthrough: false,
            workspace: Some(workspace),
        })
    }

    /// Re-probe the transcoded output; no playable audio is a conversion failure
    ///
    /// A transient probe error (spawn failure, timeout) skips verification:
    /// ffmpeg already exited cleanly, so the output is accepted unchecked and
    /// a warning is logged.
    async fn verify_output(&self, source: &Path, output: &Path) -> PipelineResult<()> {
        match self.prober.probe(output).await {
            Ok(report) if report.has_playable_audio() => Ok(()),
            Ok(_) => Err(PipelineError::ConversionFailure {
                path: source.to_path_buf(),
                reason: "transcoded output has no playable audio stream".to_string(),
            }),
            Err(e) if e.is_transient() => {
                tracing::warn!(
                    file = %output.display(),
                    error = %e,
                    "Verification probe unavailable, accepting transcoded output unchecked"
                );
                Ok(())
            }
            Err(e) => Err(PipelineError::ConversionFailure {
                path: source.to_path_buf(),
                reason: format!("transcoded output failed probe: {}", e),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        FfmpegTranscoder, FfprobeProber, ProbeError, ProbeReport, SampleSpec, TranscodeError,
    };
    use std::time::Duration;

    fn engine() -> ConversionEngine {
        ConversionEngine::new(
            Arc::new(FfprobeProber::new("ffprobe", Duration::from_secs(30))),
            Arc::new(FfmpegTranscoder::new("ffmpeg", Duration::from_secs(300))),
            PathBuf::from("/tmp"),
            320,
        )
    }

    #[test]
    fn test_target_bitrate_is_capped() {
        let engine = engine();
        assert_eq!(engine.target_bitrate(Some(900)), 320);
        assert_eq!(engine.target_bitrate(Some(192)), 192);
        assert_eq!(engine.target_bitrate(Some(320)), 320);
    }

    #[test]
    fn test_unknown_bitrate_defaults_to_ceiling() {
        let engine = engine();
        assert_eq!(engine.target_bitrate(None), 320);
        assert_eq!(engine.target_bitrate(Some(0)), 320);
    }

    #[tokio::test]
    async fn test_mp3_source_passes_through() {
        let item = AudioItem::from_path(Path::new("/raw/song.MP3"), crate::models::State::Validated);
        let staged = engine().convert(&item).await.unwrap();
        assert!(staged.passthrough);
        assert_eq!(staged.output, PathBuf::from("/raw/song.MP3"));
        assert!(staged.workspace().is_none());
    }

    /// Valid source, probe unavailable for the transcoded output
    struct SourceOnlyProber;

    #[async_trait::async_trait]
    impl Prober for SourceOnlyProber {
        async fn probe(&self, path: &Path) -> Result<ProbeReport, ProbeError> {
            if path.extension().is_some_and(|e| e == "mp3") {
                return Err(ProbeError::Timeout(Duration::from_secs(30)));
            }
            ProbeReport::from_json(
                br#"{"streams": [{"codec_type": "audio", "channels": 2, "bit_rate": "192000"}]}"#,
            )
        }
    }

    /// Writes a placeholder output file
    struct TouchTranscoder;

    #[async_trait::async_trait]
    impl Transcoder for TouchTranscoder {
        async fn transcode(
            &self,
            _input: &Path,
            output: &Path,
            _mode: TranscodeMode,
        ) -> Result<(), TranscodeError> {
            tokio::fs::write(output, b"mp3").await.map_err(|e| TranscodeError::Failed {
                status: 1,
                stderr: e.to_string(),
            })
        }

        async fn extract_sample(
            &self,
            _input: &Path,
            _spec: SampleSpec,
        ) -> Result<Vec<u8>, TranscodeError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_transient_verification_failure_accepts_output() {
        let temp = tempfile::TempDir::new().unwrap();
        let source = temp.path().join("song.flac");
        std::fs::write(&source, b"flac").unwrap();

        let engine = ConversionEngine::new(
            Arc::new(SourceOnlyProber),
            Arc::new(TouchTranscoder),
            temp.path().join("tmp"),
            320,
        );
        let item = AudioItem::from_path(&source, crate::models::State::Validated);
        let staged = engine.convert(&item).await.unwrap();

        assert!(!staged.passthrough);
        assert_eq!(staged.bitrate_kbps, Some(192));
        assert!(staged.output.exists());
    }
}
