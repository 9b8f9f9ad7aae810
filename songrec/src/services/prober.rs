//! Stream metadata probe
//!
//! Wraps `ffprobe -print_format json -show_format -show_streams`. The JSON
//! payload is loosely typed (numbers arrive as strings, fields go missing),
//! so every field is optional and parsed leniently.

use crate::models::lenient;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Probe errors
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Probe binary could not be started
    #[error("Failed to spawn {0}: {1}")]
    Spawn(String, String),

    /// Probe did not finish within its timeout
    #[error("Probe timed out after {0:?}")]
    Timeout(Duration),

    /// Probe exited non-zero (unreadable or damaged container)
    #[error("Probe failed with status {status}: {stderr}")]
    Failed { status: i32, stderr: String },

    /// Probe output was not valid JSON
    #[error("Probe output parse error: {0}")]
    Parse(String),
}

impl ProbeError {
    /// Failure of the tool rather than of the file; retried on the next pass
    pub fn is_transient(&self) -> bool {
        matches!(self, ProbeError::Spawn(..) | ProbeError::Timeout(_))
    }
}

/// Parsed probe output
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeReport {
    #[serde(default)]
    pub streams: Vec<StreamInfo>,
    #[serde(default)]
    pub format: Option<FormatInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamInfo {
    #[serde(default)]
    pub codec_type: Option<String>,
    #[serde(default)]
    pub codec_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub channels: Option<u64>,
    /// Bits per second
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub bit_rate: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormatInfo {
    #[serde(default)]
    pub format_name: Option<String>,
    /// Bits per second
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub bit_rate: Option<u64>,
}

impl ProbeReport {
    pub fn from_json(json: &[u8]) -> Result<Self, ProbeError> {
        serde_json::from_slice(json).map_err(|e| ProbeError::Parse(e.to_string()))
    }

    /// First audio stream with a positive channel count
    pub fn audio_stream(&self) -> Option<&StreamInfo> {
        self.streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("audio") && s.channels.unwrap_or(0) > 0)
    }

    pub fn has_playable_audio(&self) -> bool {
        self.audio_stream().is_some()
    }

    /// Audio bit rate in kbps; stream value first, container value as fallback
    pub fn audio_bitrate_kbps(&self) -> Option<u32> {
        let bps = self
            .audio_stream()
            .and_then(|s| s.bit_rate)
            .or_else(|| self.format.as_ref().and_then(|f| f.bit_rate))?;
        let kbps = u32::try_from(bps / 1000).ok()?;
        (kbps > 0).then_some(kbps)
    }
}

/// Stream metadata collaborator
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<ProbeReport, ProbeError>;
}

/// `ffprobe` subprocess prober
pub struct FfprobeProber {
    binary: PathBuf,
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<ProbeReport, ProbeError> {
        let mut command = Command::new(&self.binary);
        command
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-analyzeduration",
                "100M",
                "-probesize",
                "100M",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        tracing::debug!(file = %path.display(), "Probing stream metadata");

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ProbeError::Spawn(
                    self.binary.display().to_string(),
                    e.to_string(),
                ))
            }
            Err(_) => return Err(ProbeError::Timeout(self.timeout)),
        };

        if !output.status.success() {
            return Err(ProbeError::Failed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        ProbeReport::from_json(&output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flac_report() {
        let json = br#"{
            "streams": [
                {"index": 0, "codec_type": "video", "codec_name": "mjpeg"},
                {"index": 1, "codec_type": "audio", "codec_name": "flac", "channels": 2, "bit_rate": "900000"}
            ],
            "format": {"format_name": "flac", "bit_rate": "910000"}
        }"#;

        let report = ProbeReport::from_json(json).unwrap();
        assert!(report.has_playable_audio());
        assert_eq!(report.audio_bitrate_kbps(), Some(900));
        assert_eq!(
            report.audio_stream().and_then(|s| s.codec_name.as_deref()),
            Some("flac")
        );
    }

    #[test]
    fn test_bitrate_falls_back_to_container() {
        let json = br#"{
            "streams": [{"codec_type": "audio", "channels": 2, "bit_rate": "N/A"}],
            "format": {"bit_rate": "256000"}
        }"#;
        let report = ProbeReport::from_json(json).unwrap();
        assert_eq!(report.audio_bitrate_kbps(), Some(256));
    }

    #[test]
    fn test_zero_channels_is_not_playable() {
        let json = br#"{"streams": [{"codec_type": "audio", "channels": 0}]}"#;
        let report = ProbeReport::from_json(json).unwrap();
        assert!(!report.has_playable_audio());
        assert_eq!(report.audio_bitrate_kbps(), None);

        let empty = ProbeReport::from_json(b"{}").unwrap();
        assert!(!empty.has_playable_audio());
    }

    #[test]
    fn test_garbage_output_is_parse_error() {
        let err = ProbeReport::from_json(b"not json").unwrap_err();
        assert!(matches!(err, ProbeError::Parse(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_missing_binary_is_transient() {
        let prober = FfprobeProber::new(
            "/nonexistent/songrec-ffprobe",
            Duration::from_secs(5),
        );
        let err = prober.probe(Path::new("/tmp/whatever.flac")).await.unwrap_err();
        assert!(matches!(err, ProbeError::Spawn(..)));
        assert!(err.is_transient());
    }
}
