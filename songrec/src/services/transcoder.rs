//! Transcode and sample extraction via `ffmpeg`

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Transcoder errors
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Failed to spawn {0}: {1}")]
    Spawn(String, String),

    #[error("Transcode timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transcode failed with status {status}: {stderr}")]
    Failed { status: i32, stderr: String },

    /// Process succeeded but produced no file
    #[error("Transcode produced no output at {0}")]
    MissingOutput(PathBuf),
}

/// How the output is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeMode {
    /// Remux the audio stream without re-encoding
    StreamCopy,
    /// Encode the audio stream to MP3 at a constant bitrate
    Mp3 { bitrate_kbps: u32 },
}

/// Fingerprint sample window and format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSpec {
    pub offset_secs: u32,
    pub duration_secs: u32,
    pub sample_rate: u32,
}

/// Transcoding collaborator
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Write `input` to `output` using `mode`
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        mode: TranscodeMode,
    ) -> Result<(), TranscodeError>;

    /// Raw signed 16-bit little-endian mono PCM for the sample window
    async fn extract_sample(&self, input: &Path, spec: SampleSpec)
        -> Result<Vec<u8>, TranscodeError>;
}

/// `ffmpeg` subprocess transcoder
pub struct FfmpegTranscoder {
    binary: PathBuf,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    async fn run(&self, args: Vec<OsString>) -> Result<Vec<u8>, TranscodeError> {
        let mut command = Command::new(&self.binary);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(TranscodeError::Spawn(
                    self.binary.display().to_string(),
                    e.to_string(),
                ))
            }
            Err(_) => return Err(TranscodeError::Timeout(self.timeout)),
        };

        if !output.status.success() {
            return Err(TranscodeError::Failed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

/// ffmpeg arguments for a file-to-file transcode
pub fn transcode_args(input: &Path, output: &Path, mode: TranscodeMode) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-nostdin", "-n", "-v", "error", "-i"]
        .iter()
        .map(OsString::from)
        .collect();
    args.push(input.as_os_str().to_owned());

    match mode {
        TranscodeMode::StreamCopy => {
            args.extend(["-vn", "-acodec", "copy"].map(OsString::from));
        }
        TranscodeMode::Mp3 { bitrate_kbps } => {
            args.extend(["-map", "0:a:0", "-acodec", "libmp3lame", "-b:a"].map(OsString::from));
            args.push(format!("{}k", bitrate_kbps).into());
        }
    }

    args.push(output.as_os_str().to_owned());
    args
}

/// ffmpeg arguments for a mono PCM sample written to stdout
pub fn sample_args(input: &Path, spec: SampleSpec) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-nostdin".into(),
        "-v".into(),
        "error".into(),
        "-ss".into(),
        spec.offset_secs.to_string().into(),
        "-t".into(),
        spec.duration_secs.to_string().into(),
        "-i".into(),
    ];
    args.push(input.as_os_str().to_owned());
    args.extend(
        ["-vn", "-ac", "1", "-ar"]
            .iter()
            .map(OsString::from),
    );
    args.push(spec.sample_rate.to_string().into());
    args.extend(
        ["-f", "s16le", "-acodec", "pcm_s16le", "pipe:1"]
            .iter()
            .map(OsString::from),
    );
    args
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        mode: TranscodeMode,
    ) -> Result<(), TranscodeError> {
        tracing::debug!(
            input = %input.display(),
            output = %output.display(),
            mode = ?mode,
            "Running ffmpeg transcode"
        );

        self.run(transcode_args(input, output, mode)).await?;

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(TranscodeError::MissingOutput(output.to_path_buf()));
        }
        Ok(())
    }

    async fn extract_sample(
        &self,
        input: &Path,
        spec: SampleSpec,
    ) -> Result<Vec<u8>, TranscodeError> {
        self.run(sample_args(input, spec)).await
    }
}
