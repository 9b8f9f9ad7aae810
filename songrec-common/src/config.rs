//! Configuration loading and folder table resolution
//!
//! Bootstrap configuration is a single TOML file. Every section is optional;
//! missing sections fall back to built-in defaults that mirror the classic
//! `input_files/` + `output_files/` layout.
//!
//! # Config file priority
//!
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`SONGREC_CONFIG`)
//! 3. `<config_dir>/songrec/config.toml`
//! 4. Built-in defaults rooted at the current directory
//!
//! Relative folder paths are resolved against the directory containing the
//! config file (or the current directory when running on defaults).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SONGREC_CONFIG";

/// Environment variable overriding the recognition API key
pub const API_KEY_ENV_VAR: &str = "SONGREC_API_KEY";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Folder table (one folder per persisted state)
    #[serde(default)]
    pub folders: FolderConfig,

    /// Recognition service settings
    #[serde(default)]
    pub recognition: RecognitionConfig,

    /// Subprocess timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Pipeline tuning
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// External tool locations
    #[serde(default)]
    pub tools: ToolConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// File this configuration was read from; `None` for built-in defaults
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Folder paths for every persisted state
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FolderConfig {
    /// Incoming, unprocessed files
    pub raw: PathBuf,
    /// Holding area for video files
    pub video: PathBuf,
    /// Converted MP3 files awaiting identification
    pub converted: PathBuf,
    /// Original sources kept after a successful conversion
    pub archive: PathBuf,
    /// Finalized, tagged and renamed files
    pub success: PathBuf,
    /// Scratch space for partial transcodes and intermediates
    pub temp: PathBuf,
    /// One quarantine folder per failure kind
    pub quarantine: QuarantineConfig,
}

/// Quarantine folders, one per terminal failure state
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct QuarantineConfig {
    pub corrupt: PathBuf,
    pub unsupported: PathBuf,
    pub conversion_failed: PathBuf,
    pub identification_failed: PathBuf,
    pub tagging_failed: PathBuf,
}

impl Default for FolderConfig {
    fn default() -> Self {
        let input = PathBuf::from("input_files");
        let output = PathBuf::from("output_files").join("song_detection");
        Self {
            raw: input.join("audio_files"),
            video: input.join("video_files"),
            converted: input.join("processed_files"),
            archive: input.join("original_files"),
            success: output.join("success"),
            temp: PathBuf::from("temp_files"),
            quarantine: QuarantineConfig::default(),
        }
    }
}

impl Default for QuarantineConfig {
    fn default() -> Self {
        let errors = PathBuf::from("input_files").join("error_files");
        let failed = PathBuf::from("output_files").join("song_detection");
        Self {
            corrupt: errors.join("corrupt"),
            unsupported: errors.join("unsupported"),
            conversion_failed: errors.join("conversion_failed"),
            identification_failed: failed.join("failed"),
            tagging_failed: failed.join("tagging_failed"),
        }
    }
}

impl FolderConfig {
    /// Resolve every relative folder against `base`
    pub fn resolve_against(&self, base: &Path) -> Self {
        let abs = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                base.join(p)
            }
        };
        Self {
            raw: abs(&self.raw),
            video: abs(&self.video),
            converted: abs(&self.converted),
            archive: abs(&self.archive),
            success: abs(&self.success),
            temp: abs(&self.temp),
            quarantine: QuarantineConfig {
                corrupt: abs(&self.quarantine.corrupt),
                unsupported: abs(&self.quarantine.unsupported),
                conversion_failed: abs(&self.quarantine.conversion_failed),
                identification_failed: abs(&self.quarantine.identification_failed),
                tagging_failed: abs(&self.quarantine.tagging_failed),
            },
        }
    }

    /// All configured folders with a label, in a stable order
    pub fn labelled(&self) -> Vec<(&'static str, &Path)> {
        vec![
            ("raw", self.raw.as_path()),
            ("video", self.video.as_path()),
            ("converted", self.converted.as_path()),
            ("archive", self.archive.as_path()),
            ("success", self.success.as_path()),
            ("temp", self.temp.as_path()),
            ("quarantine.corrupt", self.quarantine.corrupt.as_path()),
            ("quarantine.unsupported", self.quarantine.unsupported.as_path()),
            (
                "quarantine.conversion_failed",
                self.quarantine.conversion_failed.as_path(),
            ),
            (
                "quarantine.identification_failed",
                self.quarantine.identification_failed.as_path(),
            ),
            (
                "quarantine.tagging_failed",
                self.quarantine.tagging_failed.as_path(),
            ),
        ]
    }
}

/// Recognition service settings (RapidAPI Shazam)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// API credential; `SONGREC_API_KEY` takes precedence
    pub api_key: Option<String>,
    /// Base URL of the recognition API
    pub base_url: String,
    /// Value of the `X-RapidAPI-Host` header
    pub host: String,
    pub locale: String,
    pub timezone: String,
    /// Upper bound for a single HTTP request
    pub request_timeout_secs: u64,
    /// Minimum spacing between consecutive requests
    pub min_request_interval_ms: u64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://shazam.p.rapidapi.com".to_string(),
            host: "shazam.p.rapidapi.com".to_string(),
            locale: "en-US".to_string(),
            timezone: "America/Chicago".to_string(),
            request_timeout_secs: 15,
            min_request_interval_ms: 250,
        }
    }
}

impl RecognitionConfig {
    /// Resolve the API key: environment first, then TOML
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV_VAR) {
            if is_valid_key(&key) {
                info!("Recognition API key loaded from environment variable");
                return Some(key);
            }
        }

        match &self.api_key {
            Some(key) if is_valid_key(key) => {
                info!("Recognition API key loaded from TOML config");
                Some(key.clone())
            }
            _ => None,
        }
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Subprocess timeouts in seconds
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub probe_secs: u64,
    pub transcode_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            probe_secs: 30,
            transcode_secs: 300,
        }
    }
}

/// Pipeline tuning knobs
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Number of files processed concurrently
    pub workers: usize,
    /// Offset of the fingerprint sample from the start of the file
    pub sample_offset_secs: u32,
    /// Length of the fingerprint sample
    pub sample_duration_secs: u32,
    /// Sample rate of the mono fingerprint payload
    pub sample_rate: u32,
    /// Ceiling for the transcode bitrate
    pub max_bitrate_kbps: u32,
    /// Edge length substituted into artwork URL templates
    pub artwork_size: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            sample_offset_secs: 20,
            sample_duration_secs: 5,
            sample_rate: 44_100,
            max_bitrate_kbps: 320,
            artwork_size: 2400,
        }
    }
}

/// External tool binaries
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolConfig {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr only if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl TomlConfig {
    /// Parse TOML content and resolve relative folders against `base_dir`
    pub fn from_toml_str(content: &str, base_dir: &Path) -> Result<Self> {
        let mut config: TomlConfig = toml::from_str(content)?;
        config.folders = config.folders.resolve_against(base_dir);
        if let Some(file) = &config.logging.file {
            if file.is_relative() {
                config.logging.file = Some(base_dir.join(file));
            }
        }
        Ok(config)
    }

    /// Built-in defaults rooted at `base_dir`
    pub fn defaults_at(base_dir: &Path) -> Self {
        let mut config = TomlConfig::default();
        config.folders = config.folders.resolve_against(base_dir);
        config
    }
}

/// Config file location following the documented priority order
///
/// Returns the path and whether it was named explicitly (CLI or ENV).
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<(PathBuf, bool)> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some((path.to_path_buf(), true));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some((PathBuf::from(path), true));
        }
    }

    // Priority 3: Per-user config directory
    dirs::config_dir()
        .map(|d| d.join("songrec").join("config.toml"))
        .map(|p| (p, false))
}

/// Load bootstrap configuration
///
/// An explicitly named config file that cannot be read is fatal. A missing
/// default config file is not: defaults rooted at the current directory are
/// used and `source` stays `None`. Nothing is logged here since this runs
/// before the tracing subscriber exists.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let cwd = std::env::current_dir()?;

    match resolve_config_path(cli_arg) {
        Some((path, explicit)) if explicit || path.exists() => {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
            })?;
            let base_dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or(cwd);
            let mut config = TomlConfig::from_toml_str(&content, &base_dir)?;
            config.source = Some(path);
            Ok(config)
        }
        _ => Ok(TomlConfig::defaults_at(&cwd)),
    }
}
