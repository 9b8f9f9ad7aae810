//! In-process fakes for the pipeline collaborators
//!
//! Test files are small text files made of `key=value` lines:
//! - `bitrate=256000`: probe reports a stereo audio stream at that rate
//! - `corrupt`: probe succeeds but reports no audio stream
//! - `probe-timeout`: probe times out (transient)
//! - `transcode-fail`: ffmpeg exits non-zero
//! - `short`: sample at a non-zero offset comes back empty
//! - `song=<id>`: recognition key returned as the sample payload
//! - `tag-fail`: tag write fails
//! - `vanish=<name>`: probing deletes `<name>` from the same folder
//! - `tag.<field>=<value>`: tags stored "in" the file
//!
//! Everything a fake knows travels inside the file, so it follows the file
//! across relocations.

use async_trait::async_trait;
use songrec::models::{MetadataField, MetadataRecord};
use songrec::services::{
    DetailsResponse, ProbeError, ProbeReport, Prober, RecognitionError, Recognizer, SampleSpec,
    ShazamTrack, TagError, TagWriter, TranscodeError, TranscodeMode, Transcoder,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

fn lines(content: &str) -> impl Iterator<Item = &str> {
    content.lines().map(str::trim).filter(|l| !l.is_empty())
}

fn marker<'a>(content: &'a str, key: &str) -> Option<&'a str> {
    lines(content).find_map(|l| l.strip_prefix(key)?.strip_prefix('='))
}

fn has_flag(content: &str, flag: &str) -> bool {
    lines(content).any(|l| l == flag)
}

#[derive(Default)]
pub struct FakeProber {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Prober for FakeProber {
    async fn probe(&self, path: &Path) -> Result<ProbeReport, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ProbeError::Failed {
                status: 1,
                stderr: e.to_string(),
            })?;

        if let Some(name) = marker(&content, "vanish") {
            let _ = std::fs::remove_file(path.with_file_name(name));
        }

        if has_flag(&content, "probe-timeout") {
            return Err(ProbeError::Timeout(Duration::from_secs(30)));
        }
        if has_flag(&content, "corrupt") {
            return ProbeReport::from_json(br#"{"streams": [], "format": {}}"#);
        }

        let bit_rate = marker(&content, "bitrate").unwrap_or("N/A");
        let json = format!(
            r#"{{"streams": [{{"codec_type": "audio", "channels": 2, "bit_rate": "{}"}}]}}"#,
            bit_rate
        );
        ProbeReport::from_json(json.as_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeCall {
    pub input: PathBuf,
    pub output: PathBuf,
    pub mode: TranscodeMode,
}

#[derive(Default)]
pub struct FakeTranscoder {
    pub calls: Mutex<Vec<TranscodeCall>>,
    pub samples: Mutex<Vec<SampleSpec>>,
}

impl FakeTranscoder {
    pub fn calls(&self) -> Vec<TranscodeCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        mode: TranscodeMode,
    ) -> Result<(), TranscodeError> {
        self.calls.lock().unwrap().push(TranscodeCall {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            mode,
        });

        let content = tokio::fs::read_to_string(input)
            .await
            .map_err(|e| TranscodeError::Failed {
                status: 1,
                stderr: e.to_string(),
            })?;

        if has_flag(&content, "transcode-fail") {
            return Err(TranscodeError::Failed {
                status: 1,
                stderr: "Invalid data found when processing input".to_string(),
            });
        }

        let converted = match mode {
            TranscodeMode::StreamCopy => content,
            TranscodeMode::Mp3 { bitrate_kbps } => {
                let mut out: Vec<String> = lines(&content)
                    .filter(|l| !l.starts_with("bitrate="))
                    .map(str::to_string)
                    .collect();
                out.push(format!("bitrate={}", bitrate_kbps * 1000));
                out.join("\n")
            }
        };

        tokio::fs::write(output, converted)
            .await
            .map_err(|e| TranscodeError::Failed {
                status: 1,
                stderr: e.to_string(),
            })
    }

    async fn extract_sample(
        &self,
        input: &Path,
        spec: SampleSpec,
    ) -> Result<Vec<u8>, TranscodeError> {
        self.samples.lock().unwrap().push(spec);

        let content = tokio::fs::read_to_string(input)
            .await
            .map_err(|e| TranscodeError::Failed {
                status: 1,
                stderr: e.to_string(),
            })?;

        if has_flag(&content, "short") && spec.offset_secs > 0 {
            return Ok(Vec::new());
        }
        Ok(marker(&content, "song").unwrap_or("").as_bytes().to_vec())
    }
}

/// Recognition keyed by the `song=` marker
#[derive(Default)]
pub struct FakeRecognizer {
    tracks: Mutex<HashMap<String, ShazamTrack>>,
    details: Mutex<HashMap<String, DetailsResponse>>,
    pub detect_calls: AtomicUsize,
}

impl FakeRecognizer {
    /// Register a match for `song` with track id `id`
    pub fn register(&self, song: &str, title: &str, artist: &str, id: &str) {
        let track: ShazamTrack = serde_json::from_value(serde_json::json!({
            "title": title,
            "subtitle": artist,
            "hub": {"actions": [{"id": id}]}
        }))
        .unwrap();
        self.tracks.lock().unwrap().insert(song.to_string(), track);
    }

    pub fn register_details(&self, id: &str, attributes: serde_json::Value) {
        let details: DetailsResponse =
            serde_json::from_value(serde_json::json!({"data": [{"attributes": attributes}]}))
                .unwrap();
        self.details.lock().unwrap().insert(id.to_string(), details);
    }
}

#[async_trait]
impl Recognizer for FakeRecognizer {
    async fn detect(&self, sample: &[u8]) -> Result<Option<ShazamTrack>, RecognitionError> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        let key = String::from_utf8_lossy(sample).to_string();
        if key == "network-down" {
            return Err(RecognitionError::NetworkError("connection refused".to_string()));
        }
        Ok(self.tracks.lock().unwrap().get(&key).cloned())
    }

    async fn details(&self, track_id: &str) -> Result<DetailsResponse, RecognitionError> {
        self.details
            .lock()
            .unwrap()
            .get(track_id)
            .cloned()
            .ok_or_else(|| RecognitionError::ApiError(404, "not found".to_string()))
    }
}

/// Stores tags as `tag.<field>=<value>` lines inside the file
#[derive(Default)]
pub struct FakeTagWriter {
    pub writes: AtomicUsize,
}

impl FakeTagWriter {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

/// Parse `tag.` lines back into a record
pub fn stored_tags(content: &str) -> MetadataRecord {
    let mut record = MetadataRecord::default();
    for field in MetadataField::ALL.into_iter().filter(|f| f.is_tag()) {
        let key = format!("tag.{}", field.as_str());
        if let Some(value) = marker(content, &key) {
            record.set(field, Some(value.to_string()));
        }
    }
    record
}

#[async_trait]
impl TagWriter for FakeTagWriter {
    async fn read_tags(&self, path: &Path) -> Result<MetadataRecord, TagError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TagError::Read(path.to_path_buf(), e.to_string()))?;
        Ok(stored_tags(&content))
    }

    async fn write_tags(
        &self,
        path: &Path,
        record: &MetadataRecord,
        artwork: Option<Vec<u8>>,
    ) -> Result<(), TagError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TagError::Write(path.to_path_buf(), e.to_string()))?;

        if has_flag(&content, "tag-fail") {
            return Err(TagError::Write(path.to_path_buf(), "read-only file".to_string()));
        }

        let mut out: Vec<String> = lines(&content)
            .filter(|l| !l.starts_with("tag."))
            .map(str::to_string)
            .collect();
        for (field, value) in record.fields().filter(|(f, _)| f.is_tag()) {
            out.push(format!("tag.{}={}", field.as_str(), value));
        }
        if let Some(bytes) = artwork {
            out.push(format!("cover_bytes={}", bytes.len()));
        }

        tokio::fs::write(path, out.join("\n"))
            .await
            .map_err(|e| TagError::Write(path.to_path_buf(), e.to_string()))?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
