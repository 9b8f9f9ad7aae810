//! Shazam recognition client (RapidAPI)
//!
//! Two endpoints are used:
//! - `POST /songs/v2/detect`: base64 raw mono PCM → candidate track
//! - `GET /songs/v2/get-details`: track id → enrichment attributes
//!
//! Response schemas keep every field optional; absent fields deserialize to
//! `None` or empty collections.

use crate::models::{lenient, MetadataRecord};
use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use songrec_common::config::RecognitionConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

const USER_AGENT: &str = concat!("songrec/", env!("CARGO_PKG_VERSION"));

/// Recognition client errors
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid API key")]
    InvalidApiKey,
}

/// Detect endpoint response; `track` absent means no match
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub track: Option<ShazamTrack>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShazamTrack {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub key: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Artist line
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub images: Option<TrackImages>,
    #[serde(default)]
    pub genres: Option<TrackGenres>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub track_number: Option<String>,
    #[serde(default)]
    pub sections: Vec<TrackSection>,
    #[serde(default)]
    pub hub: Option<TrackHub>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TrackImages {
    #[serde(default)]
    pub coverart: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TrackGenres {
    #[serde(default)]
    pub primary: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TrackSection {
    #[serde(rename = "type", default)]
    pub section_type: Option<String>,
    #[serde(default)]
    pub metadata: Vec<SectionMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SectionMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TrackHub {
    #[serde(default)]
    pub actions: Vec<HubAction>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HubAction {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,
}

/// Details endpoint response
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DetailsResponse {
    #[serde(default)]
    pub data: Vec<DetailsData>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DetailsData {
    #[serde(default)]
    pub attributes: Option<DetailsAttributes>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailsAttributes {
    #[serde(default)]
    pub composer_name: Option<String>,
    #[serde(default)]
    pub album_name: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub track_number: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub disc_number: Option<String>,
    #[serde(default)]
    pub artwork: Option<DetailsArtwork>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DetailsArtwork {
    #[serde(default)]
    pub url: Option<String>,
}

impl ShazamTrack {
    /// Track id used for the details lookup (`hub.actions[0].id`)
    pub fn track_id(&self) -> Option<&str> {
        self.hub.as_ref()?.actions.first()?.id.as_deref()
    }

    /// Text of a `SONG` section metadata entry by its title
    fn song_section_value(&self, title: &str) -> Option<String> {
        self.sections
            .iter()
            .filter(|s| s.section_type.as_deref() == Some("SONG"))
            .flat_map(|s| s.metadata.iter())
            .find(|m| m.title.as_deref() == Some(title))
            .and_then(|m| m.text.clone())
    }

    /// Fields available from the detect response alone
    pub fn primary_record(&self) -> MetadataRecord {
        MetadataRecord {
            title: self.title.clone(),
            artist: self.subtitle.clone(),
            album: self.song_section_value("Album"),
            album_artist: self.subtitle.clone(),
            composer: None,
            genre: self.genres.as_ref().and_then(|g| g.primary.clone()),
            year: self.song_section_value("Released"),
            track: Some(self.track_number.clone().unwrap_or_else(|| "1".to_string())),
            disc: Some("1".to_string()),
            artwork_url: self.images.as_ref().and_then(|i| i.coverart.clone()),
        }
    }
}

impl DetailsResponse {
    /// Enrichment fields; absent attributes stay `None`
    pub fn secondary_record(&self) -> MetadataRecord {
        let Some(attrs) = self.data.first().and_then(|d| d.attributes.as_ref()) else {
            return MetadataRecord::default();
        };

        MetadataRecord {
            composer: attrs.composer_name.clone(),
            album: attrs.album_name.clone(),
            year: attrs
                .release_date
                .as_deref()
                .and_then(|d| d.split('-').next())
                .filter(|y| !y.is_empty())
                .map(str::to_string),
            track: attrs.track_number.clone(),
            disc: attrs.disc_number.clone(),
            artwork_url: attrs.artwork.as_ref().and_then(|a| a.url.clone()),
            ..Default::default()
        }
    }
}

/// Recognition collaborator
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Submit a raw PCM sample; `Ok(None)` when nothing matched
    async fn detect(&self, sample: &[u8]) -> Result<Option<ShazamTrack>, RecognitionError>;

    /// Enrichment attributes for a matched track id
    async fn details(&self, track_id: &str) -> Result<DetailsResponse, RecognitionError>;
}

/// Minimum spacing between consecutive requests
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Recognition rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// RapidAPI Shazam client
pub struct ShazamClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    api_key: String,
    config: RecognitionConfig,
}

impl ShazamClient {
    pub fn new(api_key: String, config: RecognitionConfig) -> Result<Self, RecognitionError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RecognitionError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(config.min_request_interval_ms)),
            api_key,
            config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RecognitionError> {
        let status = response.status();

        if status == 401 || status == 403 {
            return Err(RecognitionError::InvalidApiKey);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RecognitionError::ApiError(status.as_u16(), error_text));
        }

        Ok(response)
    }
}

#[async_trait]
impl Recognizer for ShazamClient {
    async fn detect(&self, sample: &[u8]) -> Result<Option<ShazamTrack>, RecognitionError> {
        self.rate_limiter.wait().await;

        let payload = base64::engine::general_purpose::STANDARD.encode(sample);

        tracing::debug!(sample_bytes = sample.len(), "Submitting sample to recognition API");

        let response = self
            .http_client
            .post(self.url("songs/v2/detect"))
            .query(&[
                ("timezone", self.config.timezone.as_str()),
                ("locale", self.config.locale.as_str()),
            ])
            .header("content-type", "text/plain")
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.config.host)
            .body(payload)
            .send()
            .await
            .map_err(|e| RecognitionError::NetworkError(e.to_string()))?;

        let detect: DetectResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| RecognitionError::ParseError(e.to_string()))?;

        if let Some(track) = &detect.track {
            tracing::info!(
                title = track.title.as_deref().unwrap_or(""),
                artist = track.subtitle.as_deref().unwrap_or(""),
                track_id = track.track_id().unwrap_or(""),
                "Recognition match"
            );
        }

        Ok(detect.track)
    }

    async fn details(&self, track_id: &str) -> Result<DetailsResponse, RecognitionError> {
        self.rate_limiter.wait().await;

        let response = self
            .http_client
            .get(self.url("songs/v2/get-details"))
            .query(&[("id", track_id), ("l", self.config.locale.as_str())])
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.config.host)
            .send()
            .await
            .map_err(|e| RecognitionError::NetworkError(e.to_string()))?;

        Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| RecognitionError::ParseError(e.to_string()))
    }
}
