//! Cover art download

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtworkError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("HTTP error {0}")]
    HttpError(u16),

    #[error("Empty artwork body")]
    Empty,
}

/// Fetches cover art bytes for embedding
#[async_trait]
pub trait ArtworkFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ArtworkError>;
}

/// Replace `{w}` / `{h}` size placeholders in an artwork URL template
pub fn expand_artwork_url(template: &str, size: u32) -> String {
    let size = size.to_string();
    template.replace("{w}", &size).replace("{h}", &size)
}

pub struct HttpArtworkFetcher {
    http_client: reqwest::Client,
}

impl HttpArtworkFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ArtworkError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ArtworkError::NetworkError(e.to_string()))?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl ArtworkFetcher for HttpArtworkFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ArtworkError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ArtworkError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ArtworkError::HttpError(response.status().as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ArtworkError::NetworkError(e.to_string()))?;
        if bytes.is_empty() {
            return Err(ArtworkError::Empty);
        }

        tracing::debug!(url, bytes = bytes.len(), "Artwork downloaded");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_template() {
        assert_eq!(
            expand_artwork_url("https://img.example/{w}x{h}bb.jpg", 2400),
            "https://img.example/2400x2400bb.jpg"
        );
        assert_eq!(
            expand_artwork_url("https://img.example/400x400cc.jpg", 2400),
            "https://img.example/400x400cc.jpg"
        );
    }
}
