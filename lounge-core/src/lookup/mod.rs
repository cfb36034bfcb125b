use log::warn;
use thiserror::Error;

use crate::Config;

mod invidious;
mod oembed;

/// The maximum number of results returned by a search.
pub const SEARCH_RESULT_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Resource was not found upstream")]
    NotFound,
    #[error("Failed to fetch resource: {0}")]
    FetchFailed(String),
    #[error("Failed to parse resource: {0}")]
    ParseFailed(String),
    #[error("All metadata providers failed: {0}")]
    AllProvidersFailed(String),
}

/// Metadata describing an upstream video. The id is opaque to the rest of
/// the system.
#[derive(Debug, Clone)]
pub struct VideoMetadata {
    pub external_id: String,
    pub title: String,
    pub thumbnail: String,
    pub channel_title: Option<String>,
}

/// Metadata describing an upstream playlist.
#[derive(Debug, Clone)]
pub struct PlaylistMetadata {
    pub playlist_id: String,
    pub title: String,
    pub video_count: usize,
    pub videos: Vec<VideoMetadata>,
}

/// Looks up video metadata from the configured providers, trying each in
/// order. A miss on one provider falls through to the next; a definite
/// not-found is returned as-is.
pub struct MetadataClient {
    http: reqwest::Client,
    providers: Vec<String>,
}

impl MetadataClient {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.lookup_timeout)
            .build()
            .expect("http client is built");

        Self {
            http,
            providers: config.lookup_providers.clone(),
        }
    }

    /// Searches for videos matching a query.
    pub async fn search(&self, query: &str) -> Result<Vec<VideoMetadata>, LookupError> {
        let mut last_error = None;

        for base in &self.providers {
            match invidious::search(&self.http, base, query).await {
                Ok(results) => return Ok(results),
                Err(LookupError::NotFound) => return Err(LookupError::NotFound),
                Err(e) => {
                    warn!("Metadata provider {base} failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        Err(all_failed(last_error))
    }

    /// Fetches the metadata of a single video. Falls back to the oEmbed
    /// endpoint when every configured provider fails.
    pub async fn video(&self, external_id: &str) -> Result<VideoMetadata, LookupError> {
        let mut last_error = None;

        for base in &self.providers {
            match invidious::video(&self.http, base, external_id).await {
                Ok(video) => return Ok(video),
                Err(LookupError::NotFound) => return Err(LookupError::NotFound),
                Err(e) => {
                    warn!("Metadata provider {base} failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        match oembed::video(&self.http, external_id).await {
            Ok(video) => Ok(video),
            Err(LookupError::NotFound) => Err(LookupError::NotFound),
            Err(e) => {
                warn!("oEmbed fallback failed: {e}");
                Err(all_failed(last_error.or(Some(e))))
            }
        }
    }

    /// Fetches a playlist, concatenating upstream pages.
    pub async fn playlist(&self, playlist_id: &str) -> Result<PlaylistMetadata, LookupError> {
        let mut last_error = None;

        for base in &self.providers {
            match invidious::playlist(&self.http, base, playlist_id).await {
                Ok(playlist) => return Ok(playlist),
                Err(LookupError::NotFound) => return Err(LookupError::NotFound),
                Err(e) => {
                    warn!("Metadata provider {base} failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        Err(all_failed(last_error))
    }
}

fn all_failed(last_error: Option<LookupError>) -> LookupError {
    LookupError::AllProvidersFailed(
        last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "No providers configured".to_string()),
    )
}
