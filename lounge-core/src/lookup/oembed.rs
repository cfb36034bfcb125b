use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{LookupError, VideoMetadata};

const OEMBED_URL: &str = "https://www.youtube.com/oembed";

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    title: String,
    #[serde(default)]
    author_name: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
}

/// Fetches single-video metadata via the oEmbed endpoint.
///
/// Less detailed than the primary providers, but served by the upstream
/// platform itself, so it tends to be available when the others are not.
pub(super) async fn video(http: &Client, external_id: &str) -> Result<VideoMetadata, LookupError> {
    let watch_url = format!("https://www.youtube.com/watch?v={external_id}");

    let response = http
        .get(OEMBED_URL)
        .query(&[("url", watch_url.as_str()), ("format", "json")])
        .send()
        .await
        .map_err(|e| LookupError::FetchFailed(e.to_string()))?;

    // The endpoint answers 401 for private or deleted videos
    if matches!(
        response.status(),
        StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
    ) {
        return Err(LookupError::NotFound);
    }

    let response = response
        .error_for_status()
        .map_err(|e| LookupError::FetchFailed(e.to_string()))?;

    let embed: OEmbedResponse = response
        .json()
        .await
        .map_err(|e| LookupError::ParseFailed(e.to_string()))?;

    Ok(VideoMetadata {
        external_id: external_id.to_string(),
        title: embed.title,
        thumbnail: embed
            .thumbnail_url
            .unwrap_or_else(|| format!("https://i.ytimg.com/vi/{external_id}/mqdefault.jpg")),
        channel_title: embed.author_name,
    })
}
