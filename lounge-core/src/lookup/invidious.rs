use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{LookupError, PlaylistMetadata, VideoMetadata, SEARCH_RESULT_LIMIT};

/// How many upstream pages a playlist fetch will walk before giving up.
const PLAYLIST_PAGE_LIMIT: usize = 10;

/// The hard cap on concatenated playlist entries.
const PLAYLIST_VIDEO_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvidiousVideo {
    video_id: String,
    title: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    video_thumbnails: Vec<InvidiousThumbnail>,
}

#[derive(Debug, Deserialize)]
struct InvidiousThumbnail {
    #[serde(default)]
    quality: Option<String>,
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvidiousPlaylist {
    title: String,
    #[serde(default)]
    video_count: Option<usize>,
    #[serde(default)]
    videos: Vec<InvidiousVideo>,
}

pub(super) async fn search(
    http: &Client,
    base: &str,
    query: &str,
) -> Result<Vec<VideoMetadata>, LookupError> {
    let url = format!("{base}/api/v1/search");

    let results: Vec<InvidiousVideo> = get_json(
        http.get(url).query(&[("q", query), ("type", "video")]),
    )
    .await?;

    Ok(results
        .into_iter()
        .take(SEARCH_RESULT_LIMIT)
        .map(Into::into)
        .collect())
}

pub(super) async fn video(
    http: &Client,
    base: &str,
    external_id: &str,
) -> Result<VideoMetadata, LookupError> {
    let url = format!("{base}/api/v1/videos/{external_id}");

    let video: InvidiousVideo = get_json(http.get(url)).await?;
    Ok(video.into())
}

pub(super) async fn playlist(
    http: &Client,
    base: &str,
    playlist_id: &str,
) -> Result<PlaylistMetadata, LookupError> {
    let url = format!("{base}/api/v1/playlists/{playlist_id}");

    let mut title = None;
    let mut video_count = None;
    let mut videos: Vec<VideoMetadata> = vec![];

    for page in 1..=PLAYLIST_PAGE_LIMIT {
        let playlist: InvidiousPlaylist =
            get_json(http.get(&url).query(&[("page", page.to_string())])).await?;

        title.get_or_insert(playlist.title);
        video_count = video_count.or(playlist.video_count);

        if playlist.videos.is_empty() {
            break;
        }

        videos.extend(playlist.videos.into_iter().map(VideoMetadata::from));

        if videos.len() >= PLAYLIST_VIDEO_LIMIT {
            videos.truncate(PLAYLIST_VIDEO_LIMIT);
            break;
        }
    }

    Ok(PlaylistMetadata {
        playlist_id: playlist_id.to_string(),
        title: title.unwrap_or_default(),
        video_count: video_count.unwrap_or(videos.len()),
        videos,
    })
}

async fn get_json<T>(request: reqwest::RequestBuilder) -> Result<T, LookupError>
where
    T: serde::de::DeserializeOwned,
{
    let response = request
        .send()
        .await
        .map_err(|e| LookupError::FetchFailed(e.to_string()))?;

    if response.status() == StatusCode::NOT_FOUND {
        return Err(LookupError::NotFound);
    }

    let response = response
        .error_for_status()
        .map_err(|e| LookupError::FetchFailed(e.to_string()))?;

    response
        .json()
        .await
        .map_err(|e| LookupError::ParseFailed(e.to_string()))
}

impl From<InvidiousVideo> for VideoMetadata {
    fn from(video: InvidiousVideo) -> Self {
        let thumbnail = pick_thumbnail(&video.video_thumbnails)
            .unwrap_or_else(|| format!("https://i.ytimg.com/vi/{}/mqdefault.jpg", video.video_id));

        VideoMetadata {
            external_id: video.video_id,
            title: video.title,
            thumbnail,
            channel_title: video.author,
        }
    }
}

/// Prefers the medium thumbnail, which is what the playlist UI renders.
fn pick_thumbnail(thumbnails: &[InvidiousThumbnail]) -> Option<String> {
    thumbnails
        .iter()
        .find(|t| t.quality.as_deref() == Some("medium"))
        .or_else(|| thumbnails.first())
        .map(|t| t.url.clone())
}
