use axum::{extract::Query, routing::get, Json};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use lounge_core::Database;

use crate::{
    context::ServerContext,
    errors::ServerResult,
    serialized::{Playlist, SearchResult, ToSerialized},
    Router,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// The search terms
    q: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MediaQuery {
    /// The opaque id of the upstream resource
    id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VideoResponse {
    result: SearchResult,
}

#[utoipa::path(
    get,
    path = "/api/media/search",
    tag = "media",
    params(SearchQuery),
    responses(
        (status = 200, body = SearchResponse)
    )
)]
pub(crate) async fn search<Db: Database>(
    context: ServerContext<Db>,
    Query(query): Query<SearchQuery>,
) -> ServerResult<Json<SearchResponse>> {
    let results = context.coordinator.lookup.search(&query.q).await?;

    Ok(Json(SearchResponse {
        results: results.to_serialized(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/media/video",
    tag = "media",
    params(MediaQuery),
    responses(
        (status = 200, body = VideoResponse),
        (status = 404, description = "The video does not exist upstream")
    )
)]
pub(crate) async fn video<Db: Database>(
    context: ServerContext<Db>,
    Query(query): Query<MediaQuery>,
) -> ServerResult<Json<VideoResponse>> {
    let result = context.coordinator.lookup.video(&query.id).await?;

    Ok(Json(VideoResponse {
        result: result.to_serialized(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/media/playlist",
    tag = "media",
    params(MediaQuery),
    responses(
        (status = 200, body = Playlist),
        (status = 404, description = "The playlist does not exist upstream")
    )
)]
pub(crate) async fn playlist<Db: Database>(
    context: ServerContext<Db>,
    Query(query): Query<MediaQuery>,
) -> ServerResult<Json<Playlist>> {
    let playlist = context.coordinator.lookup.playlist(&query.id).await?;

    Ok(Json(playlist.to_serialized()))
}

pub fn router<Db>() -> Router<Db>
where
    Db: Database,
{
    Router::new()
        .route("/search", get(search::<Db>))
        .route("/video", get(video::<Db>))
        .route("/playlist", get(playlist::<Db>))
}
