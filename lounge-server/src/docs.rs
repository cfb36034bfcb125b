use axum::{response::IntoResponse, Json};
use utoipa::OpenApi;

use crate::{media, rooms, serialized};

#[derive(OpenApi)]
#[openapi(
    info(description = "lounge-server exposes endpoints to interact with this lounge instance"),
    paths(
        rooms::create_room,
        rooms::list_rooms,
        rooms::get_room,
        media::search,
        media::video,
        media::playlist,
    ),
    components(schemas(
        serialized::Room,
        serialized::Video,
        serialized::RoomWithVideos,
        serialized::SearchResult,
        serialized::Playlist,
        rooms::RoomResponse,
        rooms::RoomDetailResponse,
        rooms::RoomListResponse,
        media::SearchResponse,
        media::VideoResponse,
    ))
)]
pub struct ApiDoc;

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
