use axum::{
    extract::Path,
    http::StatusCode,
    routing::{get, post},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use lounge_core::{is_room_code, Database};

use crate::{
    context::ServerContext,
    errors::{ServerError, ServerResult},
    serialized::{Room, RoomWithVideos, ToSerialized},
    Router,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct RoomResponse {
    room: Room,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoomDetailResponse {
    room: RoomWithVideos,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoomListResponse {
    rooms: Vec<Room>,
}

#[utoipa::path(
    post,
    path = "/api/rooms",
    tag = "rooms",
    responses(
        (status = 201, body = RoomResponse)
    )
)]
pub(crate) async fn create_room<Db: Database>(
    context: ServerContext<Db>,
) -> ServerResult<(StatusCode, Json<RoomResponse>)> {
    let room = context.coordinator.rooms.create_room().await?;

    Ok((
        StatusCode::CREATED,
        Json(RoomResponse {
            room: room.to_serialized(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/rooms",
    tag = "rooms",
    responses(
        (status = 200, body = RoomListResponse)
    )
)]
pub(crate) async fn list_rooms<Db: Database>(
    context: ServerContext<Db>,
) -> ServerResult<Json<RoomListResponse>> {
    let rooms = context.coordinator.rooms.list_rooms().await?;

    Ok(Json(RoomListResponse {
        rooms: rooms.to_serialized(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/rooms/{code}",
    tag = "rooms",
    responses(
        (status = 200, body = RoomDetailResponse),
        (status = 404, description = "No room exists with this code")
    )
)]
pub(crate) async fn get_room<Db: Database>(
    context: ServerContext<Db>,
    Path(code): Path<String>,
) -> ServerResult<Json<RoomDetailResponse>> {
    let code = code.to_uppercase();

    if !is_room_code(&code) {
        return Err(ServerError::RoomNotFound);
    }

    let room = context.coordinator.rooms.room_with_videos(&code).await?;

    Ok(Json(RoomDetailResponse {
        room: room.to_serialized(),
    }))
}

pub fn router<Db>() -> Router<Db>
where
    Db: Database,
{
    Router::new()
        .route("/", post(create_room::<Db>))
        .route("/", get(list_rooms::<Db>))
        .route("/:code", get(get_room::<Db>))
}
