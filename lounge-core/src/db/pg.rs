use sqlx::{postgres::PgPoolOptions, query, query_as, Error as SqlxError, PgPool};

use super::IntoDatabaseError;
use crate::{
    Database, DatabaseError, DatabaseResult, NewVideo, PlaybackUpdate, PrimaryKey, RoomData,
    VideoData,
};

use async_trait::async_trait;

// `current_time` is a reserved word in SQL, so the column is always quoted.
const ROOM_COLUMNS: &str =
    r#"id, code, current_video_id, is_playing, "current_time", created_at, updated_at"#;

const VIDEO_COLUMNS: &str =
    "id, room_id, external_id, title, thumbnail_url, added_by, is_played, position, created_at";

/// A postgres database implementation for lounge
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Connects to the database and applies pending migrations.
    pub async fn new(url: &str) -> DatabaseResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| e.any())?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn create_room(&self, code: &str) -> DatabaseResult<RoomData> {
        let sql = format!("INSERT INTO rooms (code) VALUES ($1) RETURNING {ROOM_COLUMNS}");

        query_as::<_, RoomData>(&sql)
            .bind(code)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match &e {
                SqlxError::Database(inner) if inner.is_unique_violation() => {
                    DatabaseError::Conflict {
                        resource: "room",
                        field: "code",
                        value: code.to_string(),
                    }
                }
                _ => e.any(),
            })
    }

    async fn room_by_code(&self, code: &str) -> DatabaseResult<RoomData> {
        let sql = format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE code = $1");

        query_as::<_, RoomData>(&sql)
            .bind(code)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("room", code))
    }

    async fn list_rooms(&self) -> DatabaseResult<Vec<RoomData>> {
        let sql = format!("SELECT {ROOM_COLUMNS} FROM rooms ORDER BY created_at");

        query_as::<_, RoomData>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn update_playback(
        &self,
        room_id: PrimaryKey,
        update: PlaybackUpdate,
    ) -> DatabaseResult<()> {
        let result = query(
            r#"UPDATE rooms SET
                current_video_id = $1,
                is_playing = $2,
                "current_time" = $3,
                updated_at = now()
            WHERE id = $4"#,
        )
        .bind(&update.current_video_id)
        .bind(update.is_playing)
        .bind(update.current_time)
        .bind(room_id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "room",
                identifier: room_id.to_string(),
            });
        }

        Ok(())
    }

    async fn videos_by_room(&self, room_id: PrimaryKey) -> DatabaseResult<Vec<VideoData>> {
        let sql = format!(
            "SELECT {VIDEO_COLUMNS} FROM videos
            WHERE room_id = $1
            ORDER BY position, created_at, id"
        );

        query_as::<_, VideoData>(&sql)
            .bind(room_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn create_video(&self, new_video: NewVideo) -> DatabaseResult<VideoData> {
        let sql = format!(
            "INSERT INTO videos (room_id, external_id, title, thumbnail_url, added_by, position)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {VIDEO_COLUMNS}"
        );

        query_as::<_, VideoData>(&sql)
            .bind(new_video.room_id)
            .bind(&new_video.external_id)
            .bind(&new_video.title)
            .bind(&new_video.thumbnail_url)
            .bind(&new_video.added_by)
            .bind(new_video.position)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn create_videos(&self, new_videos: Vec<NewVideo>) -> DatabaseResult<Vec<VideoData>> {
        let sql = format!(
            "INSERT INTO videos (room_id, external_id, title, thumbnail_url, added_by, position)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {VIDEO_COLUMNS}"
        );

        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;
        let mut created = Vec::with_capacity(new_videos.len());

        for new_video in new_videos {
            let video = query_as::<_, VideoData>(&sql)
                .bind(new_video.room_id)
                .bind(&new_video.external_id)
                .bind(&new_video.title)
                .bind(&new_video.thumbnail_url)
                .bind(&new_video.added_by)
                .bind(new_video.position)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| e.any())?;

            created.push(video);
        }

        tx.commit().await.map_err(|e| e.any())?;

        Ok(created)
    }

    async fn delete_video(&self, video_id: PrimaryKey) -> DatabaseResult<()> {
        let result = query("DELETE FROM videos WHERE id = $1")
            .bind(video_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "video",
                identifier: video_id.to_string(),
            });
        }

        Ok(())
    }

    async fn set_video_played(&self, video_id: PrimaryKey, is_played: bool) -> DatabaseResult<()> {
        let result = query("UPDATE videos SET is_played = $1 WHERE id = $2")
            .bind(is_played)
            .bind(video_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "video",
                identifier: video_id.to_string(),
            });
        }

        Ok(())
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier: identifier.to_string(),
            },
            e => Self::any(e),
        }
    }
}
