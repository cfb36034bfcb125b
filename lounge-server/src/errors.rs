use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde_json::json;
use thiserror::Error;

use lounge_core::{DatabaseError, LookupError, RoomError};

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    // General
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: String,
    },
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("Unknown internal error: {0}")]
    Unknown(String),
    // Rooms
    #[error("Room not found")]
    RoomNotFound,
    #[error("Video not found")]
    VideoNotFound,
    #[error("Could not allocate a unique room code")]
    CodeAllocation,
    // Lookup
    #[error("Resource was not found upstream")]
    LookupNotFound,
    #[error("Failed to fetch resource: {0}")]
    LookupFailed(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::RoomNotFound => StatusCode::NOT_FOUND,
            Self::VideoNotFound => StatusCode::NOT_FOUND,
            Self::LookupNotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.as_status_code();

        // Unknown errors are logged and masked; everything else carries a
        // descriptive body.
        if matches!(self, Self::Unknown(_)) {
            error!("Request failed: {}", self);
            return (status, Json(json!({ "error": "Internal server error" }))).into_response();
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<RoomError> for ServerError {
    fn from(value: RoomError) -> Self {
        match value {
            RoomError::RoomNotFound => Self::RoomNotFound,
            RoomError::VideoNotFound => Self::VideoNotFound,
            RoomError::CodeAllocation => Self::CodeAllocation,
            RoomError::Database(e) => e.into(),
        }
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            DatabaseError::Conflict {
                resource,
                field,
                value,
            } => Self::Conflict {
                resource,
                field,
                value,
            },
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<LookupError> for ServerError {
    fn from(value: LookupError) -> Self {
        match value {
            LookupError::NotFound => Self::LookupNotFound,
            e => Self::LookupFailed(e.to_string()),
        }
    }
}
