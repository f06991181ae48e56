use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Response for an error
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: u16,
    pub status: String,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
        (
            status,
            Json(ErrorResponse {
                code: status.as_u16(),
                status: status.to_string(),
                error: error.into(),
            }),
        )
    }
}

/// Coarse classification of room failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    Conflict,
    NotFound,
    Internal,
}

/// Failure of a room service operation. One variant per rejected precondition.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RoomError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Study room {0} not found")]
    RoomNotFound(Uuid),

    #[error("Study room {0} is not active")]
    RoomInactive(Uuid),

    #[error("User {0} is already in an active study room")]
    AlreadyInRoom(String),

    #[error("User {0} is the owner of the study room")]
    AlreadyOwner(String),

    #[error("User {0} is already an active participant of this study room")]
    AlreadyActive(String),

    #[error("User {0} is already a participant in another study room")]
    AlreadyInOtherRoom(String),

    #[error("User {0} is not an active participant of this study room")]
    NotAMember(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("User {0} is not an active participant of the study room")]
    NotAParticipant(String),

    #[error("Nothing to change: {0}")]
    Noop(String),

    #[error("Study room {0} was modified concurrently")]
    Conflict(Uuid),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl RoomError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RoomError::Validation(_) => ErrorKind::Validation,
            RoomError::RoomInactive(_) | RoomError::NotAMember(_) | RoomError::NotAuthorized(_) => {
                ErrorKind::Authorization
            }
            RoomError::AlreadyInRoom(_)
            | RoomError::AlreadyOwner(_)
            | RoomError::AlreadyActive(_)
            | RoomError::AlreadyInOtherRoom(_)
            | RoomError::Noop(_)
            | RoomError::Conflict(_) => ErrorKind::Conflict,
            RoomError::RoomNotFound(_) | RoomError::NotAParticipant(_) => ErrorKind::NotFound,
            RoomError::Storage(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RoomError> for (StatusCode, Json<ErrorResponse>) {
    fn from(err: RoomError) -> Self {
        ErrorResponse::new(err.status_code(), err.to_string())
    }
}
