pub mod health;
pub mod diagnostics;
pub mod room_lifecycle;
pub mod room_members;
pub mod room_document;

pub use health::*;
pub use diagnostics::*;
pub use room_lifecycle::*;
pub use room_members::*;
pub use room_document::*;

use axum::{http::StatusCode, Json};
use tracing::error;
use uuid::Uuid;
use crate::models::ErrorResponse;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Parse a room id path segment
pub(crate) fn parse_room_id(room_id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(room_id).map_err(|e| {
        error!("Invalid study room id '{}': {}", room_id, e);
        ErrorResponse::new(StatusCode::BAD_REQUEST, format!("Invalid study room id '{}'", room_id))
    })
}
