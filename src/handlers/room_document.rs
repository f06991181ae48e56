use crate::{
    handlers::{parse_room_id, ApiError},
    models::{DocumentRequest, RoomResponse, SendMessage},
    routes::auth_middleware::AuthUser,
    state::AppState,
};
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

/// Overwrite the shared document. Last write wins.
pub async fn update_document(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(room_id): Path<String>,
    Json(request): Json<DocumentRequest>,
) -> Result<(StatusCode, Json<RoomResponse>), ApiError> {
    let room_id = parse_room_id(&room_id)?;
    let room = state.rooms.update_document(&user_id, room_id, request.content).await?;

    state.registry.send_to_each(
        &room.active_participant_ids(),
        Some(&user_id),
        &SendMessage::DocumentUpdate {
            editor_id: user_id.clone(),
            room_id,
            content: room.content.clone(),
        },
    );

    Ok((StatusCode::OK, Json(RoomResponse::from(&room))))
}
