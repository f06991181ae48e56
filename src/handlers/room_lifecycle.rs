use crate::{
    handlers::{parse_room_id, ApiError},
    models::{CreateRoomRequest, RoomListQuery, RoomListingResponse, RoomResponse, SendMessage, UpdateRoomRequest},
    routes::auth_middleware::AuthUser,
    state::AppState,
};
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;

/// Create a study room owned by the caller
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(request): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomResponse>), ApiError> {
    let room = state.rooms.create_room(&user_id, request).await?;
    Ok((StatusCode::CREATED, Json(RoomResponse::from(&room))))
}

/// List rooms the caller owns (default) or took part in
pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(query): Query<RoomListQuery>,
) -> Result<(StatusCode, Json<Vec<RoomListingResponse>>), ApiError> {
    let rooms = state.rooms.list_rooms(&user_id, query.owned.unwrap_or(true)).await?;
    Ok((StatusCode::OK, Json(rooms.iter().map(RoomListingResponse::from).collect())))
}

pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(room_id): Path<String>,
) -> Result<(StatusCode, Json<RoomResponse>), ApiError> {
    let room_id = parse_room_id(&room_id)?;
    let room = state.rooms.get_room(&user_id, room_id).await?;
    Ok((StatusCode::OK, Json(RoomResponse::from(&room))))
}

/// Update name and description
pub async fn update_room(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(room_id): Path<String>,
    Json(request): Json<UpdateRoomRequest>,
) -> Result<(StatusCode, Json<RoomResponse>), ApiError> {
    let room_id = parse_room_id(&room_id)?;
    let room = state.rooms.update_room_info(&user_id, room_id, request).await?;
    Ok((StatusCode::OK, Json(RoomResponse::from(&room))))
}

/// End the room for everyone and tell whoever is connected
pub async fn end_room(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(room_id): Path<String>,
) -> Result<(StatusCode, Json<RoomResponse>), ApiError> {
    let room_id = parse_room_id(&room_id)?;
    let ended = state.rooms.end_room(&user_id, room_id).await?;

    let notified = state.registry.send_to_each(
        &ended.previously_active,
        Some(&user_id),
        &SendMessage::room_end(room_id),
    );
    info!("Study room {} ended, {} participants notified", room_id, notified);

    Ok((StatusCode::OK, Json(RoomResponse::from(&ended.room))))
}

pub async fn transfer_ownership(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path((room_id, new_owner_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<RoomResponse>), ApiError> {
    let room_id = parse_room_id(&room_id)?;
    let room = state.rooms.transfer_ownership(&user_id, &new_owner_id, room_id).await?;

    state.registry.send_to_each(
        &room.active_participant_ids(),
        None,
        &SendMessage::OwnerChanged { room_id, owner_id: new_owner_id },
    );

    Ok((StatusCode::OK, Json(RoomResponse::from(&room))))
}
