use crate::{
    handlers::{parse_room_id, ApiError},
    models::{ParticipantResponse, ParticipantsResponse, PermissionRequest, RoomResponse, SendMessage},
    routes::auth_middleware::AuthUser,
    services::room_service::LeaveOutcome,
    state::AppState,
};
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;

pub async fn join_room(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(room_id): Path<String>,
) -> Result<(StatusCode, Json<RoomResponse>), ApiError> {
    let room_id = parse_room_id(&room_id)?;
    let room = state.rooms.join_room(&user_id, room_id).await?;
    Ok((StatusCode::OK, Json(RoomResponse::from(&room))))
}

/// Leave the room. When the owner leaves, the room ends for everyone.
pub async fn leave_room(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(room_id): Path<String>,
) -> Result<(StatusCode, Json<RoomResponse>), ApiError> {
    let room_id = parse_room_id(&room_id)?;
    let room = match state.rooms.leave_room(&user_id, room_id).await? {
        LeaveOutcome::Left(room) => {
            state.registry.send_to_each(
                &room.active_participant_ids(),
                None,
                &SendMessage::ParticipantRemoved { room_id, user_id: user_id.clone() },
            );
            room
        }
        LeaveOutcome::Ended(ended) => {
            let notified = state.registry.send_to_each(
                &ended.previously_active,
                Some(&user_id),
                &SendMessage::room_end(room_id),
            );
            info!("Owner left study room {}, {} participants notified", room_id, notified);
            ended.room
        }
    };
    Ok((StatusCode::OK, Json(RoomResponse::from(&room))))
}

pub async fn list_participants(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(room_id): Path<String>,
) -> Result<(StatusCode, Json<ParticipantsResponse>), ApiError> {
    let room_id = parse_room_id(&room_id)?;
    let (active, former) = state.rooms.list_participants(&user_id, room_id).await?;
    Ok((
        StatusCode::OK,
        Json(ParticipantsResponse {
            active_participants: active.iter().map(ParticipantResponse::from).collect(),
            former_participants: former.iter().map(ParticipantResponse::from).collect(),
        }),
    ))
}

/// Remove a participant (owner) or oneself
pub async fn remove_participant(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path((room_id, target_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<RoomResponse>), ApiError> {
    let room_id = parse_room_id(&room_id)?;
    let room = state.rooms.remove_participant(&user_id, &target_id, room_id).await?;

    let mut recipients = room.active_participant_ids();
    recipients.push(target_id.clone());
    state.registry.send_to_each(
        &recipients,
        Some(&user_id),
        &SendMessage::ParticipantRemoved { room_id, user_id: target_id },
    );

    Ok((StatusCode::OK, Json(RoomResponse::from(&room))))
}

pub async fn set_permission(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path((room_id, target_id)): Path<(String, String)>,
    Json(request): Json<PermissionRequest>,
) -> Result<(StatusCode, Json<RoomResponse>), ApiError> {
    let room_id = parse_room_id(&room_id)?;
    let room = state
        .rooms
        .set_permission(&user_id, &target_id, room_id, &request.permission)
        .await?;

    if let Some(participant) = room.participant(&target_id) {
        state.registry.send(
            &target_id,
            &SendMessage::PermissionChanged {
                room_id,
                user_id: target_id.clone(),
                permission: participant.permission,
            },
        );
    }

    Ok((StatusCode::OK, Json(RoomResponse::from(&room))))
}
