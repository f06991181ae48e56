use crate::{
    handlers::{
        create_room, diagnostics, end_room, get_room, join_room, leave_room, list_participants,
        list_rooms, remove_participant, set_permission, transfer_ownership, update_document,
        update_room,
    },
    routes::auth_middleware::auth_middleware,
    state::AppState,
};
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

/// Create API routes
pub fn create_api_routes(state: Arc<AppState>) -> Router {
    Router::<Arc<AppState>>::new()
        .route("/v1/diagnostics", get(diagnostics))
        .route("/v1/rooms", get(list_rooms).post(create_room))
        .route("/v1/rooms/:room_id", get(get_room).patch(update_room))
        .route("/v1/rooms/:room_id/end", post(end_room))
        .route("/v1/rooms/:room_id/join", post(join_room))
        .route("/v1/rooms/:room_id/leave", post(leave_room))
        .route("/v1/rooms/:room_id/participants", get(list_participants))
        .route("/v1/rooms/:room_id/participants/:user_id", delete(remove_participant))
        .route("/v1/rooms/:room_id/participants/:user_id/permission", put(set_permission))
        .route("/v1/rooms/:room_id/owner/:user_id", post(transfer_ownership))
        .route("/v1/rooms/:room_id/document", put(update_document))
        // Applies to all routes added above
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
