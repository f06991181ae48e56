use utoipa::OpenApi;
use crate::models::*;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

/// Create a study room owned by the caller
#[utoipa::path(
    post,
    path = "/api/v1/rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Study room created", body = RoomResponse),
        (status = 400, description = "Invalid name or description", body = ErrorResponse),
        (status = 409, description = "Caller is already in an active room", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn create_room_doc() {}

/// List rooms the caller owns or took part in
#[utoipa::path(
    get,
    path = "/api/v1/rooms",
    params(RoomListQuery),
    responses(
        (status = 200, description = "Study rooms", body = [RoomListingResponse])
    )
)]
#[allow(dead_code)]
pub async fn list_rooms_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}",
    params(("room_id" = String, Path, description = "Study room id")),
    responses(
        (status = 200, description = "Study room", body = RoomResponse),
        (status = 403, description = "Caller never took part in the room", body = ErrorResponse),
        (status = 404, description = "Unknown room", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn get_room_doc() {}

#[utoipa::path(
    patch,
    path = "/api/v1/rooms/{room_id}",
    params(("room_id" = String, Path, description = "Study room id")),
    request_body = UpdateRoomRequest,
    responses(
        (status = 200, description = "Study room updated", body = RoomResponse),
        (status = 403, description = "Caller is not the owner", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn update_room_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/rooms/{room_id}/end",
    params(("room_id" = String, Path, description = "Study room id")),
    responses(
        (status = 200, description = "Study room ended", body = RoomResponse),
        (status = 403, description = "Caller is not the owner or the room is inactive", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn end_room_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/rooms/{room_id}/join",
    params(("room_id" = String, Path, description = "Study room id")),
    responses(
        (status = 200, description = "Joined as viewer", body = RoomResponse),
        (status = 403, description = "Room is inactive", body = ErrorResponse),
        (status = 409, description = "Already active here or in another room", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn join_room_doc() {}

/// Leave a room. The owner leaving ends it.
#[utoipa::path(
    post,
    path = "/api/v1/rooms/{room_id}/leave",
    params(("room_id" = String, Path, description = "Study room id")),
    responses(
        (status = 200, description = "Left the room", body = RoomResponse),
        (status = 404, description = "Caller is not an active participant", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn leave_room_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}/participants",
    params(("room_id" = String, Path, description = "Study room id")),
    responses(
        (status = 200, description = "Active and former participants", body = ParticipantsResponse)
    )
)]
#[allow(dead_code)]
pub async fn list_participants_doc() {}

#[utoipa::path(
    delete,
    path = "/api/v1/rooms/{room_id}/participants/{user_id}",
    params(
        ("room_id" = String, Path, description = "Study room id"),
        ("user_id" = String, Path, description = "Participant to remove")
    ),
    responses(
        (status = 200, description = "Participant removed", body = RoomResponse),
        (status = 403, description = "Caller may not remove this participant", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn remove_participant_doc() {}

#[utoipa::path(
    put,
    path = "/api/v1/rooms/{room_id}/participants/{user_id}/permission",
    params(
        ("room_id" = String, Path, description = "Study room id"),
        ("user_id" = String, Path, description = "Target participant")
    ),
    request_body = PermissionRequest,
    responses(
        (status = 200, description = "Permission changed", body = RoomResponse),
        (status = 400, description = "Unknown permission or target is the owner", body = ErrorResponse),
        (status = 409, description = "Permission already set", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn set_permission_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/rooms/{room_id}/owner/{user_id}",
    params(
        ("room_id" = String, Path, description = "Study room id"),
        ("user_id" = String, Path, description = "New owner")
    ),
    responses(
        (status = 200, description = "Ownership transferred", body = RoomResponse),
        (status = 404, description = "New owner is not an active participant", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn transfer_ownership_doc() {}

#[utoipa::path(
    put,
    path = "/api/v1/rooms/{room_id}/document",
    params(("room_id" = String, Path, description = "Study room id")),
    request_body = DocumentRequest,
    responses(
        (status = 200, description = "Document replaced", body = RoomResponse),
        (status = 403, description = "Caller cannot edit", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn update_document_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/diagnostics",
    responses(
        (status = 200, description = "Process diagnostics", body = DiagnosticsResponse)
    )
)]
#[allow(dead_code)]
pub async fn diagnostics_doc() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check_doc,
        create_room_doc,
        list_rooms_doc,
        get_room_doc,
        update_room_doc,
        end_room_doc,
        join_room_doc,
        leave_room_doc,
        list_participants_doc,
        remove_participant_doc,
        set_permission_doc,
        transfer_ownership_doc,
        update_document_doc,
        diagnostics_doc,
    ),
    components(
        schemas(
            HealthResponse,
            ErrorResponse,
            DiagnosticsResponse,
            CreateRoomRequest,
            UpdateRoomRequest,
            PermissionRequest,
            DocumentRequest,
            RoomResponse,
            RoomListingResponse,
            ParticipantResponse,
            ParticipantsResponse,
            Permission,
        )
    ),
    tags(
        (name = "api", description = "Study room endpoints")
    )
)]
pub struct ApiDoc;
