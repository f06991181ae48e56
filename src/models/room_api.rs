use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::models::{Participant, Permission, Room};

/// Request payload for creating a study room
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct CreateRoomRequest {
    pub name: String,
    pub description: Option<String>,
}

/// Request payload for updating the room's name and description
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Default)]
pub struct UpdateRoomRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct PermissionRequest {
    pub permission: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct DocumentRequest {
    pub content: String,
}

#[derive(Deserialize, IntoParams, Debug)]
pub struct RoomListQuery {
    /// `true` lists rooms the caller owns, `false` rooms the caller took part in
    pub owned: Option<bool>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ParticipantResponse {
    pub user_id: String,
    pub is_owner: bool,
    pub is_active: bool,
    pub permission: Permission,
}

impl From<&Participant> for ParticipantResponse {
    fn from(p: &Participant) -> Self {
        Self {
            user_id: p.user_id.clone(),
            is_owner: p.is_owner(),
            is_active: p.is_active(),
            permission: p.permission,
        }
    }
}

/// Full view of a study room
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct RoomResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub participants: Vec<ParticipantResponse>,
    pub content: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<&Room> for RoomResponse {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id,
            name: room.name.clone(),
            description: room.description.clone(),
            participants: room.participants.iter().map(ParticipantResponse::from).collect(),
            content: room.content.clone(),
            is_active: room.is_active,
            created_at: room.created_at,
            last_modified: room.last_modified,
            ended_at: room.ended_at,
        }
    }
}

/// Listing entry, without the document body
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct RoomListingResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub participants: Vec<ParticipantResponse>,
    pub created_at: DateTime<Utc>,
}

impl From<&Room> for RoomListingResponse {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id,
            name: room.name.clone(),
            description: room.description.clone(),
            is_active: room.is_active,
            participants: room.participants.iter().map(ParticipantResponse::from).collect(),
            created_at: room.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct ParticipantsResponse {
    pub active_participants: Vec<ParticipantResponse>,
    pub former_participants: Vec<ParticipantResponse>,
}
