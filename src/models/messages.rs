use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Permission;

/// Envelope of every inbound socket event: `{"type": ..., "data": {...}}`
#[derive(Deserialize, Debug)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DocumentUpdateMessage {
    #[serde(alias = "study_room_id")]
    pub room_id: Uuid,
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RoomEndMessage {
    #[serde(alias = "study_room_id")]
    pub room_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InvitationMessage {
    pub to: String,
    #[serde(alias = "study_room_id")]
    pub room_id: Uuid,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReceivedMessage {
    DocumentUpdate(DocumentUpdateMessage),
    RoomEnd(RoomEndMessage),
    Invitation(InvitationMessage),
    Ping,
    Unknown(String),
}

impl ReceivedMessage {
    /// Decode a text frame. Unknown event types decode to `Unknown` rather than failing.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let raw: RawEvent = serde_json::from_str(text)?;
        let msg = match raw.kind.as_str() {
            "document_update" => ReceivedMessage::DocumentUpdate(serde_json::from_value(raw.data)?),
            "room_end" => ReceivedMessage::RoomEnd(serde_json::from_value(raw.data)?),
            "invitation" => ReceivedMessage::Invitation(serde_json::from_value(raw.data)?),
            "ping" => ReceivedMessage::Ping,
            _ => ReceivedMessage::Unknown(raw.kind),
        };
        Ok(msg)
    }

    pub fn room_id(&self) -> Option<Uuid> {
        match self {
            ReceivedMessage::DocumentUpdate(m) => Some(m.room_id),
            ReceivedMessage::RoomEnd(m) => Some(m.room_id),
            ReceivedMessage::Invitation(m) => Some(m.room_id),
            ReceivedMessage::Ping | ReceivedMessage::Unknown(_) => None,
        }
    }
}

pub const ROOM_ENDED_MESSAGE: &str = "The study session has ended.";

/// Outbound socket events
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SendMessage {
    DocumentUpdate {
        editor_id: String,
        room_id: Uuid,
        content: String,
    },
    RoomEnd {
        room_id: Uuid,
        message: String,
    },
    Invitation {
        from: String,
        to: String,
        room_id: Uuid,
        message: Option<String>,
    },
    Presence {
        user_id: String,
        status: String,
        timestamp: String,
    },
    ParticipantRemoved {
        room_id: Uuid,
        user_id: String,
    },
    PermissionChanged {
        room_id: Uuid,
        user_id: String,
        permission: Permission,
    },
    OwnerChanged {
        room_id: Uuid,
        owner_id: String,
    },
    Pong {
        date: String,
    },
    Error {
        message: String,
    },
}

impl SendMessage {
    pub fn room_end(room_id: Uuid) -> Self {
        SendMessage::RoomEnd {
            room_id,
            message: ROOM_ENDED_MESSAGE.to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        SendMessage::Error { message: message.into() }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
