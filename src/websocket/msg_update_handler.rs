use tracing::{info, warn};

use crate::models::{DocumentUpdateMessage, SendMessage};
use crate::state::AppState;
use crate::websocket::handler::{reply, WsSender};

/// Handle DocumentUpdateMessage - Persist, then broadcast to the other active participants
pub async fn handle_update_message(update_msg: DocumentUpdateMessage, editor_id: &str, state: &AppState, sender: &WsSender) {
    let room_id = update_msg.room_id;

    let room = match state.rooms.update_document(editor_id, room_id, update_msg.content).await {
        Ok(room) => room,
        Err(e) => {
            warn!("Document update from {} for study room {} rejected: {}", editor_id, room_id, e);
            reply(sender, &SendMessage::error(e.to_string())).await;
            return;
        }
    };

    let broadcast_msg = SendMessage::DocumentUpdate {
        editor_id: editor_id.to_string(),
        room_id,
        content: room.content.clone(),
    };
    let delivered = state
        .registry
        .send_to_each(&room.active_participant_ids(), Some(editor_id), &broadcast_msg);
    info!("Document update by {} for study room {} sent to {} participants", editor_id, room_id, delivered);
}
