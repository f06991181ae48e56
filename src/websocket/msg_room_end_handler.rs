use tracing::{info, warn};

use crate::models::{RoomEndMessage, SendMessage};
use crate::state::AppState;
use crate::websocket::handler::{reply, WsSender};

/// Handle RoomEndMessage - notify the other active participants.
/// Ending the room itself happens through the REST endpoint.
pub async fn handle_room_end_message(end_msg: RoomEndMessage, user_id: &str, state: &AppState, sender: &WsSender) {
    let room = match state.rooms.get_room(user_id, end_msg.room_id).await {
        Ok(room) => room,
        Err(e) => {
            warn!("Cannot announce end of study room {}: {}", end_msg.room_id, e);
            reply(sender, &SendMessage::error(e.to_string())).await;
            return;
        }
    };

    let delivered = state.registry.send_to_each(
        &room.active_participant_ids(),
        Some(user_id),
        &SendMessage::room_end(room.id),
    );
    info!("Room end of {} announced by {} to {} participants", room.id, user_id, delivered);
}
