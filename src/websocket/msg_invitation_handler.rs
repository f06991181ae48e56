use tracing::{debug, info};

use crate::models::{InvitationMessage, SendMessage};
use crate::state::AppState;

/// Handle InvitationMessage - relay to the invited user if online
pub async fn handle_invitation_message(invitation_msg: InvitationMessage, from: &str, state: &AppState) {
    let to = invitation_msg.to.clone();
    let relayed = SendMessage::Invitation {
        from: from.to_string(),
        to: invitation_msg.to,
        room_id: invitation_msg.room_id,
        message: invitation_msg.message,
    };
    if state.registry.send(&to, &relayed) {
        info!("Invitation ping from {} delivered to {}", from, to);
    } else {
        debug!("Invitation ping from {} not delivered, {} is offline", from, to);
    }
}
