use tracing::debug;
use chrono::Utc;

use crate::models::SendMessage;
use crate::websocket::handler::{reply, WsSender};

/// Handle ping - send a pong message back.
pub async fn handle_ping_message(user_id: &str, sender: &WsSender) {
    debug!("Ping message received from {}", user_id);
    let pong = SendMessage::Pong { date: Utc::now().to_rfc3339() };
    reply(sender, &pong).await;
}
