use std::borrow::Cow;
use std::sync::Arc;
use axum::{
    extract::{ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade}, State},
    http::{HeaderMap, Uri},
    response::Response,
};
use chrono::Utc;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::models::{ReceivedMessage, RoomError, SendMessage};
use crate::services::auth_service::{self, AuthError};
use crate::state::AppState;
use crate::ws::guard::ConnectionGuard;
use crate::ws::registry::Release;
use crate::websocket::msg_invitation_handler::handle_invitation_message;
use crate::websocket::msg_ping_handler::handle_ping_message;
use crate::websocket::msg_room_end_handler::handle_room_end_message;
use crate::websocket::msg_update_handler::handle_update_message;

pub type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Why a session stopped streaming
#[derive(Debug)]
enum SessionEnd {
    PeerClosed,
    Idle,
    PolicyViolation(String),
    Replaced,
    Evicted,
    WriteFailed,
}

/// Why the outbound forwarder stopped
enum SendEnd {
    QueueClosed,
    WriteFailed,
}

enum Flow {
    Continue,
    Close(String),
}

/// WebSocket handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    info!("New WebSocket connection attempt");
    let auth = auth_service::token_from_parts(&headers, &uri).and_then(|token| state.tokens.verify(&token));
    ws.on_upgrade(move |socket| handle_socket(socket, state, auth))
}

/// Best-effort write of one event straight to this socket
pub async fn reply(sender: &WsSender, message: &SendMessage) {
    match message.to_json() {
        Ok(text) => {
            if sender.lock().await.send(Message::Text(text)).await.is_err() {
                debug!("Failed to reply, peer is gone");
            }
        }
        Err(e) => error!("Failed to encode reply: {}", e),
    }
}

async fn close_with(sender: &WsSender, code: u16, reason: impl Into<Cow<'static, str>>) {
    let frame = CloseFrame { code, reason: reason.into() };
    let _ = sender.lock().await.send(Message::Close(Some(frame))).await;
}

/// Tell the co-participants of the user's active room that the user came or went
async fn announce_presence(state: &AppState, user_id: &str, status: &str) {
    let room = match state.rooms.active_room_of(user_id).await {
        Ok(Some(room)) => room,
        Ok(None) => return,
        Err(e) => {
            warn!("Cannot announce presence of {}: {}", user_id, e);
            return;
        }
    };
    let presence = SendMessage::Presence {
        user_id: user_id.to_string(),
        status: status.to_string(),
        timestamp: Utc::now().to_rfc3339(),
    };
    state
        .registry
        .send_to_each(&room.active_participant_ids(), Some(user_id), &presence);
}

/// Decode one text frame, gate it on room membership and route it
async fn dispatch(state: &AppState, user_id: &str, sender: &WsSender, text: &str) -> Flow {
    let msg = match ReceivedMessage::parse(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to parse message from {}: {}", user_id, e);
            reply(sender, &SendMessage::error(format!("Malformed event: {}", e))).await;
            return Flow::Continue;
        }
    };

    // Room scoped events require an active participant
    if let Some(room_id) = msg.room_id() {
        match state.rooms.is_active_participant(user_id, room_id).await {
            Ok(true) => {}
            Ok(false) | Err(RoomError::RoomNotFound(_)) => {
                warn!("User {} sent an event for study room {} without being a participant", user_id, room_id);
                return Flow::Close(format!("Not an active participant of study room {}", room_id));
            }
            Err(e) => {
                error!("Membership check failed for {} in {}: {}", user_id, room_id, e);
                reply(sender, &SendMessage::error(e.to_string())).await;
                return Flow::Continue;
            }
        }
    }

    match msg {
        ReceivedMessage::DocumentUpdate(update_msg) => {
            handle_update_message(update_msg, user_id, state, sender).await
        }
        ReceivedMessage::RoomEnd(end_msg) => handle_room_end_message(end_msg, user_id, state, sender).await,
        ReceivedMessage::Invitation(invitation_msg) => {
            handle_invitation_message(invitation_msg, user_id, state).await
        }
        ReceivedMessage::Ping => handle_ping_message(user_id, sender).await,
        ReceivedMessage::Unknown(kind) => info!("Ignoring event of unknown type '{}' from {}", kind, user_id),
    }
    Flow::Continue
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, auth: Result<String, AuthError>) {
    // Split the socket into sender and receiver
    let (sender, mut receiver) = socket.split();

    // Replies and the outbound queue both write to the socket
    let sender: WsSender = Arc::new(Mutex::new(sender));

    let user_id = match auth {
        Ok(user_id) => user_id,
        Err(e) => {
            warn!("WebSocket authentication failed: {}", e);
            close_with(&sender, close_code::POLICY, "Authentication failed").await;
            return;
        }
    };

    let (conn_id, mut outbound) = state.registry.open(&user_id);
    info!("WebSocket connection {} established for user {}", conn_id, user_id);

    // Whatever happens below, the registry entry goes away with this session
    let registration = ConnectionGuard::new(&state.registry, &user_id, conn_id);

    announce_presence(&state, &user_id, "online").await;

    // Forward queued events to the client
    let out_sender = sender.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if out_sender.lock().await.send(Message::Text(text)).await.is_err() {
                return SendEnd::WriteFailed;
            }
        }
        SendEnd::QueueClosed
    });

    // Read client events until close, error, idle timeout or policy violation
    let recv_state = state.clone();
    let recv_sender = sender.clone();
    let recv_user = user_id.clone();
    let idle = state.config.ws_idle_timeout();
    let mut recv_task = tokio::spawn(async move {
        loop {
            let frame = match tokio::time::timeout(idle, receiver.next()).await {
                Err(_) => return SessionEnd::Idle,
                Ok(None) => return SessionEnd::PeerClosed,
                Ok(Some(Err(e))) => {
                    debug!("WebSocket error for {}: {}", recv_user, e);
                    return SessionEnd::PeerClosed;
                }
                Ok(Some(Ok(frame))) => frame,
            };
            match frame {
                Message::Text(text) => {
                    if let Flow::Close(reason) = dispatch(&recv_state, &recv_user, &recv_sender, &text).await {
                        return SessionEnd::PolicyViolation(reason);
                    }
                }
                Message::Close(_) => return SessionEnd::PeerClosed,
                Message::Binary(_) => debug!("Ignoring binary frame from {}", recv_user),
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    });

    // Wait for either task to finish (and finish the other)
    let end = tokio::select! {
        res = (&mut recv_task) => {
            send_task.abort();
            res.unwrap_or(SessionEnd::PeerClosed)
        }
        res = (&mut send_task) => {
            recv_task.abort();
            match res {
                // The queue only closes when the registry dropped our entry
                Ok(SendEnd::QueueClosed) => SessionEnd::Evicted,
                Ok(SendEnd::WriteFailed) | Err(_) => SessionEnd::WriteFailed,
            }
        }
    };

    let release = registration.release();
    let end = match end {
        SessionEnd::Evicted if release == Release::Superseded => SessionEnd::Replaced,
        other => other,
    };

    match &end {
        SessionEnd::PeerClosed | SessionEnd::WriteFailed => {}
        SessionEnd::Idle => close_with(&sender, close_code::NORMAL, "Idle timeout").await,
        SessionEnd::PolicyViolation(reason) => close_with(&sender, close_code::POLICY, reason.clone()).await,
        SessionEnd::Replaced => close_with(&sender, close_code::NORMAL, "Replaced by a newer connection").await,
        SessionEnd::Evicted => close_with(&sender, close_code::AGAIN, "Connection dropped by the server").await,
    }

    // A newer connection of the same user keeps the user online
    if release != Release::Superseded {
        announce_presence(&state, &user_id, "offline").await;
    }
    info!("WebSocket connection {} of user {} terminated: {:?}", conn_id, user_id, end);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::memstore::MemoryRoomStore;
    use crate::models::CreateRoomRequest;
    use crate::services::auth_service::test_tokens::SECRET;
    use crate::routes::create_router;
    use crate::services::auth_service::test_tokens::token_for;
    use crate::state::test_state;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
    use uuid::Uuid;

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn serve(state: Arc<AppState>) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = create_router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    async fn connect(addr: SocketAddr, state: &AppState, user: &str) -> Client {
        let url = format!("ws://{}/ws?token={}", addr, token_for(user));
        let (client, _) = connect_async(url).await.unwrap();
        wait_until(|| state.registry.is_connected(user)).await;
        client
    }

    async fn wait_until(cond: impl Fn() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Condition not reached in time");
    }

    async fn send_event(client: &mut Client, value: serde_json::Value) {
        client.send(WsMessage::text(value.to_string())).await.unwrap();
    }

    /// Next event of the given type, skipping others
    async fn next_event(client: &mut Client, kind: &str) -> serde_json::Value {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(2), client.next())
                .await
                .expect("timed out waiting for event")
                .expect("stream ended")
                .unwrap();
            if let WsMessage::Text(text) = msg {
                let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                if value["type"] == kind {
                    return value;
                }
            }
        }
    }

    /// Close code of the next close frame, skipping other frames
    async fn close_code_of(client: &mut Client) -> u16 {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(2), client.next())
                .await
                .expect("timed out waiting for close")
                .expect("stream ended")
                .unwrap();
            if let WsMessage::Close(frame) = msg {
                return frame.map(|f| u16::from(f.code)).unwrap_or(0);
            }
        }
    }

    async fn room_with(state: &AppState, owner: &str, members: &[&str]) -> Uuid {
        let room = state
            .rooms
            .create_room(owner, CreateRoomRequest { name: "Room".to_string(), description: None })
            .await
            .unwrap();
        for member in members {
            state.rooms.join_room(member, room.id).await.unwrap();
        }
        room.id
    }

    #[tokio::test]
    async fn test_authentication_failure_closes_with_policy_code() {
        let state = test_state();
        let addr = serve(state.clone()).await;
        let (mut client, _) = connect_async(format!("ws://{}/ws?token=bogus", addr)).await.unwrap();
        assert_eq!(close_code_of(&mut client).await, close_code::POLICY);
        assert_eq!(state.registry.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_document_update_reaches_other_participants_only() {
        let state = test_state();
        let addr = serve(state.clone()).await;
        let room_id = room_with(&state, "alice", &["bob"]).await;
        let _outsider_room = room_with(&state, "carol", &[]).await;

        let mut bob = connect(addr, &state, "bob").await;
        let mut carol = connect(addr, &state, "carol").await;
        let mut alice = connect(addr, &state, "alice").await;

        send_event(&mut alice, serde_json::json!({
            "type": "document_update",
            "data": { "room_id": room_id, "content": "# Shared notes" }
        }))
        .await;

        let event = next_event(&mut bob, "document_update").await;
        assert_eq!(event["data"]["editor_id"], "alice");
        assert_eq!(event["data"]["content"], "# Shared notes");
        assert_eq!(state.rooms.get_room("alice", room_id).await.unwrap().content, "# Shared notes");

        // carol is connected but not in the room
        send_event(&mut carol, serde_json::json!({ "type": "ping" })).await;
        let first = tokio::time::timeout(Duration::from_secs(2), carol.next()).await.unwrap().unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(first.to_text().unwrap()).unwrap();
        assert_eq!(value["type"], "pong");
    }

    #[tokio::test]
    async fn test_viewer_edit_gets_error_event_and_stays_connected() {
        let state = test_state();
        let addr = serve(state.clone()).await;
        let room_id = room_with(&state, "alice", &["bob"]).await;
        let mut bob = connect(addr, &state, "bob").await;

        send_event(&mut bob, serde_json::json!({
            "type": "document_update",
            "data": { "room_id": room_id, "content": "vandalism" }
        }))
        .await;
        let event = next_event(&mut bob, "error").await;
        assert!(event["data"]["message"].as_str().unwrap().contains("permission"));

        send_event(&mut bob, serde_json::json!({ "type": "whatever", "data": {} })).await;
        send_event(&mut bob, serde_json::json!({ "type": "ping" })).await;
        next_event(&mut bob, "pong").await;
        assert_eq!(state.rooms.get_room("alice", room_id).await.unwrap().content, "");
    }

    #[tokio::test]
    async fn test_non_member_room_event_closes_connection() {
        let state = test_state();
        let addr = serve(state.clone()).await;
        let room_id = room_with(&state, "alice", &[]).await;
        let mut alice = connect(addr, &state, "alice").await;
        let mut mallory = connect(addr, &state, "mallory").await;

        send_event(&mut mallory, serde_json::json!({
            "type": "room_end",
            "data": { "room_id": room_id }
        }))
        .await;
        assert_eq!(close_code_of(&mut mallory).await, close_code::POLICY);
        wait_until(|| !state.registry.is_connected("mallory")).await;

        // Nothing was fanned out to the owner
        send_event(&mut alice, serde_json::json!({ "type": "ping" })).await;
        let first = tokio::time::timeout(Duration::from_secs(2), alice.next()).await.unwrap().unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(first.to_text().unwrap()).unwrap();
        assert_eq!(value["type"], "pong");
    }

    #[tokio::test]
    async fn test_room_end_and_invitation_fan_out() {
        let state = test_state();
        let addr = serve(state.clone()).await;
        let room_id = room_with(&state, "alice", &["bob"]).await;
        let mut bob = connect(addr, &state, "bob").await;
        let mut dave = connect(addr, &state, "dave").await;
        let mut alice = connect(addr, &state, "alice").await;

        send_event(&mut alice, serde_json::json!({
            "type": "invitation",
            "data": { "to": "dave", "room_id": room_id, "message": "join us" }
        }))
        .await;
        let invite = next_event(&mut dave, "invitation").await;
        assert_eq!(invite["data"]["from"], "alice");

        send_event(&mut alice, serde_json::json!({
            "type": "room_end",
            "data": { "room_id": room_id }
        }))
        .await;
        let ended = next_event(&mut bob, "room_end").await;
        assert_eq!(ended["data"]["message"], crate::models::ROOM_ENDED_MESSAGE);
        // The socket event is a notification only
        assert!(state.rooms.get_room("alice", room_id).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_disconnect_cleans_registry_and_announces_presence() {
        let state = test_state();
        let addr = serve(state.clone()).await;
        room_with(&state, "alice", &["bob"]).await;
        let mut alice = connect(addr, &state, "alice").await;
        let mut bob = connect(addr, &state, "bob").await;

        let online = next_event(&mut alice, "presence").await;
        assert_eq!(online["data"]["user_id"], "bob");
        assert_eq!(online["data"]["status"], "online");

        bob.close(None).await.unwrap();
        wait_until(|| !state.registry.is_connected("bob")).await;
        let offline = next_event(&mut alice, "presence").await;
        assert_eq!(offline["data"]["status"], "offline");
    }

    #[tokio::test]
    async fn test_evicted_session_announces_offline() {
        let state = test_state();
        let addr = serve(state.clone()).await;
        room_with(&state, "alice", &["bob"]).await;
        let mut alice = connect(addr, &state, "alice").await;
        let mut bob = connect(addr, &state, "bob").await;
        next_event(&mut alice, "presence").await;

        // Same effect as a slow consumer overflowing its queue
        state.registry.disconnect("bob");

        assert_eq!(close_code_of(&mut bob).await, close_code::AGAIN);
        let offline = next_event(&mut alice, "presence").await;
        assert_eq!(offline["data"]["user_id"], "bob");
        assert_eq!(offline["data"]["status"], "offline");
    }

    #[tokio::test]
    async fn test_idle_socket_is_closed_and_unregistered() {
        let config = Config {
            auth_jwt_secret: Some(SECRET.to_string()),
            ws_idle_timeout_secs: 1,
            ..Config::default()
        };
        let state = AppState::new(config, Arc::new(MemoryRoomStore::new()));
        let addr = serve(state.clone()).await;
        let mut alice = connect(addr, &state, "alice").await;

        assert_eq!(close_code_of(&mut alice).await, close_code::NORMAL);
        wait_until(|| !state.registry.is_connected("alice")).await;
    }

    #[tokio::test]
    async fn test_newer_connection_replaces_older() {
        let state = test_state();
        let addr = serve(state.clone()).await;
        let mut first = connect(addr, &state, "alice").await;
        let mut second = connect(addr, &state, "alice").await;

        assert_eq!(close_code_of(&mut first).await, close_code::NORMAL);
        assert!(state.registry.is_connected("alice"));
        assert!(state.registry.send("alice", &SendMessage::Pong { date: "x".to_string() }));
        next_event(&mut second, "pong").await;
    }
}
