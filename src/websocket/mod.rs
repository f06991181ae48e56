pub mod handler;
pub mod msg_invitation_handler;
pub mod msg_ping_handler;
pub mod msg_room_end_handler;
pub mod msg_update_handler;

pub use handler::websocket_handler;
