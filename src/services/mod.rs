pub mod auth_service;
pub mod locks;
pub mod room_service;
