use std::sync::Arc;

use crate::config::Config;
use crate::db::store::RoomStore;
use crate::services::auth_service::TokenVerifier;
use crate::services::room_service::RoomService;
use crate::ws::registry::ConnectionRegistry;

/// Process-scoped collaborators, built once in `main` and shared with every handler
pub struct AppState {
    pub config: Config,
    pub registry: ConnectionRegistry,
    pub rooms: RoomService,
    pub tokens: TokenVerifier,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn RoomStore>) -> Arc<Self> {
        let registry = ConnectionRegistry::new(config.ws_send_buffer);
        let tokens = TokenVerifier::new(config.auth_jwt_secret.clone(), config.token_cache_ttl());
        Arc::new(Self {
            config,
            registry,
            rooms: RoomService::new(store),
            tokens,
        })
    }
}

#[cfg(test)]
pub fn test_state() -> Arc<AppState> {
    use crate::db::memstore::MemoryRoomStore;
    use crate::services::auth_service::test_tokens::SECRET;

    let config = Config {
        auth_jwt_secret: Some(SECRET.to_string()),
        ..Config::default()
    };
    AppState::new(config, Arc::new(MemoryRoomStore::new()))
}
