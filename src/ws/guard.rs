use tracing::debug;

use crate::ws::registry::{ConnectionId, ConnectionRegistry, Release};

/// Scope guard for one registered connection.
///
/// Dropping the guard removes the registry entry if this connection still
/// owns it, so a panicking or cancelled session never leaves a stale entry.
pub struct ConnectionGuard<'a> {
    registry: &'a ConnectionRegistry,
    user_id: String,
    conn_id: ConnectionId,
    armed: bool,
}

impl<'a> ConnectionGuard<'a> {
    pub fn new(registry: &'a ConnectionRegistry, user_id: &str, conn_id: ConnectionId) -> Self {
        Self {
            registry,
            user_id: user_id.to_string(),
            conn_id,
            armed: true,
        }
    }

    /// Remove the entry now and report who held it
    pub fn release(mut self) -> Release {
        self.armed = false;
        self.registry.disconnect_connection(&self.user_id, self.conn_id)
    }
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!("Connection {} of user {} dropped without release", self.conn_id, self.user_id);
            self.registry.disconnect_connection(&self.user_id, self.conn_id);
        }
    }
}
