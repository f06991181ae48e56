use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::models::SendMessage;

pub type ConnectionId = u64;

/// What `disconnect_connection` found for the given connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// The entry belonged to this connection and is now gone
    Removed,
    /// No entry left, e.g. evicted after a failed send
    AlreadyGone,
    /// A newer connection of the same user owns the entry
    Superseded,
}

#[derive(Debug)]
struct ConnEntry {
    conn_id: ConnectionId,
    tx: mpsc::Sender<String>,
}

/// Process-wide directory of live channels keyed by user id.
///
/// At most one channel per user: a newer `connect` replaces the older entry,
/// whose sender is dropped so the older session sees its queue close.
/// Sends never block. A full or closed queue counts as a dead peer, the entry
/// is removed and the message dropped.
#[derive(Debug)]
pub struct ConnectionRegistry {
    conns: RwLock<HashMap<String, ConnEntry>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl ConnectionRegistry {
    pub fn new(buffer: usize) -> Self {
        Self {
            conns: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ConnEntry>> {
        self.conns.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ConnEntry>> {
        self.conns.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create a bounded channel for `user_id` and register its sending half.
    pub fn open(&self, user_id: &str) -> (ConnectionId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        (self.connect(user_id, tx), rx)
    }

    /// Register or replace the channel of `user_id`. Last connect wins.
    pub fn connect(&self, user_id: &str, channel: mpsc::Sender<String>) -> ConnectionId {
        let conn_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let replaced = self.write().insert(
            user_id.to_string(),
            ConnEntry { conn_id, tx: channel },
        );
        match replaced {
            Some(old) => info!(
                "Connection {} replaces connection {} for user {}",
                conn_id, old.conn_id, user_id
            ),
            None => info!("Connection {} registered for user {}", conn_id, user_id),
        }
        conn_id
    }

    /// Remove the user's channel. Unknown users are a no-op.
    #[allow(dead_code)]
    pub fn disconnect(&self, user_id: &str) {
        if self.write().remove(user_id).is_some() {
            info!("User {} disconnected", user_id);
        }
    }

    /// Remove the user's channel only if it is still `conn_id`.
    pub fn disconnect_connection(&self, user_id: &str, conn_id: ConnectionId) -> Release {
        let mut conns = self.write();
        match conns.get(user_id) {
            Some(entry) if entry.conn_id == conn_id => {
                conns.remove(user_id);
                info!("Connection {} of user {} removed", conn_id, user_id);
                Release::Removed
            }
            Some(_) => Release::Superseded,
            None => Release::AlreadyGone,
        }
    }

    #[cfg(test)]
    pub fn is_connected(&self, user_id: &str) -> bool {
        self.read().contains_key(user_id)
    }

    pub fn connection_count(&self) -> usize {
        self.read().len()
    }

    /// Best-effort delivery of an already encoded message
    pub fn send_text(&self, user_id: &str, text: String) -> bool {
        let failed = {
            let conns = self.read();
            let Some(entry) = conns.get(user_id) else {
                return false;
            };
            match entry.tx.try_send(text) {
                Ok(()) => return true,
                Err(e) => {
                    debug!("Dropping message for user {}: {}", user_id, e);
                    entry.conn_id
                }
            }
        };
        self.disconnect_connection(user_id, failed);
        false
    }

    pub fn send(&self, user_id: &str, message: &SendMessage) -> bool {
        match message.to_json() {
            Ok(text) => self.send_text(user_id, text),
            Err(e) => {
                error!("Failed to encode message for user {}: {}", user_id, e);
                false
            }
        }
    }

    /// Send to every connected user accepted by `predicate`. Order is unspecified.
    /// Returns the number of users the message was queued for.
    pub fn broadcast<P>(&self, message: &SendMessage, predicate: P) -> usize
    where
        P: Fn(&str) -> bool,
    {
        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to encode broadcast message: {}", e);
                return 0;
            }
        };

        let mut delivered = 0;
        let mut dead: Vec<(String, ConnectionId)> = Vec::new();
        {
            let conns = self.read();
            for (user_id, entry) in conns.iter().filter(|(uid, _)| predicate(uid.as_str())) {
                if entry.tx.try_send(text.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push((user_id.clone(), entry.conn_id));
                }
            }
        }
        for (user_id, conn_id) in dead {
            debug!("Dropping broadcast for unreachable user {}", user_id);
            self.disconnect_connection(&user_id, conn_id);
        }
        delivered
    }

    /// Send to each listed user except `except`
    pub fn send_to_each(&self, user_ids: &[String], except: Option<&str>, message: &SendMessage) -> usize {
        self.broadcast(message, |uid| {
            except != Some(uid) && user_ids.iter().any(|u| u == uid)
        })
    }
}
