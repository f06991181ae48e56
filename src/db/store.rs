use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Room, RoomError};

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("room {0} not found")]
    NotFound(Uuid),
    #[error("room {0} was saved by someone else")]
    Conflict(Uuid),
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for RoomError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => RoomError::RoomNotFound(id),
            StoreError::Conflict(id) => RoomError::Conflict(id),
            StoreError::Backend(e) => RoomError::Storage(e),
        }
    }
}

/// Predicates the store can evaluate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomQuery {
    /// Active rooms where the user is an active participant
    ActiveMember(String),
    /// Rooms where the user has any participant record
    AnyMember(String),
    /// Rooms the user currently owns
    OwnedBy(String),
}

impl RoomQuery {
    pub fn matches(&self, room: &Room) -> bool {
        match self {
            RoomQuery::ActiveMember(uid) => room.is_active_participant(uid),
            RoomQuery::AnyMember(uid) => room.participant(uid).is_some(),
            RoomQuery::OwnedBy(uid) => room
                .participant(uid)
                .map(|p| p.is_owner())
                .unwrap_or(false),
        }
    }
}

/// Durable room storage
pub trait RoomStore: Send + Sync {
    fn get(&self, room_id: Uuid) -> StoreFuture<'_, Room>;

    fn insert(&self, room: Room) -> StoreFuture<'_, Room>;

    /// Optimistic write: fails with `Conflict` unless the stored version equals `room.version`.
    fn save(&self, room: Room) -> StoreFuture<'_, Room>;

    fn find(&self, query: RoomQuery) -> StoreFuture<'_, Vec<Room>>;
}
