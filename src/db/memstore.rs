use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{RoomQuery, RoomStore, StoreError, StoreFuture};
use crate::models::Room;

/// Process-local room store, used when no database is configured
#[derive(Default)]
pub struct MemoryRoomStore {
    rooms: RwLock<HashMap<Uuid, Room>>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoomStore for MemoryRoomStore {
    fn get(&self, room_id: Uuid) -> StoreFuture<'_, Room> {
        Box::pin(async move {
            self.rooms
                .read()
                .await
                .get(&room_id)
                .cloned()
                .ok_or(StoreError::NotFound(room_id))
        })
    }

    fn insert(&self, mut room: Room) -> StoreFuture<'_, Room> {
        Box::pin(async move {
            let mut rooms = self.rooms.write().await;
            if rooms.contains_key(&room.id) {
                return Err(StoreError::Conflict(room.id));
            }
            room.version = 1;
            rooms.insert(room.id, room.clone());
            Ok(room)
        })
    }

    fn save(&self, mut room: Room) -> StoreFuture<'_, Room> {
        Box::pin(async move {
            let mut rooms = self.rooms.write().await;
            let stored = rooms.get(&room.id).ok_or(StoreError::NotFound(room.id))?;
            if stored.version != room.version {
                return Err(StoreError::Conflict(room.id));
            }
            room.version += 1;
            rooms.insert(room.id, room.clone());
            Ok(room)
        })
    }

    fn find(&self, query: RoomQuery) -> StoreFuture<'_, Vec<Room>> {
        Box::pin(async move {
            let rooms = self.rooms.read().await;
            let mut found: Vec<Room> = rooms.values().filter(|r| query.matches(r)).cloned().collect();
            found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(found)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_save_detects_stale_version() {
        let store = MemoryRoomStore::new();
        let room = store
            .insert(Room::new("alice", "Physics".to_string(), String::new(), Utc::now()))
            .await
            .unwrap();
        assert_eq!(room.version, 1);

        let mut first = room.clone();
        first.content = "first".to_string();
        let saved = store.save(first).await.unwrap();
        assert_eq!(saved.version, 2);

        let mut stale = room.clone();
        stale.content = "stale".to_string();
        assert_eq!(store.save(stale).await, Err(StoreError::Conflict(room.id)));
        assert_eq!(store.get(room.id).await.unwrap().content, "first");
    }

    #[tokio::test]
    async fn test_find_by_membership() {
        let store = MemoryRoomStore::new();
        let mut room = Room::new("alice", "Physics".to_string(), String::new(), Utc::now());
        room.admit("bob", Utc::now()).unwrap();
        let room = store.insert(room).await.unwrap();

        assert_eq!(store.find(RoomQuery::ActiveMember("bob".into())).await.unwrap().len(), 1);
        assert_eq!(store.find(RoomQuery::OwnedBy("bob".into())).await.unwrap().len(), 0);
        assert_eq!(store.find(RoomQuery::OwnedBy("alice".into())).await.unwrap().len(), 1);

        let mut ended = room.clone();
        ended.end(Utc::now()).unwrap();
        store.save(ended).await.unwrap();
        assert!(store.find(RoomQuery::ActiveMember("bob".into())).await.unwrap().is_empty());
        assert_eq!(store.find(RoomQuery::AnyMember("bob".into())).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_unknown_room() {
        let store = MemoryRoomStore::new();
        let id = Uuid::new_v4();
        assert_eq!(store.get(id).await, Err(StoreError::NotFound(id)));
    }
}
