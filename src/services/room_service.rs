use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::store::{RoomQuery, RoomStore};
use crate::models::{CreateRoomRequest, Participant, Permission, Room, RoomError, UpdateRoomRequest};
use crate::services::locks::KeyedLocks;

const MAX_USER_ID_LEN: usize = 128;
const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 500;

/// Result of ending a room
#[derive(Debug, Clone)]
pub struct EndedRoom {
    pub room: Room,
    /// Users that were active right before the room ended
    pub previously_active: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum LeaveOutcome {
    Left(Room),
    /// The owner left, which ends the room for everyone
    Ended(EndedRoom),
}

fn validate_user_id(user_id: &str) -> Result<(), RoomError> {
    if user_id.trim().is_empty() {
        return Err(RoomError::Validation("User id cannot be empty".to_string()));
    }
    if user_id.len() > MAX_USER_ID_LEN {
        return Err(RoomError::Validation("User id is too long".to_string()));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), RoomError> {
    let len = name.trim().chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(RoomError::Validation(format!(
            "Name must be between 1 and {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), RoomError> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(RoomError::Validation(format!(
            "Description must be at most {} characters",
            MAX_DESCRIPTION_LEN
        )));
    }
    Ok(())
}

/// Membership and permission state machine over the room store.
///
/// Every mutation runs as read-validate-write under the room's lock. Joins and
/// creations also hold the user's lock (always taken before the room lock) so
/// that a user can never end up active in two rooms.
pub struct RoomService {
    store: Arc<dyn RoomStore>,
    room_locks: KeyedLocks<Uuid>,
    user_locks: KeyedLocks<String>,
}

impl RoomService {
    pub fn new(store: Arc<dyn RoomStore>) -> Self {
        Self {
            store,
            room_locks: KeyedLocks::new(),
            user_locks: KeyedLocks::new(),
        }
    }

    pub fn lock_count(&self) -> usize {
        self.room_locks.len() + self.user_locks.len()
    }

    /// Apply `transition` to the stored room and persist the result as one write.
    async fn mutate<T, F>(&self, room_id: Uuid, transition: F) -> Result<(Room, T), RoomError>
    where
        F: FnOnce(&mut Room, DateTime<Utc>) -> Result<T, RoomError>,
    {
        let _guard = self.room_locks.lock(&room_id).await;
        let mut room = self.store.get(room_id).await?;
        let out = match transition(&mut room, Utc::now()) {
            Ok(out) => out,
            Err(e) => {
                warn!("Rejected change to study room {}: {}", room_id, e);
                return Err(e);
            }
        };
        let saved = self.store.save(room).await?;
        Ok((saved, out))
    }

    pub async fn create_room(&self, owner_id: &str, info: CreateRoomRequest) -> Result<Room, RoomError> {
        validate_user_id(owner_id)?;
        validate_name(&info.name)?;
        let description = info.description.unwrap_or_default();
        validate_description(&description)?;

        let _user_guard = self.user_locks.lock(&owner_id.to_string()).await;
        if !self.store.find(RoomQuery::ActiveMember(owner_id.to_string())).await?.is_empty() {
            warn!("User {} tried to create a room while already in one", owner_id);
            return Err(RoomError::AlreadyInRoom(owner_id.to_string()));
        }

        let room = Room::new(owner_id, info.name.trim().to_string(), description, Utc::now());
        let room = self.store.insert(room).await?;
        info!("Study room {} created by {}", room.id, owner_id);
        Ok(room)
    }

    /// Readable by anyone holding a participant record, current or former
    pub async fn get_room(&self, user_id: &str, room_id: Uuid) -> Result<Room, RoomError> {
        validate_user_id(user_id)?;
        let room = self.store.get(room_id).await?;
        if room.participant(user_id).is_none() {
            return Err(RoomError::NotAuthorized(
                "You are not a participant of this study room".to_string(),
            ));
        }
        Ok(room)
    }

    pub async fn list_rooms(&self, user_id: &str, owned: bool) -> Result<Vec<Room>, RoomError> {
        validate_user_id(user_id)?;
        let query = if owned {
            RoomQuery::OwnedBy(user_id.to_string())
        } else {
            RoomQuery::AnyMember(user_id.to_string())
        };
        Ok(self.store.find(query).await?)
    }

    /// Active and former participants, in that order
    pub async fn list_participants(
        &self,
        user_id: &str,
        room_id: Uuid,
    ) -> Result<(Vec<Participant>, Vec<Participant>), RoomError> {
        let room = self.get_room(user_id, room_id).await?;
        Ok(room.participants.into_iter().partition(|p| p.is_active()))
    }

    pub async fn is_active_participant(&self, user_id: &str, room_id: Uuid) -> Result<bool, RoomError> {
        let room = self.store.get(room_id).await?;
        Ok(room.is_active_participant(user_id))
    }

    pub async fn active_room_of(&self, user_id: &str) -> Result<Option<Room>, RoomError> {
        let mut rooms = self.store.find(RoomQuery::ActiveMember(user_id.to_string())).await?;
        Ok(rooms.pop())
    }

    pub async fn update_room_info(
        &self,
        owner_id: &str,
        room_id: Uuid,
        update: UpdateRoomRequest,
    ) -> Result<Room, RoomError> {
        validate_user_id(owner_id)?;
        let name = update.name.map(|n| n.trim().to_string());
        if let Some(name) = &name {
            validate_name(name)?;
        }
        if let Some(description) = &update.description {
            validate_description(description)?;
        }
        let (room, _) = self
            .mutate(room_id, |room, now| room.update_info(owner_id, name, update.description, now))
            .await?;
        Ok(room)
    }

    pub async fn join_room(&self, user_id: &str, room_id: Uuid) -> Result<Room, RoomError> {
        validate_user_id(user_id)?;
        let _user_guard = self.user_locks.lock(&user_id.to_string()).await;
        let _room_guard = self.room_locks.lock(&room_id).await;

        let mut room = self.store.get(room_id).await?;
        let now = Utc::now();
        if let Err(e) = room.admit(user_id, now) {
            warn!("User {} cannot join study room {}: {}", user_id, room_id, e);
            return Err(e);
        }

        let elsewhere = self
            .store
            .find(RoomQuery::ActiveMember(user_id.to_string()))
            .await?
            .into_iter()
            .any(|r| r.id != room_id);
        if elsewhere {
            warn!("User {} is already active in another study room", user_id);
            return Err(RoomError::AlreadyInOtherRoom(user_id.to_string()));
        }

        let room = self.store.save(room).await?;
        info!("User {} joined study room {}", user_id, room_id);
        Ok(room)
    }

    /// Entry point for accepted invitations
    #[allow(dead_code)]
    pub async fn add_participant(&self, user_id: &str, room_id: Uuid) -> Result<Room, RoomError> {
        self.join_room(user_id, room_id).await
    }

    pub async fn leave_room(&self, user_id: &str, room_id: Uuid) -> Result<LeaveOutcome, RoomError> {
        validate_user_id(user_id)?;
        let (room, ended) = self
            .mutate(room_id, |room, now| {
                room.ensure_active()?;
                if room.is_owner(user_id) {
                    room.end(now).map(Some)
                } else {
                    room.retire(user_id, now).map(|_| None)
                }
            })
            .await?;

        Ok(match ended {
            Some(previously_active) => {
                info!("Owner {} left study room {}, room ended", user_id, room_id);
                LeaveOutcome::Ended(EndedRoom { room, previously_active })
            }
            None => {
                info!("User {} left study room {}", user_id, room_id);
                LeaveOutcome::Left(room)
            }
        })
    }

    pub async fn remove_participant(
        &self,
        acting_user_id: &str,
        target_user_id: &str,
        room_id: Uuid,
    ) -> Result<Room, RoomError> {
        validate_user_id(acting_user_id)?;
        validate_user_id(target_user_id)?;
        let (room, _) = self
            .mutate(room_id, |room, now| {
                room.ensure_active()?;
                if !room.is_active_participant(acting_user_id) {
                    return Err(RoomError::NotAMember(acting_user_id.to_string()));
                }
                if acting_user_id != target_user_id && !room.is_owner(acting_user_id) {
                    return Err(RoomError::NotAuthorized(
                        "Only the owner or the participant themselves can remove the participant"
                            .to_string(),
                    ));
                }
                room.retire(target_user_id, now)
            })
            .await?;
        info!("User {} removed {} from study room {}", acting_user_id, target_user_id, room_id);
        Ok(room)
    }

    pub async fn end_room(&self, owner_id: &str, room_id: Uuid) -> Result<EndedRoom, RoomError> {
        validate_user_id(owner_id)?;
        let (room, previously_active) = self
            .mutate(room_id, |room, now| {
                room.ensure_active()?;
                room.ensure_owner(owner_id)?;
                room.end(now)
            })
            .await?;
        info!("Study room {} ended by {}", room_id, owner_id);
        Ok(EndedRoom { room, previously_active })
    }

    pub async fn transfer_ownership(
        &self,
        owner_id: &str,
        new_owner_id: &str,
        room_id: Uuid,
    ) -> Result<Room, RoomError> {
        validate_user_id(owner_id)?;
        validate_user_id(new_owner_id)?;
        let (room, _) = self
            .mutate(room_id, |room, now| room.transfer_ownership(owner_id, new_owner_id, now))
            .await?;
        info!("Ownership of study room {} moved from {} to {}", room_id, owner_id, new_owner_id);
        Ok(room)
    }

    pub async fn set_permission(
        &self,
        acting_user_id: &str,
        target_user_id: &str,
        room_id: Uuid,
        permission: &str,
    ) -> Result<Room, RoomError> {
        validate_user_id(acting_user_id)?;
        validate_user_id(target_user_id)?;
        let permission: Permission = permission.parse()?;
        let (room, _) = self
            .mutate(room_id, |room, now| {
                room.set_permission(acting_user_id, target_user_id, permission, now)
            })
            .await?;
        info!("User {} now has {} in study room {}", target_user_id, permission, room_id);
        Ok(room)
    }

    pub async fn update_document(
        &self,
        editor_user_id: &str,
        room_id: Uuid,
        content: String,
    ) -> Result<Room, RoomError> {
        validate_user_id(editor_user_id)?;
        let (room, _) = self
            .mutate(room_id, |room, now| room.write_content(editor_user_id, content, now))
            .await?;
        Ok(room)
    }
}
