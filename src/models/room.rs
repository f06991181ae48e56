use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::RoomError;

/// Edit permission carried by a participant
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    CanView,
    CanEdit,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::CanView => "can_view",
            Permission::CanEdit => "can_edit",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = RoomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "can_view" => Ok(Permission::CanView),
            "can_edit" => Ok(Permission::CanEdit),
            other => Err(RoomError::Validation(format!("Invalid permission '{}'", other))),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Member,
}

/// Lifecycle of one participant record. A user without a record is not a member.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MembershipState {
    Active,
    Former,
}

/// Membership of a user as seen from a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    NotAMember,
    Active { role: Role, permission: Permission },
    Former,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Participant {
    pub user_id: String,
    pub role: Role,
    pub state: MembershipState,
    pub permission: Permission,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    fn owner(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            role: Role::Owner,
            state: MembershipState::Active,
            permission: Permission::CanEdit,
            joined_at: now,
        }
    }

    fn member(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            role: Role::Member,
            state: MembershipState::Active,
            permission: Permission::CanView,
            joined_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == MembershipState::Active
    }

    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }

    /// Owners always hold edit rights regardless of the stored permission.
    pub fn can_edit(&self) -> bool {
        self.is_active() && (self.is_owner() || self.permission == Permission::CanEdit)
    }
}

/// A study room: roster, shared document and lifecycle flag.
///
/// Every mutation goes through one of the transition methods below, which
/// either apply a complete change or leave the room untouched.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Room {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub participants: Vec<Participant>,
    pub content: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Store revision, bumped on every successful save
    #[serde(default)]
    pub version: i64,
}

impl Room {
    pub fn new(owner_id: &str, name: String, description: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            description,
            participants: vec![Participant::owner(owner_id, now)],
            content: String::new(),
            is_active: true,
            created_at: now,
            last_modified: now,
            ended_at: None,
            version: 0,
        }
    }

    pub fn ensure_active(&self) -> Result<(), RoomError> {
        if self.is_active {
            Ok(())
        } else {
            Err(RoomError::RoomInactive(self.id))
        }
    }

    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    fn participant_mut(&mut self, user_id: &str) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.user_id == user_id)
    }

    pub fn membership(&self, user_id: &str) -> Membership {
        match self.participant(user_id) {
            None => Membership::NotAMember,
            Some(p) if p.is_active() => Membership::Active {
                role: p.role,
                permission: p.permission,
            },
            Some(_) => Membership::Former,
        }
    }

    pub fn is_active_participant(&self, user_id: &str) -> bool {
        self.is_active && matches!(self.membership(user_id), Membership::Active { .. })
    }

    pub fn is_owner(&self, user_id: &str) -> bool {
        matches!(self.membership(user_id), Membership::Active { role: Role::Owner, .. })
    }

    #[cfg(test)]
    pub fn owner(&self) -> Option<&Participant> {
        self.participants.iter().find(|p| p.is_active() && p.is_owner())
    }

    pub fn active_participant_ids(&self) -> Vec<String> {
        self.participants
            .iter()
            .filter(|p| p.is_active())
            .map(|p| p.user_id.clone())
            .collect()
    }

    pub fn ensure_owner(&self, user_id: &str) -> Result<(), RoomError> {
        match self.membership(user_id) {
            Membership::Active { role: Role::Owner, .. } => Ok(()),
            Membership::Active { .. } => Err(RoomError::NotAuthorized(
                "Only the owner can perform this action".to_string(),
            )),
            _ => Err(RoomError::NotAMember(user_id.to_string())),
        }
    }

    /// not_a_member|former -> active(can_view)
    pub fn admit(&mut self, user_id: &str, now: DateTime<Utc>) -> Result<(), RoomError> {
        self.ensure_active()?;
        match self.membership(user_id) {
            Membership::Active { role: Role::Owner, .. } => {
                return Err(RoomError::AlreadyOwner(user_id.to_string()))
            }
            Membership::Active { .. } => return Err(RoomError::AlreadyActive(user_id.to_string())),
            Membership::Former => {
                if let Some(p) = self.participant_mut(user_id) {
                    *p = Participant::member(user_id, now);
                }
            }
            Membership::NotAMember => self.participants.push(Participant::member(user_id, now)),
        }
        self.last_modified = now;
        Ok(())
    }

    /// active -> former, for a non-owner participant
    pub fn retire(&mut self, user_id: &str, now: DateTime<Utc>) -> Result<(), RoomError> {
        self.ensure_active()?;
        match self.participant_mut(user_id) {
            Some(p) if p.is_active() => {
                if p.is_owner() {
                    return Err(RoomError::NotAuthorized(
                        "The owner cannot be removed from the room".to_string(),
                    ));
                }
                p.state = MembershipState::Former;
            }
            _ => return Err(RoomError::NotAMember(user_id.to_string())),
        }
        self.last_modified = now;
        Ok(())
    }

    /// Ends the room for everyone. Returns the ids that were active beforehand.
    pub fn end(&mut self, now: DateTime<Utc>) -> Result<Vec<String>, RoomError> {
        self.ensure_active()?;
        let previously_active = self.active_participant_ids();
        for p in self.participants.iter_mut() {
            p.state = MembershipState::Former;
        }
        self.is_active = false;
        self.ended_at.get_or_insert(now);
        self.last_modified = now;
        Ok(previously_active)
    }

    pub fn transfer_ownership(
        &mut self,
        owner_id: &str,
        new_owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RoomError> {
        self.ensure_active()?;
        self.ensure_owner(owner_id)?;
        match self.membership(new_owner_id) {
            Membership::Active { role: Role::Owner, .. } => {
                return Err(RoomError::Noop("User already owns the room".to_string()))
            }
            Membership::Active { .. } => {}
            _ => return Err(RoomError::NotAParticipant(new_owner_id.to_string())),
        }

        // Both records change in this one step so the room never has zero or two owners.
        for p in self.participants.iter_mut() {
            if p.user_id == owner_id {
                p.role = Role::Member;
                p.permission = Permission::CanView;
            } else if p.user_id == new_owner_id {
                p.role = Role::Owner;
                p.permission = Permission::CanEdit;
            }
        }
        self.last_modified = now;
        Ok(())
    }

    pub fn set_permission(
        &mut self,
        acting_user_id: &str,
        target_user_id: &str,
        permission: Permission,
        now: DateTime<Utc>,
    ) -> Result<(), RoomError> {
        self.ensure_active()?;
        self.ensure_owner(acting_user_id)?;
        let target = match self.participant_mut(target_user_id) {
            Some(p) if p.is_active() => p,
            _ => return Err(RoomError::NotAParticipant(target_user_id.to_string())),
        };
        if target.is_owner() {
            return Err(RoomError::Validation(
                "The owner's permission cannot be changed".to_string(),
            ));
        }
        if target.permission == permission {
            return Err(RoomError::Noop(format!(
                "Participant already has permission '{}'",
                permission
            )));
        }
        target.permission = permission;
        self.last_modified = now;
        Ok(())
    }

    /// Last write wins: no version check on the content itself.
    pub fn write_content(
        &mut self,
        editor_id: &str,
        content: String,
        now: DateTime<Utc>,
    ) -> Result<(), RoomError> {
        self.ensure_active()?;
        match self.participant(editor_id) {
            Some(p) if p.can_edit() => {}
            Some(p) if p.is_active() => {
                return Err(RoomError::NotAuthorized(
                    "You do not have permission to edit".to_string(),
                ))
            }
            _ => return Err(RoomError::NotAMember(editor_id.to_string())),
        }
        self.content = content;
        self.last_modified = now;
        Ok(())
    }

    pub fn update_info(
        &mut self,
        owner_id: &str,
        name: Option<String>,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), RoomError> {
        self.ensure_active()?;
        self.ensure_owner(owner_id)?;
        if let Some(name) = name {
            self.name = name;
        }
        if let Some(description) = description {
            self.description = description;
        }
        self.last_modified = now;
        Ok(())
    }

    #[cfg(test)]
    pub fn active_owner_count(&self) -> usize {
        self.participants
            .iter()
            .filter(|p| p.is_active() && p.is_owner())
            .count()
    }
}
