//! Durable-store row types shared by every component.

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::{ChatError, ChatResult};

/// Identity of a registered participant.
pub type UserId = i64;

/// Current wall-clock time as an RFC 3339 string, the format every
/// timestamp column uses.
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

/// Reject the zero/negative ids that a client-supplied payload can carry.
pub fn validate_user_id(user_id: UserId) -> ChatResult<()> {
    if user_id <= 0 {
        return Err(ChatError::invalid_input("Invalid user ID"));
    }
    Ok(())
}

/// A registered participant. `is_online`/`last_seen` are written only by
/// the presence tracker.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
    pub is_online: bool,
    pub last_seen: Option<String>,
    pub created_at: String,
}

/// The public profile fields attached to outbound message payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub profile_picture: Option<String>,
}

/// A conversation scope. `mirror_room_key` is assigned at provisioning;
/// a room without one cannot carry messages.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_private: bool,
    pub created_by: UserId,
    pub mirror_room_key: String,
    pub created_at: String,
}

/// Member role within a room, ordered `admin > moderator > member`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Moderator,
    #[default]
    Member,
}

impl MemberRole {
    /// Only admins and moderators may add or remove members.
    pub fn can_manage_members(&self) -> bool {
        matches!(self, MemberRole::Admin | MemberRole::Moderator)
    }

    /// Only an admin may remove another admin.
    pub fn can_remove(&self, target: MemberRole) -> bool {
        target != MemberRole::Admin || *self == MemberRole::Admin
    }
}

/// A user's standing in a room. Removal soft-deletes via `is_active`;
/// at most one row exists per (user, room).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RoomMembership {
    pub id: String,
    pub user_id: UserId,
    pub room_id: String,
    pub role: MemberRole,
    pub joined_at: String,
    pub is_active: bool,
}

/// Kind of message content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    File,
    Audio,
    Video,
}

/// One chat message. `is_read` is monotonic: once true, never reset.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub room_id: String,
    pub sender_id: UserId,
    pub content: String,
    pub message_type: MessageType,
    pub mirror_message_key: String,
    pub is_read: bool,
    pub metadata: Option<Json<serde_json::Value>>,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_management_gate() {
        assert!(MemberRole::Admin.can_manage_members());
        assert!(MemberRole::Moderator.can_manage_members());
        assert!(!MemberRole::Member.can_manage_members());
    }

    #[test]
    fn only_admin_removes_admin() {
        assert!(MemberRole::Admin.can_remove(MemberRole::Admin));
        assert!(MemberRole::Admin.can_remove(MemberRole::Moderator));
        assert!(!MemberRole::Moderator.can_remove(MemberRole::Admin));
        assert!(MemberRole::Moderator.can_remove(MemberRole::Member));
    }

    #[test]
    fn user_id_validation() {
        assert!(validate_user_id(1).is_ok());
        assert!(validate_user_id(0).is_err());
        assert!(validate_user_id(-3).is_err());
    }
}
