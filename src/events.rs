//! The transport event contract.
//!
//! Both directions carry `{"event": <name>, "data": <payload>}` frames,
//! modeled as adjacently tagged enums so the dispatch table is a single
//! `match`.

use serde::{Deserialize, Serialize};

use crate::models::{Message, MessageType, UserId, UserSummary};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomPayload {
    pub user_id: UserId,
    pub room_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRoomPayload {
    pub user_id: UserId,
    pub room_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub user_id: UserId,
    pub room_id: String,
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub user_id: UserId,
    pub room_id: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAsReadPayload {
    pub message_id: String,
    pub user_id: UserId,
}

/// Inbound events a connected client may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    JoinRoom(JoinRoomPayload),
    LeaveRoom(LeaveRoomPayload),
    SendMessage(SendMessagePayload),
    Typing(TypingPayload),
    MarkAsRead(MarkAsReadPayload),
}

/// Full message row plus the sender's public profile fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    #[serde(flatten)]
    pub message: Message,
    pub sender: Option<UserSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUserPayload {
    pub user_id: UserId,
    pub room_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReadPayload {
    pub message_id: String,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Outbound events fanned out to sessions.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    NewMessage(MessagePayload),
    UserJoined(RoomUserPayload),
    UserLeft(RoomUserPayload),
    UserTyping(TypingPayload),
    MessageRead(MessageReadPayload),
    Error(ErrorPayload),
}

impl ServerEvent {
    pub fn error<T: Into<String>>(message: T) -> Self {
        ServerEvent::Error(ErrorPayload {
            message: message.into(),
        })
    }
}
