//! RealtimeMirror: the low-latency document store that polling clients
//! read directly.
//!
//! Not authoritative. Documents live under a realtime-database style REST
//! endpoint (`chats/{roomKey}`, `chats/{roomKey}/messages/{messageKey}`,
//! `presence/{userId}`) and are written with plain JSON PUTs. When no base
//! URL is configured every write is a no-op, which is also how tests run.

use serde_json::json;
use tracing::debug;

use crate::error::ChatResult;
use crate::models::{ChatRoom, Message, UserId, now_rfc3339};

#[derive(Clone)]
pub struct RealtimeMirror {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl RealtimeMirror {
    pub fn new(base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|url| url.trim_end_matches('/').to_owned())
            .filter(|url| !url.is_empty());
        RealtimeMirror {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Mirror that drops every write; used when the deployment has no
    /// mirror endpoint and throughout the tests.
    pub fn disabled() -> Self {
        RealtimeMirror::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some()
    }

    async fn put(&self, path: &str, body: &serde_json::Value) -> ChatResult<()> {
        let Some(base_url) = &self.base_url else {
            debug!(path, "mirror disabled, dropping write");
            return Ok(());
        };
        self.client
            .put(format!("{base_url}/{path}.json"))
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Room document written when a room is provisioned.
    pub async fn write_room(&self, room: &ChatRoom, member_count: u32) -> ChatResult<()> {
        let body = json!({
            "roomId": room.id,
            "name": room.name,
            "description": room.description,
            "isPrivate": room.is_private,
            "createdBy": room.created_by,
            "createdAt": room.created_at,
            "memberCount": member_count,
        });
        self.put(&format!("chats/{}", room.mirror_room_key), &body).await
    }

    /// Denormalized copy of a message, including its durable id, keyed by
    /// the mirror message key.
    pub async fn write_message(&self, room_key: &str, message: &Message) -> ChatResult<()> {
        let body = json!({
            "messageId": message.id,
            "content": message.content,
            "messageType": message.message_type,
            "senderId": message.sender_id,
            "roomId": message.room_id,
            "mirrorMessageKey": message.mirror_message_key,
            "metadata": message.metadata,
            "createdAt": message.created_at,
            "isRead": false,
        });
        self.put(
            &format!("chats/{}/messages/{}", room_key, message.mirror_message_key),
            &body,
        )
        .await
    }

    /// Presence document, overwritten on every transition.
    pub async fn write_presence(
        &self,
        user_id: UserId,
        is_online: bool,
        last_seen: Option<&str>,
    ) -> ChatResult<()> {
        let body = json!({
            "userId": user_id,
            "isOnline": is_online,
            "lastSeen": last_seen,
            "updatedAt": now_rfc3339(),
        });
        self.put(&format!("presence/{user_id}"), &body).await
    }
}
