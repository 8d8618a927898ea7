//! MessagePipeline: the send-message and read-receipt critical path.
//!
//! Order on the send path: authorize, persist (durability boundary),
//! mirror, broadcast. A per-room lock is held from persist through
//! broadcast so messages fan out in durable-commit order within a room;
//! sends to different rooms never contend.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::authorizer::RoomAuthorizer;
use crate::error::{ChatError, ChatResult};
use crate::events::{MessagePayload, MessageReadPayload, ServerEvent, TypingPayload};
use crate::mirror::RealtimeMirror;
use crate::models::{MessageType, UserId, validate_user_id};
use crate::registry::{ConnectionRegistry, TypingTracker};
use crate::store;

#[derive(Clone)]
pub struct MessagePipeline {
    db_pool: SqlitePool,
    mirror: RealtimeMirror,
    registry: Arc<ConnectionRegistry>,
    typing: Arc<TypingTracker>,
    authorizer: RoomAuthorizer,
    room_locks: Arc<RwLock<HashMap<String, Arc<Mutex<()>>>>>,
}

impl MessagePipeline {
    pub fn new(
        db_pool: SqlitePool,
        mirror: RealtimeMirror,
        registry: Arc<ConnectionRegistry>,
        typing: Arc<TypingTracker>,
    ) -> Self {
        let authorizer = RoomAuthorizer::new(db_pool.clone());
        MessagePipeline {
            db_pool,
            mirror,
            registry,
            typing,
            authorizer,
            room_locks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn room_lock(&self, room_id: &str) -> Arc<Mutex<()>> {
        {
            let locks = self.room_locks.read().await;
            if let Some(lock) = locks.get(room_id) {
                return Arc::clone(lock);
            }
        }
        let mut locks = self.room_locks.write().await;
        Arc::clone(
            locks
                .entry(room_id.to_owned())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Send a message: authorize, persist, mirror, fan out. The durable
    /// insert is the durability boundary; a mirror failure past it is
    /// logged and the broadcast still happens.
    pub async fn send_message(
        &self,
        user_id: UserId,
        room_id: &str,
        content: &str,
        message_type: MessageType,
        metadata: Option<serde_json::Value>,
    ) -> ChatResult<MessagePayload> {
        validate_user_id(user_id)?;
        if content.trim().is_empty() {
            return Err(ChatError::invalid_input("Message content must not be empty"));
        }

        self.authorizer.check_membership(user_id, room_id).await?;

        let room = store::find_room(&self.db_pool, room_id)
            .await?
            .ok_or_else(|| ChatError::room_not_found("Room not found"))?;
        if room.mirror_room_key.trim().is_empty() {
            return Err(ChatError::invalid_room_state(
                "Room has no realtime mirror key",
            ));
        }

        let lock = self.room_lock(room_id).await;
        let _ordering = lock.lock().await;

        let mirror_message_key = Uuid::new_v4().to_string();
        let message = store::insert_message(
            &self.db_pool,
            room_id,
            user_id,
            content,
            message_type,
            &mirror_message_key,
            metadata,
        )
        .await?;

        if let Err(err) = self.mirror.write_message(&room.mirror_room_key, &message).await {
            warn!(
                message_id = %message.id,
                %err,
                "mirror write failed after durable commit; message needs reconciliation"
            );
        }

        let sender = match store::find_user_summary(&self.db_pool, user_id).await {
            Ok(sender) => sender,
            Err(err) => {
                warn!(user_id, %err, "sender lookup failed; broadcasting without profile");
                None
            }
        };

        let payload = MessagePayload { message, sender };
        self.registry
            .broadcast(room_id, &ServerEvent::NewMessage(payload.clone()), None)
            .await;

        // A typing-stop is expected from the client but the pipeline must
        // not rely on it.
        if self.typing.clear(room_id, user_id).await {
            self.registry
                .broadcast(
                    room_id,
                    &ServerEvent::UserTyping(TypingPayload {
                        user_id,
                        room_id: room_id.to_owned(),
                        is_typing: false,
                    }),
                    None,
                )
                .await;
        }

        info!(user_id, room_id, message_id = %payload.message.id, "message sent");
        Ok(payload)
    }

    /// Mark a message read and notify the room. Idempotent: re-marking an
    /// already-read message broadcasts again but is not an error.
    pub async fn mark_message_as_read(
        &self,
        message_id: &str,
        user_id: UserId,
    ) -> ChatResult<()> {
        validate_user_id(user_id)?;

        let message = store::find_message(&self.db_pool, message_id)
            .await?
            .ok_or_else(|| ChatError::message_not_found("Message not found"))?;

        self.authorizer
            .check_membership(user_id, &message.room_id)
            .await?;

        store::mark_message_read(&self.db_pool, message_id).await?;

        self.registry
            .broadcast(
                &message.room_id,
                &ServerEvent::MessageRead(MessageReadPayload {
                    message_id: message_id.to_owned(),
                    user_id,
                }),
                None,
            )
            .await;
        Ok(())
    }
}
