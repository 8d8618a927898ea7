//! DurableStore: the SQLite system of record for users, rooms,
//! memberships, and messages.
//!
//! Every component re-reads through these queries rather than caching
//! rows across actions.

use sqlx::SqlitePool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::error::ChatResult;
use crate::models::{
    ChatRoom, MemberRole, Message, MessageType, RoomMembership, User, UserId, UserSummary,
    now_rfc3339,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL,
    last_name TEXT,
    phone_number TEXT,
    profile_picture TEXT,
    is_online INTEGER NOT NULL DEFAULT 0,
    last_seen TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rooms (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    is_private INTEGER NOT NULL DEFAULT 0,
    created_by INTEGER NOT NULL REFERENCES users(id),
    mirror_room_key TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS room_members (
    id TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(id),
    room_id TEXT NOT NULL REFERENCES rooms(id),
    role TEXT NOT NULL DEFAULT 'member',
    joined_at TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    UNIQUE(user_id, room_id)
);

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    room_id TEXT NOT NULL REFERENCES rooms(id),
    sender_id INTEGER NOT NULL REFERENCES users(id),
    content TEXT NOT NULL,
    message_type TEXT NOT NULL DEFAULT 'text',
    mirror_message_key TEXT NOT NULL UNIQUE,
    is_read INTEGER NOT NULL DEFAULT 0,
    metadata TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_room_created
    ON messages(room_id, created_at);
"#;

/// Create the schema if it does not exist. Failure here at process start
/// is fatal to the caller.
pub async fn init_schema(db_pool: &SqlitePool) -> ChatResult<()> {
    sqlx::raw_sql(SCHEMA).execute(db_pool).await?;
    Ok(())
}

pub async fn create_user(
    db_pool: &SqlitePool,
    first_name: &str,
    last_name: Option<&str>,
    phone_number: Option<&str>,
    profile_picture: Option<&str>,
) -> ChatResult<User> {
    let user: User = sqlx::query_as(
        "INSERT INTO users (first_name, last_name, phone_number, profile_picture, created_at) \
         VALUES (?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(first_name)
    .bind(last_name)
    .bind(phone_number)
    .bind(profile_picture)
    .bind(now_rfc3339())
    .fetch_one(db_pool)
    .await?;
    Ok(user)
}

pub async fn find_user(db_pool: &SqlitePool, user_id: UserId) -> ChatResult<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?;
    Ok(user)
}

pub async fn find_user_summary(
    db_pool: &SqlitePool,
    user_id: UserId,
) -> ChatResult<Option<UserSummary>> {
    let summary = sqlx::query_as::<_, UserSummary>(
        "SELECT id, first_name, last_name, profile_picture FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(db_pool)
    .await?;
    Ok(summary)
}

/// Only the presence tracker calls this.
pub async fn set_user_presence(
    db_pool: &SqlitePool,
    user_id: UserId,
    is_online: bool,
    last_seen: Option<&str>,
) -> ChatResult<()> {
    sqlx::query("UPDATE users SET is_online = ?, last_seen = ? WHERE id = ?")
        .bind(is_online)
        .bind(last_seen)
        .bind(user_id)
        .execute(db_pool)
        .await?;
    Ok(())
}

/// Insert a room with a fresh id and mirror key.
pub async fn create_room(
    db_pool: &SqlitePool,
    name: &str,
    description: Option<&str>,
    is_private: bool,
    created_by: UserId,
) -> ChatResult<ChatRoom> {
    let room: ChatRoom = sqlx::query_as(
        "INSERT INTO rooms (id, name, description, is_private, created_by, mirror_room_key, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(name)
    .bind(description)
    .bind(is_private)
    .bind(created_by)
    .bind(Uuid::new_v4().to_string())
    .bind(now_rfc3339())
    .fetch_one(db_pool)
    .await?;
    Ok(room)
}

pub async fn find_room(db_pool: &SqlitePool, room_id: &str) -> ChatResult<Option<ChatRoom>> {
    let room = sqlx::query_as::<_, ChatRoom>("SELECT * FROM rooms WHERE id = ?")
        .bind(room_id)
        .fetch_optional(db_pool)
        .await?;
    Ok(room)
}

pub async fn create_membership(
    db_pool: &SqlitePool,
    user_id: UserId,
    room_id: &str,
    role: MemberRole,
) -> ChatResult<RoomMembership> {
    let membership: RoomMembership = sqlx::query_as(
        "INSERT INTO room_members (id, user_id, room_id, role, joined_at, is_active) \
         VALUES (?, ?, ?, ?, ?, 1) RETURNING *",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(room_id)
    .bind(role)
    .bind(now_rfc3339())
    .fetch_one(db_pool)
    .await?;
    Ok(membership)
}

/// The membership row regardless of its active flag, if any.
pub async fn find_membership(
    db_pool: &SqlitePool,
    user_id: UserId,
    room_id: &str,
) -> ChatResult<Option<RoomMembership>> {
    let membership = sqlx::query_as::<_, RoomMembership>(
        "SELECT * FROM room_members WHERE user_id = ? AND room_id = ?",
    )
    .bind(user_id)
    .bind(room_id)
    .fetch_optional(db_pool)
    .await?;
    Ok(membership)
}

pub async fn find_active_membership(
    db_pool: &SqlitePool,
    user_id: UserId,
    room_id: &str,
) -> ChatResult<Option<RoomMembership>> {
    let membership = sqlx::query_as::<_, RoomMembership>(
        "SELECT * FROM room_members WHERE user_id = ? AND room_id = ? AND is_active = 1",
    )
    .bind(user_id)
    .bind(room_id)
    .fetch_optional(db_pool)
    .await?;
    Ok(membership)
}

/// Bring a soft-deleted membership back with a new role and join time.
/// The (user, room) row is unique, so this is how re-adding a removed
/// member "creates" an active membership.
pub async fn reactivate_membership(
    db_pool: &SqlitePool,
    membership_id: &str,
    role: MemberRole,
) -> ChatResult<RoomMembership> {
    let membership: RoomMembership = sqlx::query_as(
        "UPDATE room_members SET is_active = 1, role = ?, joined_at = ? WHERE id = ? RETURNING *",
    )
    .bind(role)
    .bind(now_rfc3339())
    .bind(membership_id)
    .fetch_one(db_pool)
    .await?;
    Ok(membership)
}

pub async fn deactivate_membership(db_pool: &SqlitePool, membership_id: &str) -> ChatResult<()> {
    sqlx::query("UPDATE room_members SET is_active = 0 WHERE id = ?")
        .bind(membership_id)
        .execute(db_pool)
        .await?;
    Ok(())
}

/// A user's active memberships, newest join first.
pub async fn list_user_memberships(
    db_pool: &SqlitePool,
    user_id: UserId,
) -> ChatResult<Vec<RoomMembership>> {
    let memberships = sqlx::query_as::<_, RoomMembership>(
        "SELECT * FROM room_members WHERE user_id = ? AND is_active = 1 ORDER BY joined_at DESC",
    )
    .bind(user_id)
    .fetch_all(db_pool)
    .await?;
    Ok(memberships)
}

/// The durability boundary of the send path: once this insert commits the
/// message counts as sent.
pub async fn insert_message(
    db_pool: &SqlitePool,
    room_id: &str,
    sender_id: UserId,
    content: &str,
    message_type: MessageType,
    mirror_message_key: &str,
    metadata: Option<serde_json::Value>,
) -> ChatResult<Message> {
    let message: Message = sqlx::query_as(
        "INSERT INTO messages \
         (id, room_id, sender_id, content, message_type, mirror_message_key, is_read, metadata, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?) RETURNING *",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(room_id)
    .bind(sender_id)
    .bind(content)
    .bind(message_type)
    .bind(mirror_message_key)
    .bind(metadata.map(Json))
    .bind(now_rfc3339())
    .fetch_one(db_pool)
    .await?;
    Ok(message)
}

pub async fn find_message(db_pool: &SqlitePool, message_id: &str) -> ChatResult<Option<Message>> {
    let message = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = ?")
        .bind(message_id)
        .fetch_optional(db_pool)
        .await?;
    Ok(message)
}

/// Idempotent: re-marking an already-read message is a no-op.
pub async fn mark_message_read(db_pool: &SqlitePool, message_id: &str) -> ChatResult<()> {
    sqlx::query("UPDATE messages SET is_read = 1 WHERE id = ?")
        .bind(message_id)
        .execute(db_pool)
        .await?;
    Ok(())
}

/// One page of a room's messages, newest first.
pub async fn list_room_messages(
    db_pool: &SqlitePool,
    room_id: &str,
    limit: i64,
    offset: i64,
) -> ChatResult<Vec<Message>> {
    let messages = sqlx::query_as::<_, Message>(
        "SELECT * FROM messages WHERE room_id = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
    )
    .bind(room_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db_pool)
    .await?;
    Ok(messages)
}

#[cfg(test)]
pub(crate) mod test_support {
    use sqlx::SqlitePool;
    use sqlx::sqlite::SqlitePoolOptions;

    use crate::models::{MemberRole, User, UserId};

    /// Fresh in-memory database with the schema applied. One connection,
    /// since each in-memory SQLite connection is its own database.
    pub async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        super::init_schema(&pool).await.expect("schema");
        pool
    }

    pub async fn seed_user(pool: &SqlitePool, first_name: &str) -> User {
        super::create_user(pool, first_name, None, None, None)
            .await
            .expect("seed user")
    }

    pub async fn seed_room_with_admin(
        pool: &SqlitePool,
        name: &str,
        admin_id: UserId,
    ) -> crate::models::ChatRoom {
        let room = super::create_room(pool, name, None, false, admin_id)
            .await
            .expect("seed room");
        super::create_membership(pool, admin_id, &room.id, MemberRole::Admin)
            .await
            .expect("seed admin membership");
        room
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_support::{memory_pool, seed_room_with_admin, seed_user};

    #[tokio::test]
    async fn message_round_trip_with_metadata() {
        let pool = memory_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let room = seed_room_with_admin(&pool, "general", alice.id).await;

        let metadata = serde_json::json!({ "fileName": "notes.txt" });
        let message = insert_message(
            &pool,
            &room.id,
            alice.id,
            "hello",
            MessageType::Text,
            "mirror-key-1",
            Some(metadata.clone()),
        )
        .await
        .expect("insert");

        let found = find_message(&pool, &message.id)
            .await
            .expect("query")
            .expect("present");
        assert_eq!(found.content, "hello");
        assert!(!found.is_read);
        assert_eq!(found.metadata.map(|m| m.0), Some(metadata));
    }

    #[tokio::test]
    async fn mark_read_is_idempotent() {
        let pool = memory_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let room = seed_room_with_admin(&pool, "general", alice.id).await;
        let message = insert_message(&pool, &room.id, alice.id, "hi", MessageType::Text, "k1", None)
            .await
            .expect("insert");

        mark_message_read(&pool, &message.id).await.expect("first");
        mark_message_read(&pool, &message.id).await.expect("second");
        let found = find_message(&pool, &message.id)
            .await
            .expect("query")
            .expect("present");
        assert!(found.is_read);
    }

    #[tokio::test]
    async fn membership_soft_delete_and_reactivate() {
        let pool = memory_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;
        let room = seed_room_with_admin(&pool, "general", alice.id).await;

        let membership = create_membership(&pool, bob.id, &room.id, MemberRole::Member)
            .await
            .expect("create");
        deactivate_membership(&pool, &membership.id)
            .await
            .expect("deactivate");
        assert!(
            find_active_membership(&pool, bob.id, &room.id)
                .await
                .expect("query")
                .is_none()
        );

        let revived = reactivate_membership(&pool, &membership.id, MemberRole::Moderator)
            .await
            .expect("reactivate");
        assert!(revived.is_active);
        assert_eq!(revived.role, MemberRole::Moderator);
    }

    #[tokio::test]
    async fn message_pages_are_newest_first() {
        let pool = memory_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let room = seed_room_with_admin(&pool, "general", alice.id).await;
        for i in 0..5 {
            insert_message(
                &pool,
                &room.id,
                alice.id,
                &format!("m{i}"),
                MessageType::Text,
                &format!("key-{i}"),
                None,
            )
            .await
            .expect("insert");
        }

        let page = list_room_messages(&pool, &room.id, 2, 0).await.expect("page");
        assert_eq!(page.len(), 2);
        let rest = list_room_messages(&pool, &room.id, 10, 2).await.expect("rest");
        assert_eq!(rest.len(), 3);
    }
}
