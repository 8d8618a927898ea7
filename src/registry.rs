//! ConnectionRegistry: live sessions, their room subscriptions, and the
//! fan-out targets they imply.
//!
//! This is the one structure many concurrent handlers mutate, so every
//! map lives behind a lock and nothing outside this module touches the
//! maps directly. A user may hold several concurrent sessions
//! (multi-device); a session belongs to exactly one user.

use std::collections::{HashMap, HashSet};

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::events::ServerEvent;
use crate::models::UserId;

/// Opaque handle for one live transport session.
pub type SessionId = Uuid;

/// Outbound half of a session; the socket's writer task drains it.
pub type SessionSender = mpsc::UnboundedSender<ServerEvent>;

struct SessionEntry {
    user_id: UserId,
    sender: SessionSender,
    rooms: HashSet<String>,
}

/// Result of unregistering a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Unregistered {
    pub user_id: UserId,
    /// True when this was the user's last live session, i.e. the user
    /// went fully offline.
    pub last_session: bool,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
    user_sessions: RwLock<HashMap<UserId, HashSet<SessionId>>>,
    room_sessions: RwLock<HashMap<String, HashSet<SessionId>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a session with a user. Idempotent per session; a repeat
    /// registration only refreshes the outbound sender.
    pub async fn register(&self, user_id: UserId, session_id: SessionId, sender: SessionSender) {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session_id) {
            Some(entry) => {
                entry.sender = sender;
            }
            None => {
                sessions.insert(
                    session_id,
                    SessionEntry {
                        user_id,
                        sender,
                        rooms: HashSet::new(),
                    },
                );
                let mut user_sessions = self.user_sessions.write().await;
                user_sessions
                    .entry(user_id)
                    .or_insert_with(HashSet::new)
                    .insert(session_id);
            }
        }
    }

    /// Drop a session and all of its room subscriptions. Reports whether
    /// the owning user went fully offline; `None` for unknown sessions.
    pub async fn unregister(&self, session_id: SessionId) -> Option<Unregistered> {
        let entry = {
            let mut sessions = self.sessions.write().await;
            sessions.remove(&session_id)?
        };

        {
            let mut room_sessions = self.room_sessions.write().await;
            for room_id in &entry.rooms {
                if let Some(members) = room_sessions.get_mut(room_id) {
                    members.remove(&session_id);
                    if members.is_empty() {
                        room_sessions.remove(room_id);
                    }
                }
            }
        }

        let last_session = {
            let mut user_sessions = self.user_sessions.write().await;
            match user_sessions.get_mut(&entry.user_id) {
                Some(ids) => {
                    ids.remove(&session_id);
                    if ids.is_empty() {
                        user_sessions.remove(&entry.user_id);
                        true
                    } else {
                        false
                    }
                }
                None => true,
            }
        };

        Some(Unregistered {
            user_id: entry.user_id,
            last_session,
        })
    }

    /// Join a room's broadcast set for this session only. Authorization
    /// is the caller's job. Returns false for unknown sessions.
    pub async fn subscribe(&self, session_id: SessionId, room_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(entry) = sessions.get_mut(&session_id) else {
            return false;
        };
        entry.rooms.insert(room_id.to_owned());
        let mut room_sessions = self.room_sessions.write().await;
        room_sessions
            .entry(room_id.to_owned())
            .or_insert_with(HashSet::new)
            .insert(session_id);
        true
    }

    /// Leave a room's broadcast set for this session only.
    pub async fn unsubscribe(&self, session_id: SessionId, room_id: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.get_mut(&session_id) {
            entry.rooms.remove(room_id);
        }
        let mut room_sessions = self.room_sessions.write().await;
        if let Some(members) = room_sessions.get_mut(room_id) {
            members.remove(&session_id);
            if members.is_empty() {
                room_sessions.remove(room_id);
            }
        }
    }

    /// Deliver an event to every session subscribed to the room.
    /// Best-effort: closed sessions are skipped, nothing is queued for
    /// absent ones.
    pub async fn broadcast(&self, room_id: &str, event: &ServerEvent, exclude: Option<SessionId>) {
        let targets = {
            let room_sessions = self.room_sessions.read().await;
            match room_sessions.get(room_id) {
                Some(ids) => ids.iter().copied().collect::<Vec<_>>(),
                None => return,
            }
        };

        let sessions = self.sessions.read().await;
        for session_id in targets {
            if Some(session_id) == exclude {
                continue;
            }
            if let Some(entry) = sessions.get(&session_id) {
                let _ = entry.sender.send(event.clone());
            }
        }
    }

    /// Deliver an event to all of a user's live sessions; a silent no-op
    /// when there are none.
    pub async fn send_to_user(&self, user_id: UserId, event: &ServerEvent) {
        let targets = {
            let user_sessions = self.user_sessions.read().await;
            match user_sessions.get(&user_id) {
                Some(ids) => ids.iter().copied().collect::<Vec<_>>(),
                None => return,
            }
        };

        let sessions = self.sessions.read().await;
        for session_id in targets {
            if let Some(entry) = sessions.get(&session_id) {
                let _ = entry.sender.send(event.clone());
            }
        }
    }

    pub async fn session_user(&self, session_id: SessionId) -> Option<UserId> {
        let sessions = self.sessions.read().await;
        sessions.get(&session_id).map(|entry| entry.user_id)
    }

    pub async fn user_session_count(&self, user_id: UserId) -> usize {
        let user_sessions = self.user_sessions.read().await;
        user_sessions.get(&user_id).map(HashSet::len).unwrap_or(0)
    }

    pub async fn room_session_count(&self, room_id: &str) -> usize {
        let room_sessions = self.room_sessions.read().await;
        room_sessions.get(room_id).map(HashSet::len).unwrap_or(0)
    }
}

/// Who is currently typing in each room. Ephemeral, never persisted.
#[derive(Default)]
pub struct TypingTracker {
    typing: RwLock<HashMap<String, HashSet<UserId>>>,
}

impl TypingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a typing-start/stop. Returns true when the state actually
    /// changed.
    pub async fn set_typing(&self, room_id: &str, user_id: UserId, is_typing: bool) -> bool {
        let mut typing = self.typing.write().await;
        if is_typing {
            typing
                .entry(room_id.to_owned())
                .or_insert_with(HashSet::new)
                .insert(user_id)
        } else {
            let Some(users) = typing.get_mut(room_id) else {
                return false;
            };
            let removed = users.remove(&user_id);
            if users.is_empty() {
                typing.remove(room_id);
            }
            removed
        }
    }

    /// Drop a user's typing entry for a room, reporting whether one
    /// existed. The message pipeline uses this for the implicit
    /// typing-stop on send.
    pub async fn clear(&self, room_id: &str, user_id: UserId) -> bool {
        self.set_typing(room_id, user_id, false).await
    }

    pub async fn is_typing(&self, room_id: &str, user_id: UserId) -> bool {
        let typing = self.typing.read().await;
        typing
            .get(room_id)
            .map(|users| users.contains(&user_id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RoomUserPayload;

    fn session_channel() -> (SessionSender, mpsc::UnboundedReceiver<ServerEvent>) {
        mpsc::unbounded_channel()
    }

    fn joined(user_id: UserId, room_id: &str) -> ServerEvent {
        ServerEvent::UserJoined(RoomUserPayload {
            user_id,
            room_id: room_id.to_owned(),
        })
    }

    #[tokio::test]
    async fn broadcast_reaches_only_the_rooms_subscribers() {
        let registry = ConnectionRegistry::new();
        let (tx_a, mut rx_a) = session_channel();
        let (tx_b, mut rx_b) = session_channel();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        registry.register(1, a, tx_a).await;
        registry.register(2, b, tx_b).await;
        registry.subscribe(a, "r1").await;
        registry.subscribe(b, "r2").await;

        registry.broadcast("r1", &joined(1, "r1"), None).await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_can_exclude_the_sender_session() {
        let registry = ConnectionRegistry::new();
        let (tx_a, mut rx_a) = session_channel();
        let (tx_b, mut rx_b) = session_channel();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        registry.register(1, a, tx_a).await;
        registry.register(2, b, tx_b).await;
        registry.subscribe(a, "r1").await;
        registry.subscribe(b, "r1").await;

        registry.broadcast("r1", &joined(1, "r1"), Some(a)).await;

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn unregister_reports_last_session() {
        let registry = ConnectionRegistry::new();
        let (tx_a, _rx_a) = session_channel();
        let (tx_b, _rx_b) = session_channel();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        registry.register(1, a, tx_a).await;
        registry.register(1, b, tx_b).await;

        let first = registry.unregister(a).await.expect("known session");
        assert!(!first.last_session);
        let second = registry.unregister(b).await.expect("known session");
        assert!(second.last_session);
        assert!(registry.unregister(b).await.is_none());
    }

    #[tokio::test]
    async fn unregister_removes_room_subscriptions() {
        let registry = ConnectionRegistry::new();
        let (tx_a, _rx_a) = session_channel();
        let a = Uuid::new_v4();
        registry.register(1, a, tx_a).await;
        registry.subscribe(a, "r1").await;
        assert_eq!(registry.room_session_count("r1").await, 1);

        registry.unregister(a).await;
        assert_eq!(registry.room_session_count("r1").await, 0);
    }

    #[tokio::test]
    async fn send_to_user_hits_every_device() {
        let registry = ConnectionRegistry::new();
        let (tx_a, mut rx_a) = session_channel();
        let (tx_b, mut rx_b) = session_channel();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        registry.register(5, a, tx_a).await;
        registry.register(5, b, tx_b).await;

        registry.send_to_user(5, &ServerEvent::error("ping")).await;
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());

        // No sessions for this user: silent no-op.
        registry.send_to_user(99, &ServerEvent::error("ping")).await;
    }

    #[tokio::test]
    async fn typing_tracker_reports_changes() {
        let tracker = TypingTracker::new();
        assert!(tracker.set_typing("r1", 1, true).await);
        assert!(!tracker.set_typing("r1", 1, true).await);
        assert!(tracker.is_typing("r1", 1).await);
        assert!(tracker.clear("r1", 1).await);
        assert!(!tracker.clear("r1", 1).await);
        assert!(!tracker.is_typing("r1", 1).await);
    }
}
