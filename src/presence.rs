//! PresenceTracker: keeps `is_online`/`last_seen` consistent with actual
//! connectivity.
//!
//! The only writer of those columns. Store failures are logged and
//! swallowed; the in-memory connection registry stays authoritative for
//! fan-out regardless of store lag.

use sqlx::SqlitePool;
use tracing::warn;

use crate::error::ChatResult;
use crate::mirror::RealtimeMirror;
use crate::models::{UserId, now_rfc3339, validate_user_id};
use crate::store;

#[derive(Clone)]
pub struct PresenceTracker {
    db_pool: SqlitePool,
    mirror: RealtimeMirror,
}

impl PresenceTracker {
    pub fn new(db_pool: SqlitePool, mirror: RealtimeMirror) -> Self {
        PresenceTracker { db_pool, mirror }
    }

    /// First session registered: Offline -> Online, `last_seen` cleared.
    pub async fn on_connect(&self, user_id: UserId) {
        self.apply(user_id, true).await;
    }

    /// Last session closed: Online -> Offline, `last_seen` set to now.
    pub async fn on_disconnect(&self, user_id: UserId) {
        self.apply(user_id, false).await;
    }

    /// Explicit API entry point, independent of the transport lifecycle.
    pub async fn set_presence(&self, user_id: UserId, is_online: bool) -> ChatResult<()> {
        validate_user_id(user_id)?;
        self.apply(user_id, is_online).await;
        Ok(())
    }

    async fn apply(&self, user_id: UserId, is_online: bool) {
        let last_seen = if is_online { None } else { Some(now_rfc3339()) };

        if let Err(err) =
            store::set_user_presence(&self.db_pool, user_id, is_online, last_seen.as_deref()).await
        {
            warn!(user_id, is_online, %err, "durable presence write failed");
        }
        if let Err(err) = self
            .mirror
            .write_presence(user_id, is_online, last_seen.as_deref())
            .await
        {
            warn!(user_id, is_online, %err, "mirror presence write failed");
        }
    }
}
