pub mod authorizer;
pub mod envelope;
pub mod error;
pub mod events;
pub mod mirror;
pub mod models;
pub mod pipeline;
pub mod presence;
pub mod registry;
pub mod rooms;
pub mod store;
pub mod users;

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::authorizer::RoomAuthorizer;
use crate::mirror::RealtimeMirror;
use crate::pipeline::MessagePipeline;
use crate::presence::PresenceTracker;
use crate::registry::{ConnectionRegistry, TypingTracker};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub mirror: RealtimeMirror,
    pub registry: Arc<ConnectionRegistry>,
    pub typing: Arc<TypingTracker>,
    pub authorizer: RoomAuthorizer,
    pub presence: PresenceTracker,
    pub pipeline: MessagePipeline,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, mirror: RealtimeMirror) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let typing = Arc::new(TypingTracker::new());
        let authorizer = RoomAuthorizer::new(db_pool.clone());
        let presence = PresenceTracker::new(db_pool.clone(), mirror.clone());
        let pipeline = MessagePipeline::new(
            db_pool.clone(),
            mirror.clone(),
            Arc::clone(&registry),
            Arc::clone(&typing),
        );
        AppState {
            db_pool,
            mirror,
            registry,
            typing,
            authorizer,
            presence,
            pipeline,
        }
    }
}
