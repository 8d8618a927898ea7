use axum::extract::State;
use axum::{Json, debug_handler};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::envelope::ApiResponse;
use crate::error::{ChatError, ChatResult};
use crate::mirror::RealtimeMirror;
use crate::models::{MemberRole, UserId, validate_user_id};
use crate::store;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateRoomBody {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    pub user_id: UserId,
}

/// Create a room, make the creator its admin member, and provision the
/// mirror room document. A mirror failure is logged and non-fatal: the
/// room exists once the durable writes succeed.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn create_room(
    State(db_pool): State<SqlitePool>,
    State(mirror): State<RealtimeMirror>,
    Json(body): Json<CreateRoomBody>,
) -> ChatResult<ApiResponse> {
    validate_user_id(body.user_id)?;
    if body.name.trim().is_empty() {
        return Err(ChatError::invalid_input("Room name must not be empty"));
    }

    let room = store::create_room(
        &db_pool,
        body.name.trim(),
        body.description.as_deref(),
        body.is_private,
        body.user_id,
    )
    .await?;
    store::create_membership(&db_pool, body.user_id, &room.id, MemberRole::Admin).await?;

    if let Err(err) = mirror.write_room(&room, 1).await {
        warn!(room_id = %room.id, %err, "mirror room write failed");
    }

    info!(room_id = %room.id, created_by = body.user_id, "room created");
    Ok(ApiResponse::ok("Chat room created successfully", &room))
}
