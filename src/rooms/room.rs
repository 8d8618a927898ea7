use std::collections::HashMap;

use axum::debug_handler;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::authorizer::RoomAuthorizer;
use crate::envelope::ApiResponse;
use crate::error::ChatResult;
use crate::events::MessagePayload;
use crate::models::{ChatRoom, RoomMembership, UserId, UserSummary, validate_user_id};
use crate::store;

const DEFAULT_PAGE_LIMIT: i64 = 50;
const MAX_PAGE_LIMIT: i64 = 100;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserRoomEntry {
    #[serde(flatten)]
    membership: RoomMembership,
    room: ChatRoom,
    creator: Option<UserSummary>,
}

/// All rooms the user holds an active membership in, with room and
/// creator summaries.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn user_rooms(
    State(db_pool): State<SqlitePool>,
    Path(user_id): Path<UserId>,
) -> ChatResult<ApiResponse> {
    validate_user_id(user_id)?;

    let memberships = store::list_user_memberships(&db_pool, user_id).await?;
    let mut entries = Vec::with_capacity(memberships.len());
    for membership in memberships {
        let Some(room) = store::find_room(&db_pool, &membership.room_id).await? else {
            continue;
        };
        let creator = store::find_user_summary(&db_pool, room.created_by).await?;
        entries.push(UserRoomEntry {
            membership,
            room,
            creator,
        });
    }

    Ok(ApiResponse::ok(
        "User chat rooms retrieved successfully",
        &entries,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RoomMessagesQuery {
    pub user_id: UserId,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// One member-gated page of a room's messages with sender summaries,
/// oldest first within the page.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn room_messages(
    State(db_pool): State<SqlitePool>,
    State(authorizer): State<RoomAuthorizer>,
    Path(room_id): Path<String>,
    Query(query): Query<RoomMessagesQuery>,
) -> ChatResult<ApiResponse> {
    validate_user_id(query.user_id)?;
    authorizer.check_membership(query.user_id, &room_id).await?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .clamp(1, MAX_PAGE_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);

    let mut messages = store::list_room_messages(&db_pool, &room_id, limit, offset).await?;
    messages.reverse();

    let mut senders: HashMap<UserId, Option<UserSummary>> = HashMap::new();
    let mut page = Vec::with_capacity(messages.len());
    for message in messages {
        let sender = match senders.get(&message.sender_id) {
            Some(cached) => cached.clone(),
            None => {
                let summary = store::find_user_summary(&db_pool, message.sender_id).await?;
                senders.insert(message.sender_id, summary.clone());
                summary
            }
        };
        page.push(MessagePayload { message, sender });
    }

    Ok(ApiResponse::ok("Messages retrieved successfully", &page))
}
