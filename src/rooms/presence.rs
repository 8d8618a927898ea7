use axum::extract::State;
use axum::{Json, debug_handler};
use serde::Deserialize;

use crate::envelope::ApiResponse;
use crate::error::ChatResult;
use crate::models::UserId;
use crate::presence::PresenceTracker;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdatePresenceBody {
    pub user_id: UserId,
    pub is_online: bool,
}

/// Explicit presence entry point, independent of the transport
/// lifecycle.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn update_presence(
    State(presence): State<PresenceTracker>,
    Json(body): Json<UpdatePresenceBody>,
) -> ChatResult<ApiResponse> {
    presence.set_presence(body.user_id, body.is_online).await?;
    Ok(ApiResponse::ok_empty("Presence updated successfully"))
}
