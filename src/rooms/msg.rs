use axum::extract::{Path, State};
use axum::{Json, debug_handler};
use serde::Deserialize;

use crate::envelope::ApiResponse;
use crate::error::ChatResult;
use crate::models::{MessageType, UserId};
use crate::pipeline::MessagePipeline;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendMessageBody {
    pub user_id: UserId,
    pub room_id: String,
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// REST send path. Runs through the same pipeline as the transport
/// events, so live subscribers of the room still receive `newMessage`.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn send_message(
    State(pipeline): State<MessagePipeline>,
    Json(body): Json<SendMessageBody>,
) -> ChatResult<ApiResponse> {
    let payload = pipeline
        .send_message(
            body.user_id,
            &body.room_id,
            &body.content,
            body.message_type,
            body.metadata,
        )
        .await?;
    Ok(ApiResponse::ok("Message sent successfully", &payload.message))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MarkReadBody {
    pub user_id: UserId,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn mark_read(
    State(pipeline): State<MessagePipeline>,
    Path(message_id): Path<String>,
    Json(body): Json<MarkReadBody>,
) -> ChatResult<ApiResponse> {
    pipeline
        .mark_message_as_read(&message_id, body.user_id)
        .await?;
    Ok(ApiResponse::ok_empty("Message marked as read"))
}
