use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router, debug_handler};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::AppState;
use crate::envelope::ApiResponse;
use crate::error::{ChatError, ChatResult};
use crate::models::{UserId, validate_user_id};
use crate::store;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_user))
        .route("/{user_id}", get(get_user))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateUserBody {
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn create_user(
    State(db_pool): State<SqlitePool>,
    Json(body): Json<CreateUserBody>,
) -> ChatResult<ApiResponse> {
    if body.first_name.trim().is_empty() {
        return Err(ChatError::invalid_input("First name must not be empty"));
    }

    let user = store::create_user(
        &db_pool,
        body.first_name.trim(),
        body.last_name.as_deref(),
        body.phone_number.as_deref(),
        body.profile_picture.as_deref(),
    )
    .await?;

    info!(user_id = user.id, "user created");
    Ok(ApiResponse::ok("User created successfully", &user))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn get_user(
    State(db_pool): State<SqlitePool>,
    Path(user_id): Path<UserId>,
) -> ChatResult<ApiResponse> {
    validate_user_id(user_id)?;
    let user = store::find_user(&db_pool, user_id)
        .await?
        .ok_or_else(|| ChatError::invalid_input("User not found"))?;
    Ok(ApiResponse::ok("User fetched successfully", &user))
}
