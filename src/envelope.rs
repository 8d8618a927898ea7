//! Uniform response envelope for the REST surface.
//!
//! Every endpoint answers `{responseCode, message, success, data?}` where
//! `responseCode = 0` denotes success.

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub response_code: u32,
    pub message: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ApiResponse {
    /// Success envelope with a data payload.
    pub fn ok<T: Serialize>(message: &str, data: T) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(value) => Some(value),
            Err(err) => {
                error!(%err, "failed to serialize response data");
                None
            }
        };
        ApiResponse {
            response_code: 0,
            message: message.to_owned(),
            success: true,
            data,
        }
    }

    /// Success envelope without a data payload.
    pub fn ok_empty(message: &str) -> Self {
        ApiResponse {
            response_code: 0,
            message: message.to_owned(),
            success: true,
            data: None,
        }
    }

    /// Failure envelope; `code` comes from the error taxonomy.
    pub fn failure(code: u32, message: &str) -> Self {
        ApiResponse {
            response_code: code,
            message: message.to_owned(),
            success: false,
            data: None,
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
