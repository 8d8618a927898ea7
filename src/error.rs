//! Error handling for the chat server

use std::fmt;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::envelope::ApiResponse;

/// Result type alias for chat operations
pub type ChatResult<T> = std::result::Result<T, ChatError>;

/// Chat server error taxonomy
#[derive(Debug, Clone)]
pub enum ChatError {
    /// Actor holds no active membership in the target room
    NotAMember(String),
    /// Actor's role does not permit the action
    Forbidden(String),
    /// Room does not exist
    RoomNotFound(String),
    /// Message does not exist
    MessageNotFound(String),
    /// Room exists but was never fully provisioned (no mirror key)
    InvalidRoomState(String),
    /// Target user already holds an active membership
    AlreadyMember(String),
    /// Malformed identity or payload
    InvalidInput(String),
    /// Transient backing-store failure
    StoreUnavailable(String),
    /// Server internal error
    Internal(String),
}

impl ChatError {
    /// Envelope response code for this error kind; 0 is reserved for success.
    pub fn response_code(&self) -> u32 {
        match self {
            ChatError::NotAMember(_) | ChatError::Forbidden(_) | ChatError::AlreadyMember(_) => 102,
            _ => 1,
        }
    }

    /// Get human-readable error message
    pub fn message(&self) -> &str {
        match self {
            ChatError::NotAMember(msg) => msg,
            ChatError::Forbidden(msg) => msg,
            ChatError::RoomNotFound(msg) => msg,
            ChatError::MessageNotFound(msg) => msg,
            ChatError::InvalidRoomState(msg) => msg,
            ChatError::AlreadyMember(msg) => msg,
            ChatError::InvalidInput(msg) => msg,
            ChatError::StoreUnavailable(msg) => msg,
            ChatError::Internal(msg) => msg,
        }
    }

    /// Create a not-a-member error
    pub fn not_a_member<T: Into<String>>(msg: T) -> Self {
        ChatError::NotAMember(msg.into())
    }

    /// Create a forbidden error
    pub fn forbidden<T: Into<String>>(msg: T) -> Self {
        ChatError::Forbidden(msg.into())
    }

    /// Create a room-not-found error
    pub fn room_not_found<T: Into<String>>(msg: T) -> Self {
        ChatError::RoomNotFound(msg.into())
    }

    /// Create a message-not-found error
    pub fn message_not_found<T: Into<String>>(msg: T) -> Self {
        ChatError::MessageNotFound(msg.into())
    }

    /// Create an invalid-room-state error
    pub fn invalid_room_state<T: Into<String>>(msg: T) -> Self {
        ChatError::InvalidRoomState(msg.into())
    }

    /// Create an already-a-member error
    pub fn already_member<T: Into<String>>(msg: T) -> Self {
        ChatError::AlreadyMember(msg.into())
    }

    /// Create an invalid-input error
    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        ChatError::InvalidInput(msg.into())
    }

    /// Create a store-unavailable error
    pub fn store_unavailable<T: Into<String>>(msg: T) -> Self {
        ChatError::StoreUnavailable(msg.into())
    }

    /// Create an internal error
    pub fn internal<T: Into<String>>(msg: T) -> Self {
        ChatError::Internal(msg.into())
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::NotAMember(msg) => write!(f, "Not a member: {}", msg),
            ChatError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ChatError::RoomNotFound(msg) => write!(f, "Room not found: {}", msg),
            ChatError::MessageNotFound(msg) => write!(f, "Message not found: {}", msg),
            ChatError::InvalidRoomState(msg) => write!(f, "Invalid room state: {}", msg),
            ChatError::AlreadyMember(msg) => write!(f, "Already a member: {}", msg),
            ChatError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            ChatError::StoreUnavailable(msg) => write!(f, "Store unavailable: {}", msg),
            ChatError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ChatError {}

impl From<sqlx::Error> for ChatError {
    fn from(err: sqlx::Error) -> Self {
        ChatError::StoreUnavailable(format!("durable store error: {}", err))
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::StoreUnavailable(format!("realtime mirror error: {}", err))
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::InvalidInput(format!("JSON error: {}", err))
    }
}

impl From<axum::Error> for ChatError {
    fn from(err: axum::Error) -> Self {
        ChatError::Internal(format!("transport error: {}", err))
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = match self {
            ChatError::StoreUnavailable(_) | ChatError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::OK,
        };
        let body = ApiResponse::failure(self.response_code(), self.message());
        (status, Json(body)).into_response()
    }
}
