mod member;
mod msg;
mod new;
mod presence;
mod room;
mod ws;

use axum::Router;
use axum::routing::{get, post, put};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms", post(new::create_room))
        .route("/rooms/user/{user_id}", get(room::user_rooms))
        .route("/rooms/{room_id}/messages", get(room::room_messages))
        .route("/messages", post(msg::send_message))
        .route("/messages/{message_id}/read", put(msg::mark_read))
        .route(
            "/members",
            post(member::add_member).delete(member::remove_member),
        )
        .route("/presence", put(presence::update_presence))
        .route("/ws", get(ws::chat_ws))
}
