use axum::debug_handler;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::AppState;
use crate::error::ChatResult;
use crate::events::{
    ClientEvent, JoinRoomPayload, LeaveRoomPayload, MarkAsReadPayload, RoomUserPayload,
    SendMessagePayload, ServerEvent, TypingPayload,
};
use crate::models::validate_user_id;
use crate::registry::{SessionId, SessionSender};

/// The realtime endpoint. Every connected client speaks
/// `{"event", "data"}` frames over this socket.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn chat_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: AppState, socket: WebSocket) {
    let session_id: SessionId = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let (mut sink, mut stream) = socket.split();

    // Writer task: drain this session's outbound queue into the socket.
    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    debug!(%session_id, "socket connected");

    while let Some(Ok(frame)) = stream.next().await {
        if matches!(frame, WsMessage::Close(_)) {
            break;
        }
        let event = match serde_json::from_slice::<ClientEvent>(&frame.into_data()) {
            Ok(event) => event,
            Err(err) => {
                debug!(%session_id, %err, "unparseable frame");
                let _ = tx.send(ServerEvent::error("Invalid event payload"));
                continue;
            }
        };

        // Recoverable failures go back to the sender as a single `error`
        // event; the connection itself stays up.
        if let Err(err) = dispatch(&state, session_id, &tx, event).await {
            debug!(%session_id, %err, "event rejected");
            let _ = tx.send(ServerEvent::error(err.message()));
        }
    }

    // Disconnect is the only cancellation signal: tear down registry
    // state and, on the user's last session, flip presence offline.
    if let Some(closed) = state.registry.unregister(session_id).await {
        if closed.last_session {
            state.presence.on_disconnect(closed.user_id).await;
            info!(%session_id, user_id = closed.user_id, "last session closed, user offline");
        } else {
            debug!(%session_id, user_id = closed.user_id, "session closed, others remain");
        }
    }
    writer.abort();
}

/// Event dispatch table: one handler per inbound event, each taking the
/// session handle and payload and returning a result.
pub(crate) async fn dispatch(
    state: &AppState,
    session_id: SessionId,
    tx: &SessionSender,
    event: ClientEvent,
) -> ChatResult<()> {
    match event {
        ClientEvent::JoinRoom(payload) => join_room(state, session_id, tx, payload).await,
        ClientEvent::LeaveRoom(payload) => leave_room(state, session_id, payload).await,
        ClientEvent::SendMessage(payload) => send_message(state, payload).await,
        ClientEvent::Typing(payload) => typing(state, session_id, payload).await,
        ClientEvent::MarkAsRead(payload) => mark_as_read(state, payload).await,
    }
}

async fn join_room(
    state: &AppState,
    session_id: SessionId,
    tx: &SessionSender,
    JoinRoomPayload { user_id, room_id }: JoinRoomPayload,
) -> ChatResult<()> {
    validate_user_id(user_id)?;
    state.authorizer.check_membership(user_id, &room_id).await?;

    state
        .registry
        .register(user_id, session_id, tx.clone())
        .await;
    state.registry.subscribe(session_id, &room_id).await;
    state.presence.on_connect(user_id).await;

    state
        .registry
        .broadcast(
            &room_id,
            &ServerEvent::UserJoined(RoomUserPayload {
                user_id,
                room_id: room_id.clone(),
            }),
            Some(session_id),
        )
        .await;

    info!(user_id, %room_id, "user joined room");
    Ok(())
}

async fn leave_room(
    state: &AppState,
    session_id: SessionId,
    LeaveRoomPayload { user_id, room_id }: LeaveRoomPayload,
) -> ChatResult<()> {
    validate_user_id(user_id)?;

    state.registry.unsubscribe(session_id, &room_id).await;
    state.presence.set_presence(user_id, false).await?;

    state
        .registry
        .broadcast(
            &room_id,
            &ServerEvent::UserLeft(RoomUserPayload {
                user_id,
                room_id: room_id.clone(),
            }),
            Some(session_id),
        )
        .await;

    info!(user_id, %room_id, "user left room");
    Ok(())
}

async fn send_message(state: &AppState, payload: SendMessagePayload) -> ChatResult<()> {
    state
        .pipeline
        .send_message(
            payload.user_id,
            &payload.room_id,
            &payload.content,
            payload.message_type,
            payload.metadata,
        )
        .await?;
    Ok(())
}

/// Pure relay, no authorization check; the sender's own session is
/// excluded from the fan-out.
async fn typing(state: &AppState, session_id: SessionId, payload: TypingPayload) -> ChatResult<()> {
    state
        .typing
        .set_typing(&payload.room_id, payload.user_id, payload.is_typing)
        .await;
    let room_id = payload.room_id.clone();
    state
        .registry
        .broadcast(&room_id, &ServerEvent::UserTyping(payload), Some(session_id))
        .await;
    Ok(())
}

async fn mark_as_read(state: &AppState, payload: MarkAsReadPayload) -> ChatResult<()> {
    state
        .pipeline
        .mark_message_as_read(&payload.message_id, payload.user_id)
        .await
}
