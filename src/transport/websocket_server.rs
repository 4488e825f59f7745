use std::sync::Arc;

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
use tracing::{debug, info, warn};

use crate::{
    common::{
        ApiError,
        types::{UserId, now_ms},
    },
    protocol::{IncomingFrame, IncomingMessage, OutgoingMessage, Profile},
    server::{AppState, PartyRoom},
};

/// GET /v1/parties/{code}/ws
///
/// Joins the party before upgrading, so a refused join is a plain HTTP error and no
/// socket is ever opened for it.
pub async fn websocket_handler(
    Path(code): Path<String>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let path = format!("/v1/parties/{}/ws", code);

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    let Some(user_id) = header("user-id").map(UserId::from) else {
        return Err(ApiError::bad_request("Missing or invalid User-Id header", &path));
    };
    let profile = Profile {
        display_name: header("display-name").unwrap_or(&user_id).to_string(),
        avatar: header("avatar").map(str::to_string),
    };

    let room = state
        .directory
        .get(&code)
        .map_err(|e| ApiError::from_party(&e, &path))?;

    let (tx, rx) = flume::unbounded();
    let resumed = room
        .attach(&user_id, profile, tx.clone(), now_ms())
        .map_err(|e| {
            info!("Join of {} to {} refused: {}", user_id, code, e);
            ApiError::from_party(&e, &path)
        })?;
    info!(
        "WebSocket joining: party={} user={} resumed={}",
        room.code(),
        user_id,
        resumed
    );

    let failed_room = room.clone();
    let failed_user = user_id.clone();
    let failed_tx = tx.clone();
    let mut response = ws
        .on_failed_upgrade(move |e| {
            warn!("WebSocket upgrade failed for {}: {}", failed_user, e);
            failed_room.detach(&failed_user, &failed_tx, now_ms());
        })
        .on_upgrade(move |socket| handle_socket(socket, state, room, user_id, tx, rx))
        .into_response();

    response.headers_mut().insert(
        "Session-Resumed",
        HeaderValue::from_static(if resumed { "true" } else { "false" }),
    );
    Ok(response)
}

pub async fn handle_socket(
    mut socket: WebSocket,
    state: Arc<AppState>,
    room: Arc<PartyRoom>,
    user_id: UserId,
    tx: flume::Sender<Message>,
    rx: flume::Receiver<Message>,
) {
    let code = room.code().clone();
    info!("WebSocket connected: party={} user={}", code, user_id);

    loop {
        tokio::select! {
            Ok(msg) = rx.recv_async() => {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = socket.send(msg).await {
                    warn!("Socket send error: party={} user={} err={}", code, user_id, e);
                    break;
                }
                if closing {
                    break;
                }
            }
            msg = socket.recv() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        warn!("WebSocket error: party={} user={} err={}", code, user_id, e);
                        break;
                    }
                    None => break,
                };

                match msg {
                    Message::Text(text) => handle_text(&state, &room, &user_id, &tx, text.as_str()),
                    // Protocol-level pings are a heartbeat too.
                    Message::Ping(_) | Message::Pong(_) => {
                        let frame = IncomingFrame {
                            nonce: None,
                            op: IncomingMessage::Heartbeat,
                        };
                        room.dispatch(&user_id, frame, &tx, now_ms());
                    }
                    Message::Close(_) => break,
                    Message::Binary(_) => {
                        debug!("Ignoring binary frame from {} in {}", user_id, code);
                    }
                }
            }
        }
    }

    room.detach(&user_id, &tx, now_ms());
    state.directory.release(&room);
    info!("WebSocket closed: party={} user={}", code, user_id);
}

fn handle_text(
    state: &AppState,
    room: &PartyRoom,
    user_id: &UserId,
    tx: &flume::Sender<Message>,
    text: &str,
) {
    match serde_json::from_str::<IncomingFrame>(text) {
        Ok(frame) => {
            room.dispatch(user_id, frame, tx, now_ms());
            state.directory.release(room);
        }
        Err(e) => {
            debug!("Malformed frame from {}: {}", user_id, e);
            let refusal = OutgoingMessage::Error {
                request: "frame",
                nonce: None,
                code: "badRequest",
                message: e.to_string(),
            };
            if let Ok(json) = serde_json::to_string(&refusal) {
                let _ = tx.send(Message::Text(json.into()));
            }
        }
    }
}
