// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Websocket subscriptions to alert rooms.
//!
//! Clients connect to `GET /v1/ws?room={room_id}` and receive every alert
//! frame published to that room:
//! ```json
//! {"sender": "B", "receiver_email": "a@x.com", "room_id": "o1", "alert_id": "...", "type": "CONTROL_MENTION"}
//! ```
//! Browsers cannot set headers on an upgrade, so the bearer token may also
//! travel as `?token=`.

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::server::GatewayState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub room: String,
    #[serde(default)]
    pub token: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Query(params): Query<WsParams>,
) -> Response {
    let by_query = params
        .token
        .as_deref()
        .is_some_and(|token| state.auth.accepts_token(token));
    if !by_query && !state.auth.authorize(&headers, chrono::Utc::now()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let room = params.room.trim().to_string();
    if room.is_empty() {
        return (StatusCode::BAD_REQUEST, "room must not be empty").into_response();
    }
    let frames = state.hub.subscribe(&room);
    ws.on_upgrade(move |socket| handle_socket(socket, room, frames))
}

/// Forward room frames until either side closes.
async fn handle_socket(socket: WebSocket, room: String, mut frames: broadcast::Receiver<String>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    tracing::debug!(%room, "websocket subscribed");

    let forward_room = room.clone();
    let sender_task = tokio::spawn(async move {
        loop {
            match frames.recv().await {
                Ok(text) => {
                    if ws_sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(room = %forward_room, missed, "websocket client lagging, frames dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Client frames carry nothing; read only to notice the close.
    while let Some(Ok(msg)) = ws_receiver.next().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }

    sender_task.abort();
    tracing::debug!(%room, "websocket closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_take_an_optional_token() {
        let params: WsParams = serde_json::from_str(r#"{"room": "o1"}"#).unwrap();
        assert_eq!(params.room, "o1");
        assert!(params.token.is_none());

        let params: WsParams = serde_json::from_str(r#"{"room": "o1", "token": "t"}"#).unwrap();
        assert_eq!(params.token.as_deref(), Some("t"));
    }
}
