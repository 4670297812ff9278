//! Live celebration feed. Each socket receives the `target_met` events of
//! its own user only.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::auth::jwt::{verify_token, TokenType};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> Response {
    let user_id = match authenticate_ws(&state, query.token.as_deref()) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("WebSocket auth failed: {}", e);
            return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        }
    };

    let rx = state.ws_tx.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, rx, user_id))
}

fn authenticate_ws(state: &AppState, token: Option<&str>) -> Result<Uuid, &'static str> {
    let token = token.ok_or("Missing token query parameter")?;

    let token_data = verify_token(token, &state.config).map_err(|_| "Invalid or expired token")?;

    if token_data.claims.token_type != TokenType::Access {
        return Err("Must use access token for WebSocket");
    }

    Ok(token_data.claims.sub)
}

/// Whether a broadcast payload belongs to `user_id`. Payloads without a
/// `user_id` field go to everyone.
fn addressed_to(msg: &str, user_id: Uuid) -> bool {
    match serde_json::from_str::<serde_json::Value>(msg) {
        Ok(parsed) => match parsed.get("user_id").and_then(|v| v.as_str()) {
            Some(target) => target == user_id.to_string(),
            None => true,
        },
        Err(_) => false,
    }
}

async fn handle_socket(socket: WebSocket, mut rx: broadcast::Receiver<String>, user_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();

    tracing::debug!(user_id = %user_id, "WebSocket connection established");

    let mut send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    if !addressed_to(&msg, user_id) {
                        continue;
                    }
                    if sender.send(Message::Text(msg)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id = %user_id, skipped, "WebSocket receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Inbound frames are only drained; the feed is one-way
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::debug!(user_id = %user_id, "WebSocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addressed_to_matches_user() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let msg = serde_json::json!({ "type": "target_met", "user_id": me }).to_string();
        assert!(addressed_to(&msg, me));
        assert!(!addressed_to(&msg, other));
    }

    #[test]
    fn test_addressed_to_broadcast_and_garbage() {
        let me = Uuid::new_v4();
        assert!(addressed_to(r#"{"type":"ping"}"#, me));
        assert!(!addressed_to("not json", me));
    }
}
