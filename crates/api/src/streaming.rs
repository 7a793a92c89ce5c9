//! WebSocket live relay.
//!
//! Each connection authenticates with `?token=`, then joins its own user
//! channel. Messages are pushed to every connection joined as one of their
//! recipients. Delivery is at-most-once: a lagging or disconnected client
//! simply misses events.

#![allow(missing_docs)]

use async_trait::async_trait;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use pulse_common::{AppError, AppResult};
use pulse_core::{Claims, LiveRelay, MessageDetail};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::{extractors::Query, middleware::AppState, response::ChatMessageResponse};

/// Streaming query parameters.
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Bearer token of the connecting user.
    pub token: Option<String>,
}

/// A message addressed to a set of users.
#[derive(Debug, Clone)]
pub struct RelayEvent {
    pub recipient_ids: Vec<String>,
    pub message: ChatMessageResponse,
}

impl RelayEvent {
    #[must_use]
    pub fn is_for(&self, user_id: &str) -> bool {
        self.recipient_ids.iter().any(|id| id == user_id)
    }
}

/// Client-to-server frame.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Subscribe to the personal channel of a user id.
    Join(String),
}

/// Server-to-client frame.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum ServerMessage {
    Joined(String),
    NewMessage(ChatMessageResponse),
    Error(String),
}

/// Shared state for streaming.
#[derive(Clone)]
pub struct StreamingState {
    tx: Arc<broadcast::Sender<RelayEvent>>,
}

impl StreamingState {
    /// Create a new streaming state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1000);
        Self { tx: Arc::new(tx) }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.tx.subscribe()
    }
}

impl Default for StreamingState {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LiveRelay for StreamingState {
    async fn publish_new_message(
        &self,
        recipient_ids: &[String],
        message: &MessageDetail,
    ) -> AppResult<()> {
        let event = RelayEvent {
            recipient_ids: recipient_ids.to_vec(),
            message: message.into(),
        };
        // No receivers only means nobody is connected
        if self.tx.send(event).is_err() {
            debug!(message_id = %message.message.id, "No live subscribers");
        }
        Ok(())
    }
}

/// WebSocket handler for streaming.
pub async fn streaming_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<StreamQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let token = query.token.ok_or(AppError::Unauthorized)?;
    let claims = state.tokens.verify(&token)?;

    info!(user_id = %claims.sub, "New streaming connection");

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, claims, state.streaming))
        .into_response())
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, claims: Claims, streaming: StreamingState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = streaming.subscribe();
    let mut joined: Option<String> = None;

    loop {
        let outgoing = tokio::select! {
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(client_msg) => Some(handle_client_message(client_msg, &claims, &mut joined)),
                        Err(e) => {
                            warn!(error = %e, "Failed to parse client message");
                            Some(ServerMessage::Error("Unrecognized frame".to_string()))
                        }
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                    None
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => None,
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    break;
                }
            },

            event = events.recv() => match event {
                Ok(event) => joined
                    .as_deref()
                    .filter(|user_id| event.is_for(user_id))
                    .map(|_| ServerMessage::NewMessage(event.message)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(user_id = %claims.sub, skipped, "Live relay lagged");
                    None
                }
                Err(RecvError::Closed) => break,
            },
        };

        if let Some(frame) = outgoing {
            let json = serde_json::to_string(&frame).unwrap_or_default();
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    }

    info!(user_id = %claims.sub, "Streaming connection closed");
}

/// Handle a client message.
fn handle_client_message(
    msg: ClientMessage,
    claims: &Claims,
    joined: &mut Option<String>,
) -> ServerMessage {
    match msg {
        ClientMessage::Join(user_id) => {
            if user_id != claims.sub {
                warn!(user_id = %claims.sub, requested = %user_id, "Refused foreign join");
                return ServerMessage::Error("Cannot join another user's channel".to_string());
            }
            info!(user_id = %user_id, "Joined personal channel");
            *joined = Some(user_id.clone());
            ServerMessage::Joined(user_id)
        }
    }
}
