// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket endpoint for downstream clients.
//!
//! Each connection registers with the [`FanoutHub`] and runs two halves: a
//! sender task that forwards hub messages and periodic pings, and a receive
//! loop that parses client protocol messages. Pongs and client traffic both
//! count as liveness.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::hub::HEARTBEAT_INTERVAL;
use crate::protocol::ClientMessage;
use crate::server::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (id, mut rx) = state.hub.register();

    // Ends when the hub drops this client's channel (eviction) or a send
    // fails; either way the whole connection comes down with it.
    let mut sender_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            tokio::select! {
                maybe = rx.recv() => {
                    let Some(msg) = maybe else { break };
                    let text = match serde_json::to_string(&msg) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(error = %e, "failed to encode server message");
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if ws_sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut sender_task => break,
            maybe = ws_receiver.next() => {
                let Some(Ok(msg)) = maybe else { break };
                match msg {
                    Message::Text(text) => {
                        state.hub.mark_alive(id);
                        let incoming: ClientMessage = match serde_json::from_str(&text) {
                            Ok(v) => v,
                            Err(e) => {
                                debug!(client = id, error = %e, "invalid client message");
                                continue;
                            }
                        };
                        if let Err(e) = state.hub.handle_client_message(id, incoming).await {
                            warn!(client = id, error = %e, "failed to handle client message");
                        }
                    }
                    Message::Pong(_) => state.hub.mark_alive(id),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    state.hub.unregister(id);
    sender_task.abort();
}
