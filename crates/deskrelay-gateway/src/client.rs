// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent gateway connection.
//!
//! [`GatewayClient::run`] owns the connection for the life of the process:
//! connect, handshake, pump frames, and on any failure retry after a fixed
//! delay. Requests are correlated to responses by frame id; requests that are
//! in flight when the connection drops fail immediately rather than waiting
//! out their timeout.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use deskrelay_core::DeskrelayError;

use crate::protocol::{
    extract_text, ChatEvent, ConnectParams, HistoryEntry, InboundFrame, RequestFrame,
};
use crate::{ChatEventSink, ChatGateway};

const RECONNECT_DELAY: Duration = Duration::from_secs(3);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

type PendingSender = oneshot::Sender<Result<Option<Value>, DeskrelayError>>;

/// Shared handle to the upstream gateway connection.
pub struct GatewayClient {
    url: String,
    token: String,
    client_id: String,
    connected: AtomicBool,
    next_id: AtomicU64,
    pending: DashMap<String, PendingSender>,
    writer: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    request_timeout: Duration,
    reconnect_delay: Duration,
}

impl GatewayClient {
    /// Create a client. No connection is attempted until [`run`] is spawned.
    ///
    /// [`run`]: GatewayClient::run
    pub fn new(url: impl Into<String>, token: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            client_id: client_id.into(),
            connected: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            pending: DashMap::new(),
            writer: Mutex::new(None),
            request_timeout: REQUEST_TIMEOUT,
            reconnect_delay: RECONNECT_DELAY,
        }
    }

    /// Override the per-request timeout. Tests use this to avoid waiting out
    /// the production value.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Override the delay between reconnect attempts.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Drive the connection forever. Reconnects with a fixed delay after any
    /// connect failure or dropped session.
    pub async fn run(self: Arc<Self>, sink: Arc<dyn ChatEventSink>) {
        loop {
            match self.clone().run_session(sink.clone()).await {
                Ok(()) => info!("gateway session closed"),
                Err(e) => warn!(error = %e, "gateway session failed"),
            }
            self.mark_disconnected();
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    async fn run_session(self: Arc<Self>, sink: Arc<dyn ChatEventSink>) -> Result<(), DeskrelayError> {
        debug!(url = %self.url, "connecting to gateway");
        let (ws, _) = connect_async(&self.url).await.map_err(|e| DeskrelayError::Gateway {
            message: format!("connect to {} failed", self.url),
            source: Some(Box::new(e)),
        })?;
        let (mut ws_writer, mut ws_reader) = ws.split();

        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        *self.writer.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);

        let writer_task = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if ws_writer.send(msg).await.is_err() {
                    break;
                }
            }
        });

        // The reader must be pumping before the handshake response can
        // arrive, so handshake and reader run concurrently. A rejected or
        // timed-out handshake ends the session; the transport staying open
        // is no use without an accepted connect.
        let mut handshake = {
            let client = self.clone();
            tokio::spawn(async move {
                let params = ConnectParams::new(&client.client_id, &client.token);
                let payload = client
                    .request("connect", Some(serde_json::to_value(&params).map_err(|e| {
                        DeskrelayError::Internal(format!("connect params: {e}"))
                    })?))
                    .await?;
                client.connected.store(true, Ordering::SeqCst);
                info!("gateway handshake complete");
                debug!(payload = ?payload, "connect payload");
                Ok::<(), DeskrelayError>(())
            })
        };
        let mut handshake_done = false;

        let result = loop {
            tokio::select! {
                outcome = &mut handshake, if !handshake_done => {
                    handshake_done = true;
                    match outcome {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => break Err(e),
                        Err(e) => {
                            break Err(DeskrelayError::Internal(format!("handshake task: {e}")));
                        }
                    }
                }
                maybe = ws_reader.next() => {
                    let Some(msg) = maybe else {
                        break Ok(());
                    };
                    let msg = match msg {
                        Ok(msg) => msg,
                        Err(e) => {
                            break Err(DeskrelayError::Gateway {
                                message: "gateway read failed".to_string(),
                                source: Some(Box::new(e)),
                            });
                        }
                    };
                    match msg {
                        Message::Text(text) => self.handle_frame(text.as_str(), &sink).await,
                        Message::Close(_) => break Ok(()),
                        _ => {}
                    }
                }
            }
        };

        if !handshake_done {
            handshake.abort();
        }
        writer_task.abort();
        result
    }

    async fn handle_frame(&self, text: &str, sink: &Arc<dyn ChatEventSink>) {
        let frame: InboundFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "unparseable gateway frame");
                return;
            }
        };
        match frame {
            InboundFrame::Res(res) => {
                let Some((_, tx)) = self.pending.remove(&res.id) else {
                    // Response to a request we already timed out.
                    debug!(id = %res.id, "response for unknown request");
                    return;
                };
                let outcome = if res.ok {
                    Ok(res.payload)
                } else {
                    Err(DeskrelayError::Gateway {
                        message: res
                            .error
                            .as_ref()
                            .map(describe_error)
                            .unwrap_or_else(|| "request rejected".to_string()),
                        source: None,
                    })
                };
                let _ = tx.send(outcome);
            }
            InboundFrame::Event(event) => {
                if event.event != "chat" {
                    debug!(event = %event.event, "ignoring gateway event");
                    return;
                }
                let Some(payload) = event.payload else { return };
                match serde_json::from_value::<ChatEvent>(payload) {
                    Ok(chat) => sink.on_chat_event(chat).await,
                    Err(e) => warn!(error = %e, "malformed chat event"),
                }
            }
        }
    }

    /// Send one request and wait for its correlated response payload.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Option<Value>, DeskrelayError> {
        let id = format!("req-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let frame = RequestFrame::new(id.clone(), method, params);
        let text = serde_json::to_string(&frame)
            .map_err(|e| DeskrelayError::Internal(format!("encode request: {e}")))?;

        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);

        let sent = {
            let writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
            match writer.as_ref() {
                Some(writer) => writer.send(Message::text(text)).is_ok(),
                None => false,
            }
        };
        if !sent {
            self.pending.remove(&id);
            return Err(DeskrelayError::NotConnected);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            // Sender dropped: the connection died and failed all pendings.
            Ok(Err(_)) => Err(DeskrelayError::NotConnected),
            Err(_) => {
                self.pending.remove(&id);
                Err(DeskrelayError::Timeout {
                    duration: self.request_timeout,
                })
            }
        }
    }

    fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        *self.writer.lock().unwrap_or_else(|e| e.into_inner()) = None;
        let ids: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, tx)) = self.pending.remove(&id) {
                let _ = tx.send(Err(DeskrelayError::NotConnected));
            }
        }
    }
}

fn describe_error(error: &Value) -> String {
    error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

#[async_trait::async_trait]
impl ChatGateway for GatewayClient {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn chat_send(
        &self,
        session_key: &str,
        message: &str,
        idempotency_key: &str,
    ) -> Result<(), DeskrelayError> {
        if !self.is_connected() {
            return Err(DeskrelayError::NotConnected);
        }
        self.request(
            "chat.send",
            Some(serde_json::json!({
                "sessionKey": session_key,
                "message": message,
                "idempotencyKey": idempotency_key,
            })),
        )
        .await?;
        Ok(())
    }

    async fn chat_history(
        &self,
        session_key: &str,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, DeskrelayError> {
        if !self.is_connected() {
            return Err(DeskrelayError::NotConnected);
        }
        let payload = self
            .request(
                "chat.history",
                Some(serde_json::json!({
                    "sessionKey": session_key,
                    "limit": limit,
                })),
            )
            .await?
            .unwrap_or(Value::Null);
        let messages = payload.get("messages").cloned().unwrap_or(Value::Array(vec![]));
        serde_json::from_value(messages).map_err(|e| DeskrelayError::Gateway {
            message: format!("malformed chat.history payload: {e}"),
            source: None,
        })
    }
}

/// Turn a history entry's body into plain text, same rules as live events.
pub fn history_entry_text(entry: &HistoryEntry) -> String {
    entry.content.as_ref().map(extract_text).unwrap_or_default()
}
