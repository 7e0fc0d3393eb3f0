// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end client behavior against an in-process mock gateway.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;

use deskrelay_gateway::{ChatEvent, ChatEventSink, ChatGateway, ChatState, GatewayClient};

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<ChatEvent>>,
}

#[async_trait]
impl ChatEventSink for RecordingSink {
    async fn on_chat_event(&self, event: ChatEvent) {
        self.events.lock().await.push(event);
    }
}

/// Mock gateway: acknowledge `connect`, push one chat event, then answer
/// `chat.send` and `chat.history`.
async fn run_mock_gateway(listener: TcpListener) {
    let (stream, _) = listener.accept().await.unwrap();
    let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    let (mut writer, mut reader) = ws.split();

    while let Some(Ok(msg)) = reader.next().await {
        let Message::Text(text) = msg else { continue };
        let frame: Value = serde_json::from_str(text.as_str()).unwrap();
        let id = frame["id"].as_str().unwrap().to_string();
        match frame["method"].as_str().unwrap() {
            "connect" => {
                assert_eq!(frame["params"]["minProtocol"], 3);
                assert_eq!(frame["params"]["auth"]["token"], "test-token");
                let res = json!({"type": "res", "id": id, "ok": true, "payload": {"protocol": 3}});
                writer.send(Message::text(res.to_string())).await.unwrap();

                let event = json!({
                    "type": "event",
                    "event": "chat",
                    "payload": {
                        "sessionKey": "agent:isla:webchat:user",
                        "state": "delta",
                        "message": "partial"
                    }
                });
                writer.send(Message::text(event.to_string())).await.unwrap();
            }
            "chat.send" => {
                assert_eq!(frame["params"]["sessionKey"], "agent:isla:webchat:user");
                assert!(frame["params"]["idempotencyKey"].as_str().is_some());
                let res = json!({"type": "res", "id": id, "ok": true});
                writer.send(Message::text(res.to_string())).await.unwrap();
            }
            "chat.history" => {
                let res = json!({
                    "type": "res",
                    "id": id,
                    "ok": true,
                    "payload": {"messages": [
                        {"role": "assistant", "content": "done", "timestamp": 1000}
                    ]}
                });
                writer.send(Message::text(res.to_string())).await.unwrap();
            }
            other => panic!("unexpected method {other}"),
        }
    }
}

async fn wait_for_connected(client: &GatewayClient) {
    for _ in 0..100 {
        if client.is_connected() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("client never completed handshake");
}

#[tokio::test]
async fn handshake_events_and_rpc() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(run_mock_gateway(listener));

    let client = Arc::new(
        GatewayClient::new(format!("ws://{addr}"), "test-token", "deskrelay")
            .with_request_timeout(Duration::from_secs(5)),
    );
    let sink = Arc::new(RecordingSink::default());
    let runner = tokio::spawn(client.clone().run(sink.clone()));

    wait_for_connected(&client).await;

    client
        .chat_send("agent:isla:webchat:user", "hello", "relay-isla-1000")
        .await
        .unwrap();

    let history = client.chat_history("agent:isla:webchat:user", 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, "assistant");

    // The event pushed right after the handshake reached the sink.
    for _ in 0..100 {
        if !sink.events.lock().await.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let events = sink.events.lock().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].session_key, "agent:isla:webchat:user");
    assert_eq!(events[0].state, ChatState::Delta);

    runner.abort();
}

/// Mock gateway that rejects the first handshake but holds the transport
/// open, then accepts the second connection normally.
async fn run_rejecting_gateway(listener: TcpListener) {
    let (stream, _) = listener.accept().await.unwrap();
    let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    let (mut writer, mut reader) = ws.split();
    if let Some(Ok(Message::Text(text))) = reader.next().await {
        let frame: Value = serde_json::from_str(text.as_str()).unwrap();
        let res = json!({
            "type": "res",
            "id": frame["id"],
            "ok": false,
            "error": {"message": "invalid token"}
        });
        writer.send(Message::text(res.to_string())).await.unwrap();
    }
    // Keep the rejected socket open; the client must hang up, not us.
    let hold = tokio::spawn(async move { while reader.next().await.is_some() {} });

    let (stream, _) = listener.accept().await.unwrap();
    let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    let (mut writer, mut reader) = ws.split();
    while let Some(Ok(msg)) = reader.next().await {
        let Message::Text(text) = msg else { continue };
        let frame: Value = serde_json::from_str(text.as_str()).unwrap();
        if frame["method"] == "connect" {
            let res = json!({"type": "res", "id": frame["id"], "ok": true, "payload": {"protocol": 3}});
            writer.send(Message::text(res.to_string())).await.unwrap();
        }
    }
    hold.abort();
}

#[tokio::test]
async fn rejected_handshake_ends_session_and_reconnects() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(run_rejecting_gateway(listener));

    let client = Arc::new(
        GatewayClient::new(format!("ws://{addr}"), "test-token", "deskrelay")
            .with_request_timeout(Duration::from_secs(5))
            .with_reconnect_delay(Duration::from_millis(50)),
    );
    let sink = Arc::new(RecordingSink::default());
    let runner = tokio::spawn(client.clone().run(sink));

    // The first session's handshake is refused; the client must drop that
    // session and succeed on the retry.
    wait_for_connected(&client).await;

    runner.abort();
}

#[tokio::test]
async fn send_fails_before_any_connection() {
    let client = GatewayClient::new("ws://127.0.0.1:1", "test-token", "deskrelay");
    let err = client
        .chat_send("agent:isla:webchat:user", "hello", "relay-isla-1000")
        .await
        .unwrap_err();
    assert!(matches!(err, deskrelay_core::DeskrelayError::NotConnected));
}
