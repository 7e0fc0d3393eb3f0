// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway wire protocol.
//!
//! Client -> Gateway (JSON):
//! ```json
//! {"type": "req", "id": "req-1", "method": "chat.send", "params": {...}}
//! ```
//!
//! Gateway -> Client (JSON):
//! ```json
//! {"type": "res", "id": "req-1", "ok": true, "payload": {...}}
//! {"type": "event", "event": "chat", "payload": {"sessionKey": "...", "state": "delta", ...}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 3;

/// Outbound request frame.
#[derive(Debug, Clone, Serialize)]
pub struct RequestFrame {
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    pub id: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RequestFrame {
    pub fn new(id: String, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            frame_type: "req",
            id,
            method: method.into(),
            params,
        }
    }
}

/// Inbound frame, discriminated on `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundFrame {
    Res(ResponseFrame),
    Event(EventFrame),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseFrame {
    pub id: String,
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventFrame {
    pub event: String,
    #[serde(default)]
    pub payload: Option<Value>,
}

/// Handshake parameters for the `connect` RPC.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub min_protocol: u32,
    pub max_protocol: u32,
    pub client: ConnectClient,
    pub role: String,
    pub scopes: Vec<String>,
    pub auth: ConnectAuth,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectClient {
    pub id: String,
    pub version: String,
    pub platform: String,
    pub mode: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectAuth {
    pub token: String,
}

impl ConnectParams {
    pub fn new(client_id: &str, token: &str) -> Self {
        Self {
            min_protocol: PROTOCOL_VERSION,
            max_protocol: PROTOCOL_VERSION,
            client: ConnectClient {
                id: client_id.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                platform: std::env::consts::OS.to_string(),
                mode: "backend".to_string(),
            },
            role: "operator".to_string(),
            scopes: vec!["operator.read".to_string(), "operator.write".to_string()],
            auth: ConnectAuth {
                token: token.to_string(),
            },
        }
    }
}

/// Lifecycle states of a streamed chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatState {
    Delta,
    Final,
    Error,
    Aborted,
}

/// A `chat` event payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEvent {
    pub session_key: String,
    pub state: ChatState,
    #[serde(default)]
    pub message: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// One entry from a `chat.history` response.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Extract plain text from a message body.
///
/// The gateway sends either a bare string or a list of content blocks, of
/// which only `{"type": "text"}` blocks carry text. Non-text blocks are
/// skipped; adjacent text blocks are joined with newlines.
pub fn extract_text(message: &Value) -> String {
    match message {
        Value::String(s) => s.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(obj) => {
            if let Some(content) = obj.get("content") {
                extract_text(content)
            } else if let Some(Value::String(s)) = obj.get("text") {
                s.clone()
            } else {
                String::new()
            }
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_frame_serializes_without_null_params() {
        let frame = RequestFrame::new("req-1".into(), "chat.history", None);
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "req");
        assert_eq!(json["id"], "req-1");
        assert!(json.get("params").is_none());
    }

    #[test]
    fn inbound_frame_discriminates_on_type() {
        let res: InboundFrame = serde_json::from_str(
            r#"{"type": "res", "id": "req-2", "ok": true, "payload": {"messages": []}}"#,
        )
        .unwrap();
        assert!(matches!(res, InboundFrame::Res(r) if r.id == "req-2" && r.ok));

        let event: InboundFrame = serde_json::from_str(
            r#"{"type": "event", "event": "chat", "payload": {"sessionKey": "agent:isla:webchat:user", "state": "delta", "message": "Hi"}}"#,
        )
        .unwrap();
        assert!(matches!(event, InboundFrame::Event(e) if e.event == "chat"));
    }

    #[test]
    fn connect_params_shape() {
        let params = ConnectParams::new("deskrelay", "secret");
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["minProtocol"], 3);
        assert_eq!(json["maxProtocol"], 3);
        assert_eq!(json["role"], "operator");
        assert_eq!(json["scopes"], json!(["operator.read", "operator.write"]));
        assert_eq!(json["auth"]["token"], "secret");
        assert_eq!(json["client"]["id"], "deskrelay");
    }

    #[test]
    fn chat_event_parses_all_states() {
        for (raw, state) in [
            ("delta", ChatState::Delta),
            ("final", ChatState::Final),
            ("error", ChatState::Error),
            ("aborted", ChatState::Aborted),
        ] {
            let event: ChatEvent = serde_json::from_value(json!({
                "sessionKey": "agent:isla:webchat:user",
                "state": raw,
            }))
            .unwrap();
            assert_eq!(event.state, state);
        }
    }

    #[test]
    fn extract_text_from_string() {
        assert_eq!(extract_text(&json!("plain")), "plain");
    }

    #[test]
    fn extract_text_joins_text_blocks() {
        let blocks = json!([
            {"type": "text", "text": "first"},
            {"type": "image", "source": "..."},
            {"type": "text", "text": "second"},
        ]);
        assert_eq!(extract_text(&blocks), "first\nsecond");
    }

    #[test]
    fn extract_text_unwraps_content_object() {
        let msg = json!({"content": [{"type": "text", "text": "nested"}]});
        assert_eq!(extract_text(&msg), "nested");
    }

    #[test]
    fn extract_text_of_unknown_shape_is_empty() {
        assert_eq!(extract_text(&json!(42)), "");
        assert_eq!(extract_text(&json!({"blob": true})), "");
    }
}
