// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-conversation streaming state.
//!
//! Each conversation holds at most one in-flight buffer. Delta events carry
//! a cumulative snapshot of the reply so far, so a delta replaces the buffer
//! rather than appending to it. Finalization commits exactly once; the
//! store's idempotency key is the only deduplication mechanism shared with
//! the other write paths.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, warn};

use deskrelay_config::Roster;
use deskrelay_core::{now_millis, Role, StoredMessage};
use deskrelay_gateway::protocol::extract_text;
use deskrelay_gateway::{ChatEvent, ChatEventSink, ChatState};
use deskrelay_storage::MessageStore;

use crate::noise::is_noise;
use crate::{Fanout, PushNotifier};

pub struct StreamAggregator {
    roster: Roster,
    store: MessageStore,
    fanout: Arc<dyn Fanout>,
    push: Option<Arc<dyn PushNotifier>>,
    buffers: DashMap<String, String>,
}

impl StreamAggregator {
    pub fn new(
        roster: Roster,
        store: MessageStore,
        fanout: Arc<dyn Fanout>,
        push: Option<Arc<dyn PushNotifier>>,
    ) -> Self {
        Self {
            roster,
            store,
            fanout,
            push,
            buffers: DashMap::new(),
        }
    }

    async fn on_delta(&self, agent: &str, message: Option<&Value>) {
        let text = message.map(extract_text).unwrap_or_default();
        if text.is_empty() {
            return;
        }
        self.buffers.insert(agent.to_string(), text.clone());
        self.fanout.stream_delta(agent, &text).await;
    }

    async fn on_final(&self, agent: &str, message: Option<&Value>) {
        // A final event carrying a body is the last cumulative snapshot.
        if let Some(message) = message {
            let text = extract_text(message);
            if !text.is_empty() {
                self.buffers.insert(agent.to_string(), text);
            }
        }
        let text = self
            .buffers
            .remove(agent)
            .map(|(_, text)| text)
            .unwrap_or_default();

        if is_noise(&text) {
            debug!(agent, "final reply filtered as noise");
            self.fanout.stream_final(agent, &text, true).await;
            return;
        }

        let key = assistant_key();
        let timestamp = now_millis();
        match self
            .store
            .append(agent, Role::Assistant, &text, timestamp, Some(&key), None)
            .await
        {
            Ok(outcome) => {
                self.fanout.stream_final(agent, &text, false).await;
                if outcome.duplicate {
                    return;
                }
                let committed = StoredMessage {
                    seq: outcome.seq,
                    agent: agent.to_string(),
                    role: Role::Assistant,
                    content: text.clone(),
                    timestamp,
                    idempotency_key: Some(key),
                    metadata: None,
                };
                self.fanout.message_committed(agent, &committed).await;
                if let Some(push) = &self.push {
                    push.notify(agent, &text).await;
                }
            }
            Err(e) => warn!(agent, error = %e, "failed to commit assistant reply"),
        }
    }

    /// A final event whose message the upstream recorded as incoming, e.g. a
    /// message from another agent. Committed directly as a `user` message;
    /// the streaming buffer is left alone.
    async fn on_user_relay(&self, agent: &str, message: &Value) {
        let text = extract_text(message);
        if is_noise(&text) {
            return;
        }
        let timestamp = message
            .get("timestamp")
            .and_then(Value::as_i64)
            .unwrap_or_else(now_millis);
        let key = relay_key(agent, timestamp);
        let metadata = serde_json::json!({
            "agentRelay": true,
            "source": message.get("from").and_then(Value::as_str).unwrap_or(agent),
        });
        match self
            .store
            .append(agent, Role::User, &text, timestamp, Some(&key), Some(metadata.clone()))
            .await
        {
            Ok(outcome) if !outcome.duplicate => {
                let committed = StoredMessage {
                    seq: outcome.seq,
                    agent: agent.to_string(),
                    role: Role::User,
                    content: text,
                    timestamp,
                    idempotency_key: Some(key),
                    metadata: Some(metadata),
                };
                self.fanout.message_committed(agent, &committed).await;
            }
            Ok(_) => debug!(agent, key = %key, "relayed message already committed"),
            Err(e) => warn!(agent, error = %e, "failed to commit relayed message"),
        }
    }

    async fn on_stream_end(&self, agent: &str, reason: &str) {
        self.buffers.remove(agent);
        self.fanout.stream_error(agent, reason).await;
    }
}

#[async_trait::async_trait]
impl ChatEventSink for StreamAggregator {
    async fn on_chat_event(&self, event: ChatEvent) {
        let Some(agent) = self.roster.agent_for_session(&event.session_key) else {
            debug!(session = %event.session_key, "chat event for unknown session");
            return;
        };
        let agent = agent.to_string();

        match event.state {
            ChatState::Delta => self.on_delta(&agent, event.message.as_ref()).await,
            ChatState::Final => {
                let is_user = event
                    .message
                    .as_ref()
                    .and_then(|m| m.get("role"))
                    .and_then(Value::as_str)
                    == Some("user");
                if is_user {
                    let Some(message) = event.message.as_ref() else { return };
                    self.on_user_relay(&agent, message).await;
                } else {
                    self.on_final(&agent, event.message.as_ref()).await;
                }
            }
            ChatState::Error => {
                let error = event
                    .error
                    .as_ref()
                    .and_then(|e| e.get("message").and_then(Value::as_str))
                    .unwrap_or("stream error");
                self.on_stream_end(&agent, error).await;
            }
            ChatState::Aborted => self.on_stream_end(&agent, "aborted").await,
        }
    }
}

fn assistant_key() -> String {
    format!("gw-{}-{:08x}", now_millis(), rand::random::<u32>())
}

/// Deterministic key shared by every path that relays the same upstream
/// entry, so the store collapses them to one commit.
pub fn relay_key(agent: &str, timestamp: i64) -> String {
    format!("relay-{agent}-{timestamp}")
}
