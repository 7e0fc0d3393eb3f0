// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fallback history poller.
//!
//! The event stream can miss messages (agent-to-agent traffic is recorded
//! upstream but not always delivered as an event), so upstream history is
//! re-read on a fixed interval. Idempotency keys are derived from
//! conversation and timestamp, so an entry the event path already committed
//! collapses to a duplicate here and is not re-broadcast.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, warn};

use deskrelay_config::Roster;
use deskrelay_core::{now_millis, Role, StoredMessage};
use deskrelay_gateway::protocol::extract_text;
use deskrelay_gateway::ChatGateway;
use deskrelay_storage::MessageStore;

use crate::aggregator::relay_key;
use crate::noise::is_noise;
use crate::Fanout;

pub struct HistoryPoller {
    gateway: Arc<dyn ChatGateway>,
    store: MessageStore,
    roster: Roster,
    fanout: Arc<dyn Fanout>,
    interval: Duration,
    history_limit: usize,
    /// Highest upstream timestamp already processed, per conversation.
    /// Seeded with the poller's start time so restarts do not replay
    /// history that predates this process.
    watermarks: DashMap<String, i64>,
}

impl HistoryPoller {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        store: MessageStore,
        roster: Roster,
        fanout: Arc<dyn Fanout>,
        interval: Duration,
        history_limit: usize,
    ) -> Self {
        let watermarks = DashMap::new();
        let start = now_millis();
        for (agent, _) in roster.agents() {
            watermarks.insert(agent.to_string(), start);
        }
        Self {
            gateway,
            store,
            roster,
            fanout,
            interval,
            history_limit,
            watermarks,
        }
    }

    /// Poll on the configured interval for the life of the process. Skips
    /// cycles while the gateway is disconnected.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if !self.gateway.is_connected() {
                continue;
            }
            self.poll_once().await;
        }
    }

    /// One sweep over every conversation in the roster.
    pub async fn poll_once(&self) {
        for (agent, entry) in self.roster.agents() {
            if let Err(e) = self.poll_agent(agent, &entry.session_key).await {
                debug!(agent, error = %e, "history poll failed");
            }
        }
    }

    async fn poll_agent(
        &self,
        agent: &str,
        session_key: &str,
    ) -> Result<(), deskrelay_core::DeskrelayError> {
        let entries = self.gateway.chat_history(session_key, self.history_limit).await?;
        let watermark = self.watermarks.get(agent).map(|w| *w).unwrap_or(0);
        let mut max_seen = watermark;

        for entry in &entries {
            let Some(timestamp) = entry.timestamp else { continue };
            if timestamp > max_seen {
                max_seen = timestamp;
            }
            if timestamp <= watermark || entry.role != "user" {
                continue;
            }
            let text = entry.content.as_ref().map(extract_text).unwrap_or_default();
            if is_noise(&text) {
                continue;
            }
            let key = relay_key(agent, timestamp);
            let metadata = serde_json::json!({"agentRelay": true, "source": "history"});
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
                Ok(_) => {}
                Err(e) => warn!(agent, error = %e, "failed to commit polled message"),
            }
        }

        // The watermark advances past everything seen, committed or not, so
        // the same entries are not reconsidered next cycle.
        self.watermarks.insert(agent.to_string(), max_seen);
        Ok(())
    }

    #[cfg(test)]
    fn set_watermark(&self, agent: &str, watermark: i64) {
        self.watermarks.insert(agent.to_string(), watermark);
    }
}
