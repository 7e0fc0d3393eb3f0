// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscriber registry and broadcast fan-out.
//!
//! Each connected client holds one subscription at most; subscribing again
//! replaces it. Delivery is per-client best-effort: a slow or dead client
//! loses its own messages, never anyone else's. Liveness uses mark-sweep: a
//! client that stays unmarked across two consecutive sweeps is evicted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use deskrelay_config::Roster;
use deskrelay_core::{DeskrelayError, StoredMessage};
use deskrelay_relay::Fanout;
use deskrelay_storage::MessageStore;

use crate::protocol::{ClientMessage, ServerMessage};

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const CLIENT_BUFFER: usize = 64;

pub type ClientId = u64;

struct Subscriber {
    tx: mpsc::Sender<ServerMessage>,
    agent: Option<String>,
    alive: bool,
}

pub struct FanoutHub {
    store: MessageStore,
    roster: Roster,
    clients: DashMap<ClientId, Subscriber>,
    next_id: AtomicU64,
}

impl FanoutHub {
    pub fn new(store: MessageStore, roster: Roster) -> Self {
        Self {
            store,
            roster,
            clients: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new client. The returned receiver carries every message
    /// the hub addresses to this client; dropping it (or eviction) ends the
    /// subscription.
    pub fn register(&self) -> (ClientId, mpsc::Receiver<ServerMessage>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(CLIENT_BUFFER);
        self.clients.insert(
            id,
            Subscriber {
                tx,
                agent: None,
                alive: true,
            },
        );
        debug!(client = id, "client registered");
        (id, rx)
    }

    pub fn unregister(&self, id: ClientId) {
        if self.clients.remove(&id).is_some() {
            debug!(client = id, "client unregistered");
        }
    }

    pub fn mark_alive(&self, id: ClientId) {
        if let Some(mut client) = self.clients.get_mut(&id) {
            client.alive = true;
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Evict clients that have not been marked alive since the previous
    /// sweep, then clear the marks for the next round.
    pub fn sweep(&self) -> usize {
        let dead: Vec<ClientId> = self
            .clients
            .iter()
            .filter(|entry| !entry.alive)
            .map(|entry| *entry.key())
            .collect();
        for id in &dead {
            self.clients.remove(id);
            debug!(client = id, "client evicted by heartbeat");
        }
        for mut client in self.clients.iter_mut() {
            client.alive = false;
        }
        dead.len()
    }

    /// Periodic heartbeat sweep for the life of the process.
    pub async fn run_heartbeat(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately and would evict fresh clients.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = self.sweep();
            if evicted > 0 {
                debug!(evicted, "heartbeat sweep");
            }
        }
    }

    /// Process one message from a client.
    pub async fn handle_client_message(
        &self,
        id: ClientId,
        message: ClientMessage,
    ) -> Result<(), DeskrelayError> {
        match message {
            ClientMessage::Subscribe { agent, last_seq } => {
                if !self.roster.contains(&agent) {
                    debug!(client = id, agent, "subscribe to unknown conversation");
                    return Ok(());
                }
                // Switching subscriptions replaces, never adds.
                if let Some(mut client) = self.clients.get_mut(&id) {
                    client.agent = Some(agent.clone());
                } else {
                    return Ok(());
                }
                match last_seq {
                    None => {
                        let messages = self.store.list_all(&agent).await?;
                        self.send_to(id, ServerMessage::History { agent, messages });
                    }
                    Some(cursor) => {
                        let messages = self.store.list_since(&agent, cursor).await?;
                        if !messages.is_empty() {
                            self.send_to(id, ServerMessage::HistoryUpdate { agent, messages });
                        }
                    }
                }
            }
            ClientMessage::Unsubscribe => {
                if let Some(mut client) = self.clients.get_mut(&id) {
                    client.agent = None;
                }
            }
            ClientMessage::Sync { agents } => {
                for (agent, cursor) in agents {
                    if !self.roster.contains(&agent) {
                        continue;
                    }
                    let messages = self.store.list_since(&agent, cursor).await?;
                    if !messages.is_empty() {
                        self.send_to(id, ServerMessage::SyncUpdate { agent, messages });
                    }
                }
            }
        }
        Ok(())
    }

    fn send_to(&self, id: ClientId, message: ServerMessage) {
        let Some(client) = self.clients.get(&id) else {
            return;
        };
        if let Err(e) = client.tx.try_send(message) {
            warn!(client = id, error = %e, "dropping message for client");
        }
    }

    fn broadcast(&self, agent: &str, message: &ServerMessage) {
        for client in self.clients.iter() {
            if client.agent.as_deref() != Some(agent) {
                continue;
            }
            // One slow client must not block or break the rest.
            if let Err(e) = client.tx.try_send(message.clone()) {
                warn!(client = client.key(), error = %e, "dropping broadcast for client");
            }
        }
    }
}

#[async_trait::async_trait]
impl Fanout for FanoutHub {
    async fn message_committed(&self, agent: &str, message: &StoredMessage) {
        self.broadcast(
            agent,
            &ServerMessage::MessageCommitted {
                agent: agent.to_string(),
                message: message.clone(),
            },
        );
    }

    async fn stream_delta(&self, agent: &str, text: &str) {
        self.broadcast(
            agent,
            &ServerMessage::StreamDelta {
                agent: agent.to_string(),
                text: text.to_string(),
            },
        );
    }

    async fn stream_final(&self, agent: &str, text: &str, filtered: bool) {
        self.broadcast(
            agent,
            &ServerMessage::StreamFinal {
                agent: agent.to_string(),
                text: text.to_string(),
                filtered,
            },
        );
    }

    async fn stream_error(&self, agent: &str, error: &str) {
        self.broadcast(
            agent,
            &ServerMessage::StreamError {
                agent: agent.to_string(),
                error: error.to_string(),
            },
        );
    }
}
