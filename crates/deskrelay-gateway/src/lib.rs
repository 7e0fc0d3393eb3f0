// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Upstream gateway WebSocket client.
//!
//! One persistent connection carries correlated request/response RPC and an
//! asynchronous stream of chat events. [`ChatGateway`] is the seam the rest
//! of the backend talks through; [`ChatEventSink`] is where inbound chat
//! events are delivered.

pub mod client;
pub mod protocol;

use async_trait::async_trait;
use deskrelay_core::DeskrelayError;

pub use client::GatewayClient;
pub use protocol::{ChatEvent, ChatState, HistoryEntry};

/// RPC surface of the upstream gateway.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Whether the connection handshake has completed and not since dropped.
    fn is_connected(&self) -> bool;

    /// Forward a user message into the named conversation.
    async fn chat_send(
        &self,
        session_key: &str,
        message: &str,
        idempotency_key: &str,
    ) -> Result<(), DeskrelayError>;

    /// Fetch the most recent `limit` transcript entries for a conversation.
    async fn chat_history(
        &self,
        session_key: &str,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, DeskrelayError>;
}

/// Receiver for chat events pushed by the gateway.
#[async_trait]
pub trait ChatEventSink: Send + Sync {
    async fn on_chat_event(&self, event: ChatEvent);
}
