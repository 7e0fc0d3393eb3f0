// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay pipeline between the upstream gateway and downstream clients.
//!
//! The [`StreamAggregator`] turns the gateway's streaming chat events into
//! committed transcript messages, and the [`HistoryPoller`] sweeps upstream
//! history for messages the event stream missed. Both talk to downstream
//! clients through the [`Fanout`] seam so they can be tested without
//! sockets.

pub mod aggregator;
pub mod noise;
pub mod poller;

use async_trait::async_trait;
use deskrelay_core::StoredMessage;

pub use aggregator::StreamAggregator;
pub use poller::HistoryPoller;

/// Downstream broadcast surface.
///
/// `message_committed` is the durable notification; the `stream_*` calls are
/// transient and best-effort.
#[async_trait]
pub trait Fanout: Send + Sync {
    async fn message_committed(&self, agent: &str, message: &StoredMessage);
    async fn stream_delta(&self, agent: &str, text: &str);
    async fn stream_final(&self, agent: &str, text: &str, filtered: bool);
    async fn stream_error(&self, agent: &str, error: &str);
}

/// Outbound push notification capability. Delivery transport lives outside
/// this crate; implementations may drop payloads on dead subscriptions.
#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn notify(&self, agent: &str, preview: &str);
}
