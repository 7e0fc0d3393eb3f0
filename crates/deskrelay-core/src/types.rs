// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the deskrelay workspace.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Who authored a message.
///
/// `User` covers both the human operator and another agent relaying into a
/// conversation; the two are disambiguated via [`StoredMessage::metadata`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One committed, immutable row of the per-conversation message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Store-assigned sequence number; strictly increasing within a
    /// conversation and the authoritative resynchronization cursor.
    pub seq: i64,
    /// Roster key of the conversation this message belongs to.
    pub agent: String,
    pub role: Role,
    pub content: String,
    /// Logical commit time, milliseconds since epoch. Display ordering and
    /// staleness only; `seq` governs ordering.
    pub timestamp: i64,
    /// Globally unique dedup token, if the commit carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// Opaque structured annotation (e.g. agent-to-agent relay marker).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Result of a store append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Sequence assigned to the new row, or the existing row's sequence when
    /// the idempotency key had already been seen.
    pub seq: i64,
    /// True when the append was suppressed as a duplicate.
    pub duplicate: bool,
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
