// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Downstream client protocol.
//!
//! Client -> Server (JSON):
//! ```json
//! {"type": "subscribe", "agent": "isla", "lastSeq": 42}
//! {"type": "unsubscribe"}
//! {"type": "sync", "agents": {"isla": 42, "marcus": 7}}
//! ```
//!
//! Server -> Client (JSON):
//! ```json
//! {"type": "history", "agent": "isla", "messages": [...]}
//! {"type": "message_committed", "agent": "isla", "message": {...}}
//! {"type": "stream_delta", "agent": "isla", "text": "partial..."}
//! ```

use std::collections::BTreeMap;

use deskrelay_core::StoredMessage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        agent: String,
        #[serde(rename = "lastSeq", default)]
        last_seq: Option<i64>,
    },
    Unsubscribe,
    Sync {
        agents: BTreeMap<String, i64>,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    History {
        agent: String,
        messages: Vec<StoredMessage>,
    },
    HistoryUpdate {
        agent: String,
        messages: Vec<StoredMessage>,
    },
    SyncUpdate {
        agent: String,
        messages: Vec<StoredMessage>,
    },
    MessageCommitted {
        agent: String,
        message: StoredMessage,
    },
    StreamDelta {
        agent: String,
        text: String,
    },
    StreamFinal {
        agent: String,
        text: String,
        filtered: bool,
    },
    StreamError {
        agent: String,
        error: String,
    },
}
