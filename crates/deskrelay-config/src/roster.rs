// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolved agent roster with forward and reverse session-key lookup.

use std::collections::BTreeMap;

use crate::model::AgentEntry;

/// One fully-resolved roster entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// Upstream session identifier used when talking to the gateway.
    pub session_key: String,
    /// Display label for the conversation.
    pub label: String,
}

/// The fixed conversation roster, resolved from configuration at startup.
///
/// Gateway chat events arrive keyed by session key, so the roster keeps a
/// reverse index alongside the forward map.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: BTreeMap<String, RosterEntry>,
    by_session: BTreeMap<String, String>,
}

impl Roster {
    /// Resolve configured entries, filling in the default session key
    /// (`agent:<key>:webchat:user`) and label (`#<key>`) where omitted.
    pub fn from_config(agents: &BTreeMap<String, AgentEntry>) -> Self {
        let mut entries = BTreeMap::new();
        let mut by_session = BTreeMap::new();
        for (key, entry) in agents {
            let session_key = entry
                .session_key
                .clone()
                .unwrap_or_else(|| format!("agent:{key}:webchat:user"));
            let label = entry.label.clone().unwrap_or_else(|| format!("#{key}"));
            by_session.insert(session_key.clone(), key.clone());
            entries.insert(key.clone(), RosterEntry { session_key, label });
        }
        Self { entries, by_session }
    }

    pub fn contains(&self, agent: &str) -> bool {
        self.entries.contains_key(agent)
    }

    pub fn session_key(&self, agent: &str) -> Option<&str> {
        self.entries.get(agent).map(|e| e.session_key.as_str())
    }

    /// Reverse lookup: which conversation does a gateway session belong to?
    pub fn agent_for_session(&self, session_key: &str) -> Option<&str> {
        self.by_session.get(session_key).map(String::as_str)
    }

    pub fn agents(&self) -> impl Iterator<Item = (&str, &RosterEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
