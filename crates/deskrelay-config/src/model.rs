// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the deskrelay backend.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup rather than silently ignoring typos.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level deskrelay configuration.
///
/// Loaded from `deskrelay.toml` with `DESKRELAY_*` environment overrides.
/// Every section except the roster defaults to sensible values; an empty
/// roster is rejected by validation at startup.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeskrelayConfig {
    /// HTTP/WebSocket server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream agent gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Fallback history poller settings.
    #[serde(default)]
    pub poller: PollerConfig,

    /// The agent roster: conversation key -> upstream session binding.
    /// Fixed at startup; conversations are never created at runtime.
    #[serde(default)]
    pub agents: BTreeMap<String, AgentEntry>,
}

/// HTTP/WebSocket server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Upstream agent gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// WebSocket URL of the upstream gateway.
    #[serde(default = "default_gateway_url")]
    pub url: String,

    /// Auth token passed through in the connect handshake. Not validated
    /// locally.
    #[serde(default)]
    pub token: String,

    /// Client identity reported in the connect handshake.
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            token: String::new(),
            client_id: default_client_id(),
        }
    }
}

fn default_gateway_url() -> String {
    "ws://127.0.0.1:18789".to_string()
}

fn default_client_id() -> String {
    "deskrelay".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("deskrelay").join("chat.db"))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| "chat.db".to_string())
}

/// Fallback history poller configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PollerConfig {
    /// Seconds between history polls.
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,

    /// Number of trailing upstream history entries fetched per poll.
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            history_limit: default_history_limit(),
        }
    }
}

fn default_poll_interval() -> u64 {
    3
}

fn default_history_limit() -> u32 {
    10
}

/// One roster entry binding a conversation key to the upstream gateway.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentEntry {
    /// Upstream session identifier. Defaults to
    /// `agent:<key>:webchat:user` when omitted.
    #[serde(default)]
    pub session_key: Option<String>,

    /// Display label (e.g. a channel name like `#hq`). Defaults to
    /// `#<key>` when omitted.
    #[serde(default)]
    pub label: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = DeskrelayConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.gateway.url, "ws://127.0.0.1:18789");
        assert_eq!(config.poller.interval_secs, 3);
        assert_eq!(config.poller.history_limit, 10);
        assert!(config.agents.is_empty());
    }

    #[test]
    fn agent_entry_fields_optional() {
        let entry: AgentEntry = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(entry.session_key.is_none());
        assert!(entry.label.is_none());
    }
}
