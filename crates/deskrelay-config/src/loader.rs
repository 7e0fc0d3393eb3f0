// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Merge order: compiled defaults < `~/.config/deskrelay/deskrelay.toml`
//! < `./deskrelay.toml` < `DESKRELAY_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::DeskrelayConfig;

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<DeskrelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DeskrelayConfig::default()))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("deskrelay/deskrelay.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("deskrelay.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a specific TOML string only (no file lookup).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<DeskrelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DeskrelayConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<DeskrelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DeskrelayConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Environment variable provider mapping section prefixes to dotted keys.
///
/// Uses `Env::map()` rather than `Env::split("_")` so underscore-containing
/// key names stay intact: `DESKRELAY_STORAGE_DATABASE_PATH` maps to
/// `storage.database_path`, not `storage.database.path`.
fn env_provider() -> Env {
    Env::prefixed("DESKRELAY_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("gateway_", "gateway.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("poller_", "poller.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_overrides_defaults() {
        let config = load_config_from_str(
            r##"
            [server]
            port = 9090

            [gateway]
            url = "ws://gw.internal:18789"
            token = "secret"

            [agents.isla]
            label = "#hq"

            [agents.marcus]
            session_key = "agent:marcus:ops:user"
            "##,
        )
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1"); // default survives
        assert_eq!(config.gateway.url, "ws://gw.internal:18789");
        assert_eq!(config.gateway.token, "secret");
        assert_eq!(config.agents.len(), 2);
        assert_eq!(config.agents["isla"].label.as_deref(), Some("#hq"));
    }

    #[test]
    fn unknown_keys_rejected() {
        let result = load_config_from_str(
            r#"
            [server]
            prot = 9090
            "#,
        );
        assert!(result.is_err(), "typo'd key should be rejected");
    }

    #[test]
    fn empty_config_yields_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.server.port, 8081);
        assert!(config.agents.is_empty());
    }
}
