// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the deskrelay backend.
//!
//! Provides TOML configuration parsing with strict validation
//! (`deny_unknown_fields`), environment variable overrides, and the resolved
//! agent [`Roster`].

#![allow(clippy::result_large_err)]

pub mod loader;
pub mod model;
pub mod roster;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::DeskrelayConfig;
pub use roster::{Roster, RosterEntry};

/// Load configuration from the standard hierarchy and validate it.
///
/// Validation is deliberately small: the roster must be non-empty (there is
/// nothing to relay without conversations) and the gateway URL must be a
/// WebSocket URL.
pub fn load_and_validate() -> Result<DeskrelayConfig, figment::Error> {
    let config = loader::load_config()?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &DeskrelayConfig) -> Result<(), figment::Error> {
    if config.agents.is_empty() {
        return Err(figment::Error::from(
            "no agents configured: add at least one [agents.<key>] section".to_string(),
        ));
    }
    if !config.gateway.url.starts_with("ws://") && !config.gateway.url.starts_with("wss://") {
        return Err(figment::Error::from(format!(
            "gateway.url must be a ws:// or wss:// URL, got {}",
            config.gateway.url
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_roster() {
        let config = load_config_from_str("").unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn validate_rejects_http_gateway_url() {
        let config = load_config_from_str(
            r#"
            [gateway]
            url = "http://127.0.0.1:18789"

            [agents.isla]
            "#,
        )
        .unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn validate_accepts_minimal_roster() {
        let config = load_config_from_str(
            r#"
            [agents.isla]
            "#,
        )
        .unwrap();
        assert!(validate(&config).is_ok());
    }
}
