// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the deskrelay dashboard backend.
//!
//! This crate provides the shared message types and the error taxonomy used
//! throughout the deskrelay workspace. The components themselves (store,
//! gateway client, aggregator, fan-out hub) live in their own crates.

pub mod error;
pub mod types;

pub use error::DeskrelayError;
pub use types::{now_millis, AppendOutcome, Role, StoredMessage};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_construct() {
        let _config = DeskrelayError::Config("test".into());
        let _storage = DeskrelayError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _gateway = DeskrelayError::Gateway {
            message: "test".into(),
            source: None,
        };
        let _not_connected = DeskrelayError::NotConnected;
        let _timeout = DeskrelayError::Timeout {
            duration: std::time::Duration::from_secs(60),
        };
        let _not_found = DeskrelayError::AgentNotFound("nobody".into());
        let _invalid = DeskrelayError::InvalidInput("missing content".into());
        let _internal = DeskrelayError::Internal("test".into());
    }

    #[test]
    fn not_connected_display() {
        let e = DeskrelayError::NotConnected;
        assert_eq!(e.to_string(), "gateway not connected");
    }
}
