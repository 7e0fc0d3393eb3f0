// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the deskrelay backend.

use thiserror::Error;

/// The primary error type used across all deskrelay crates.
#[derive(Debug, Error)]
pub enum DeskrelayError {
    /// Configuration errors (invalid TOML, missing required fields, empty roster).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database open, query failure, migration failure).
    ///
    /// Durable-write failures are fatal to the triggering operation and are
    /// never silently swallowed. Idempotency-key collisions are NOT storage
    /// errors; they resolve to a duplicate outcome.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Upstream gateway errors (transport failure, rejected request, bad frame).
    #[error("gateway error: {message}")]
    Gateway {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A gateway request was attempted while the connection was down.
    ///
    /// Requests fail fast instead of queueing; the caller decides whether
    /// this is degraded (local commit succeeded) or fatal.
    #[error("gateway not connected")]
    NotConnected,

    /// A gateway request exceeded its deadline. The upstream is not notified
    /// of the abandonment; we merely stop waiting locally.
    #[error("gateway request timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Unknown conversation key (not in the configured roster).
    #[error("unknown agent: {0}")]
    AgentNotFound(String),

    /// Rejected caller input (missing content, invalid role).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
