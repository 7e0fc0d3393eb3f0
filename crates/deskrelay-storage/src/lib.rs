// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the deskrelay backend.
//!
//! One WAL-mode database holds the per-conversation message log, the
//! action-item checklist, and web-push subscriptions. All access goes
//! through [`Database`], which serializes writes on a single background
//! thread.

pub mod database;
pub mod items;
pub mod push;
pub mod store;

pub use database::Database;
pub use items::{ActionItem, ActionItemStore};
pub use push::{PushSubscription, PushSubscriptionStore};
pub use store::MessageStore;
