// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Web-push subscription bookkeeping. Subscriptions are keyed by endpoint
//! URL; re-registering an endpoint replaces its keys.

use deskrelay_core::DeskrelayError;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::database::{map_tr_err, Database};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushSubscription {
    pub endpoint: String,
    /// Opaque key material as sent by the browser (p256dh, auth).
    pub keys: serde_json::Value,
}

#[derive(Clone)]
pub struct PushSubscriptionStore {
    db: Database,
}

impl PushSubscriptionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn upsert(
        &self,
        sub: PushSubscription,
        created_at: i64,
    ) -> Result<(), DeskrelayError> {
        self.db
            .conn()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO push_subscriptions (endpoint, keys, created_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(endpoint) DO UPDATE SET keys = excluded.keys",
                    params![sub.endpoint, sub.keys.to_string(), created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Remove a subscription. Returns `false` when the endpoint was unknown.
    pub async fn remove(&self, endpoint: &str) -> Result<bool, DeskrelayError> {
        let endpoint = endpoint.to_string();
        self.db
            .conn()
            .call(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM push_subscriptions WHERE endpoint = ?1",
                    params![endpoint],
                )?;
                Ok(removed > 0)
            })
            .await
            .map_err(map_tr_err)
    }

    pub async fn count(&self) -> Result<usize, DeskrelayError> {
        self.db
            .conn()
            .call(|conn| {
                let n: i64 =
                    conn.query_row("SELECT COUNT(*) FROM push_subscriptions", [], |row| {
                        row.get(0)
                    })?;
                Ok(n as usize)
            })
            .await
            .map_err(map_tr_err)
    }
}
