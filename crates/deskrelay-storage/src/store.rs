// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only, per-conversation ordered message log with idempotency-key
//! deduplication.
//!
//! Sequence assignment is race-free because every append runs as one closure
//! on the database's single writer thread; concurrent appends to the same
//! conversation serialize there, and appends to different conversations do
//! not block each other beyond that queue.

use deskrelay_core::{AppendOutcome, DeskrelayError, Role, StoredMessage};
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};

/// The durable message log.
#[derive(Clone)]
pub struct MessageStore {
    db: Database,
}

impl MessageStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Commit a message, assigning the next sequence for its conversation.
    ///
    /// When `idempotency_key` has already been seen (pre-check or UNIQUE
    /// constraint race), the existing row's sequence is returned with
    /// `duplicate = true` and nothing is written. Duplicate suppression is
    /// never an error; real write failures propagate as
    /// [`DeskrelayError::Storage`].
    pub async fn append(
        &self,
        agent: &str,
        role: Role,
        content: &str,
        timestamp: i64,
        idempotency_key: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) -> Result<AppendOutcome, DeskrelayError> {
        let agent = agent.to_string();
        let role = role.to_string();
        let content = content.to_string();
        let key = idempotency_key.map(str::to_string);
        let metadata = metadata.map(|m| m.to_string());

        self.db
            .conn()
            .call(move |conn| {
                if let Some(ref key) = key {
                    let existing: Option<i64> = conn
                        .query_row(
                            "SELECT seq FROM messages WHERE idempotency_key = ?1",
                            params![key],
                            |row| row.get(0),
                        )
                        .optional()?;
                    if let Some(seq) = existing {
                        return Ok(AppendOutcome {
                            seq,
                            duplicate: true,
                        });
                    }
                }

                let inserted = conn.execute(
                    "INSERT INTO messages (agent, role, content, timestamp, idempotency_key, metadata)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![agent, role, content, timestamp, key, metadata],
                );

                match inserted {
                    Ok(_) => Ok(AppendOutcome {
                        seq: conn.last_insert_rowid(),
                        duplicate: false,
                    }),
                    // Lost the race on the UNIQUE idempotency key: another
                    // path committed the same logical message first.
                    Err(rusqlite::Error::SqliteFailure(e, _))
                        if e.code == rusqlite::ErrorCode::ConstraintViolation
                            && key.is_some() =>
                    {
                        let seq = conn.query_row(
                            "SELECT seq FROM messages WHERE idempotency_key = ?1",
                            params![key.as_deref()],
                            |row| row.get(0),
                        )?;
                        Ok(AppendOutcome {
                            seq,
                            duplicate: true,
                        })
                    }
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(map_tr_err)
    }

    /// All messages for a conversation, ascending sequence.
    pub async fn list_all(&self, agent: &str) -> Result<Vec<StoredMessage>, DeskrelayError> {
        self.list_since(agent, 0).await
    }

    /// Messages with sequence strictly greater than `since`, ascending.
    pub async fn list_since(
        &self,
        agent: &str,
        since: i64,
    ) -> Result<Vec<StoredMessage>, DeskrelayError> {
        let agent = agent.to_string();
        self.db
            .conn()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT seq, agent, role, content, timestamp, idempotency_key, metadata
                     FROM messages WHERE agent = ?1 AND seq > ?2
                     ORDER BY seq ASC",
                )?;
                let rows = stmt.query_map(params![agent, since], map_row)?;
                let mut messages = Vec::new();
                for row in rows {
                    messages.push(row?);
                }
                Ok(messages)
            })
            .await
            .map_err(map_tr_err)
    }
}

fn map_row(row: &rusqlite::Row<'_>) -> Result<StoredMessage, rusqlite::Error> {
    let role: String = row.get(2)?;
    let metadata: Option<String> = row.get(6)?;
    Ok(StoredMessage {
        seq: row.get(0)?,
        agent: row.get(1)?,
        role: role.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?,
        content: row.get(3)?,
        timestamp: row.get(4)?,
        idempotency_key: row.get(5)?,
        metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
    })
}
