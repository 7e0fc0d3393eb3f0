// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dashboard action-item checklist.

use deskrelay_core::DeskrelayError;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::database::{map_tr_err, Database};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActionItem {
    pub id: i64,
    pub text: String,
    pub completed: bool,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_by: Option<String>,
}

#[derive(Clone)]
pub struct ActionItemStore {
    db: Database,
}

impl ActionItemStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// All items, open items first, newest first within each group.
    pub async fn list(&self) -> Result<Vec<ActionItem>, DeskrelayError> {
        self.db
            .conn()
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, text, completed, created_at, added_by
                     FROM action_items ORDER BY completed ASC, created_at DESC",
                )?;
                let rows = stmt.query_map([], map_row)?;
                let mut items = Vec::new();
                for row in rows {
                    items.push(row?);
                }
                Ok(items)
            })
            .await
            .map_err(map_tr_err)
    }

    pub async fn add(
        &self,
        text: &str,
        added_by: Option<&str>,
        created_at: i64,
    ) -> Result<ActionItem, DeskrelayError> {
        let text = text.to_string();
        let added_by = added_by.map(str::to_string);
        self.db
            .conn()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO action_items (text, completed, created_at, added_by)
                     VALUES (?1, 0, ?2, ?3)",
                    params![text, created_at, added_by],
                )?;
                Ok(ActionItem {
                    id: conn.last_insert_rowid(),
                    text,
                    completed: false,
                    created_at,
                    added_by,
                })
            })
            .await
            .map_err(map_tr_err)
    }

    /// Toggle completion. Returns the updated item, or `None` when the id
    /// does not exist.
    pub async fn set_completed(
        &self,
        id: i64,
        completed: bool,
    ) -> Result<Option<ActionItem>, DeskrelayError> {
        self.db
            .conn()
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE action_items SET completed = ?1 WHERE id = ?2",
                    params![completed as i64, id],
                )?;
                if changed == 0 {
                    return Ok(None);
                }
                conn.query_row(
                    "SELECT id, text, completed, created_at, added_by
                     FROM action_items WHERE id = ?1",
                    params![id],
                    map_row,
                )
                .optional()
                .map_err(Into::into)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Delete all completed items, returning how many were removed.
    pub async fn clear_completed(&self) -> Result<usize, DeskrelayError> {
        self.db
            .conn()
            .call(|conn| {
                let removed = conn.execute("DELETE FROM action_items WHERE completed = 1", [])?;
                Ok(removed)
            })
            .await
            .map_err(map_tr_err)
    }
}

fn map_row(row: &rusqlite::Row<'_>) -> Result<ActionItem, rusqlite::Error> {
    Ok(ActionItem {
        id: row.get(0)?,
        text: row.get(1)?,
        completed: row.get::<_, i64>(2)? != 0,
        created_at: row.get(3)?,
        added_by: row.get(4)?,
    })
}
