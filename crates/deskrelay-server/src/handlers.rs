// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the dashboard REST API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use deskrelay_core::{now_millis, DeskrelayError, Role};
use deskrelay_storage::PushSubscription;

use crate::server::AppState;

/// Request body for POST /chat/{agent}.
#[derive(Debug, Deserialize)]
pub struct CommitRequest {
    pub content: String,
    pub role: String,
    #[serde(rename = "idempotencyKey", default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Request body for POST /chat/{agent}/send.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub text: String,
    #[serde(rename = "addedBy", default)]
    pub added_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteItemRequest {
    #[serde(default = "default_completed")]
    pub completed: bool,
}

fn default_completed() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub endpoint: String,
    pub keys: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub endpoint: String,
}

/// Map a workspace error onto the REST surface.
fn api_error(e: DeskrelayError) -> Response {
    let status = match &e {
        DeskrelayError::AgentNotFound(_) => StatusCode::NOT_FOUND,
        DeskrelayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({"ok": false, "error": e.to_string()}))).into_response()
}

fn storage_error(e: DeskrelayError) -> Response {
    warn!(error = %e, "storage failure");
    api_error(e)
}

/// GET /chat/{agent}
pub async fn get_chat(State(state): State<AppState>, Path(agent): Path<String>) -> Response {
    if !state.roster.contains(&agent) {
        return api_error(DeskrelayError::AgentNotFound(agent));
    }
    match state.store.list_all(&agent).await {
        Ok(messages) => Json(json!({"ok": true, "messages": messages})).into_response(),
        Err(e) => storage_error(e),
    }
}

/// POST /chat/{agent}
///
/// Generic commit path used for cross-device caching. Does not touch the
/// gateway and does not broadcast.
pub async fn post_chat(
    State(state): State<AppState>,
    Path(agent): Path<String>,
    Json(body): Json<CommitRequest>,
) -> Response {
    if !state.roster.contains(&agent) {
        return api_error(DeskrelayError::AgentNotFound(agent));
    }
    if body.content.trim().is_empty() {
        return api_error(DeskrelayError::InvalidInput("content must not be empty".into()));
    }
    let Ok(role) = body.role.parse::<Role>() else {
        return api_error(DeskrelayError::InvalidInput(format!("unknown role: {}", body.role)));
    };
    let timestamp = body.timestamp.unwrap_or_else(now_millis);
    match state
        .store
        .append(
            &agent,
            role,
            &body.content,
            timestamp,
            body.idempotency_key.as_deref(),
            None,
        )
        .await
    {
        Ok(outcome) => Json(json!({
            "ok": true,
            "sequence": outcome.seq,
            "isDuplicate": outcome.duplicate,
        }))
        .into_response(),
        Err(e) => storage_error(e),
    }
}

/// POST /chat/{agent}/send
///
/// Commits the operator message, then forwards it upstream. When the
/// gateway is down, the commit still succeeds and the response reports the
/// delivery failure instead of erroring. The committed message is not
/// broadcast; the sending client already rendered it.
pub async fn post_send(
    State(state): State<AppState>,
    Path(agent): Path<String>,
    Json(body): Json<SendRequest>,
) -> Response {
    if !state.roster.contains(&agent) {
        return api_error(DeskrelayError::AgentNotFound(agent));
    }
    if body.content.trim().is_empty() {
        return api_error(DeskrelayError::InvalidInput("content must not be empty".into()));
    }

    let key = format!("office-{}-{:08x}", now_millis(), rand::random::<u32>());
    let outcome = match state
        .store
        .append(&agent, Role::User, &body.content, now_millis(), Some(&key), None)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => return storage_error(e),
    };

    if !state.gateway.is_connected() {
        return Json(json!({
            "ok": false,
            "sequence": outcome.seq,
            "error": "gateway not connected",
        }))
        .into_response();
    }

    let session_key = state
        .roster
        .session_key(&agent)
        .unwrap_or(&agent)
        .to_string();
    match state.gateway.chat_send(&session_key, &body.content, &key).await {
        Ok(()) => Json(json!({"ok": true, "sequence": outcome.seq})).into_response(),
        Err(e) => {
            debug!(agent, error = %e, "upstream delivery failed");
            Json(json!({
                "ok": false,
                "sequence": outcome.seq,
                "error": e.to_string(),
            }))
            .into_response()
        }
    }
}

/// GET /gateway/status
pub async fn get_gateway_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({"ok": true, "connected": state.gateway.is_connected()}))
}

/// GET /action-items
pub async fn get_action_items(State(state): State<AppState>) -> Response {
    match state.items.list().await {
        Ok(items) => Json(json!({"ok": true, "items": items})).into_response(),
        Err(e) => storage_error(e),
    }
}

/// POST /action-items
pub async fn post_action_item(
    State(state): State<AppState>,
    Json(body): Json<AddItemRequest>,
) -> Response {
    if body.text.trim().is_empty() {
        return api_error(DeskrelayError::InvalidInput("text must not be empty".into()));
    }
    match state
        .items
        .add(body.text.trim(), body.added_by.as_deref(), now_millis())
        .await
    {
        Ok(item) => Json(json!({"ok": true, "item": item})).into_response(),
        Err(e) => storage_error(e),
    }
}

/// POST /action-items/{id}/complete
///
/// On completion, lets the agent who filed the item know, best effort.
pub async fn post_complete_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<CompleteItemRequest>,
) -> Response {
    let item = match state.items.set_completed(id, body.completed).await {
        Ok(Some(item)) => item,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"ok": false, "error": format!("unknown action item: {id}")})),
            )
                .into_response();
        }
        Err(e) => return storage_error(e),
    };

    if item.completed
        && let Some(agent) = item.added_by.as_deref()
        && let Some(session_key) = state.roster.session_key(agent)
        && state.gateway.is_connected()
    {
        let note = format!("Action item completed: {}", item.text);
        let key = format!("office-{}-{:08x}", now_millis(), rand::random::<u32>());
        if let Err(e) = state.gateway.chat_send(session_key, &note, &key).await {
            debug!(agent, error = %e, "completion notification failed");
        }
    }

    Json(json!({"ok": true, "item": item})).into_response()
}

/// DELETE /action-items/completed
pub async fn delete_completed_items(State(state): State<AppState>) -> Response {
    match state.items.clear_completed().await {
        Ok(removed) => Json(json!({"ok": true, "removed": removed})).into_response(),
        Err(e) => storage_error(e),
    }
}

/// POST /push/subscribe
pub async fn post_push_subscribe(
    State(state): State<AppState>,
    Json(body): Json<SubscribeRequest>,
) -> Response {
    if body.endpoint.trim().is_empty() {
        return api_error(DeskrelayError::InvalidInput("endpoint must not be empty".into()));
    }
    let sub = PushSubscription {
        endpoint: body.endpoint,
        keys: body.keys,
    };
    match state.push.upsert(sub, now_millis()).await {
        Ok(()) => Json(json!({"ok": true})).into_response(),
        Err(e) => storage_error(e),
    }
}

/// POST /push/unsubscribe
pub async fn post_push_unsubscribe(
    State(state): State<AppState>,
    Json(body): Json<UnsubscribeRequest>,
) -> Response {
    match state.push.remove(&body.endpoint).await {
        Ok(removed) => Json(json!({"ok": true, "removed": removed})).into_response(),
        Err(e) => storage_error(e),
    }
}

/// GET /push/subscriptions
pub async fn get_push_subscriptions(State(state): State<AppState>) -> Response {
    match state.push.count().await {
        Ok(count) => Json(json!({"ok": true, "count": count})).into_response(),
        Err(e) => storage_error(e),
    }
}
