// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dashboard HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for REST and the realtime
//! WebSocket endpoint.

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use deskrelay_config::Roster;
use deskrelay_core::DeskrelayError;
use deskrelay_gateway::ChatGateway;
use deskrelay_storage::{ActionItemStore, MessageStore, PushSubscriptionStore};

use crate::handlers;
use crate::hub::FanoutHub;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: MessageStore,
    pub items: ActionItemStore,
    pub push: PushSubscriptionStore,
    pub roster: Roster,
    pub gateway: Arc<dyn ChatGateway>,
    pub hub: Arc<FanoutHub>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/chat/{agent}", get(handlers::get_chat).post(handlers::post_chat))
        .route("/chat/{agent}/send", post(handlers::post_send))
        .route("/gateway/status", get(handlers::get_gateway_status))
        .route(
            "/action-items",
            get(handlers::get_action_items).post(handlers::post_action_item),
        )
        .route("/action-items/{id}/complete", post(handlers::post_complete_item))
        .route("/action-items/completed", delete(handlers::delete_completed_items))
        .route("/push/subscribe", post(handlers::post_push_subscribe))
        .route("/push/unsubscribe", post(handlers::post_push_unsubscribe))
        .route("/push/subscriptions", get(handlers::get_push_subscriptions))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn start_server(host: &str, port: u16, state: AppState) -> Result<(), DeskrelayError> {
    let app = build_router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| DeskrelayError::Internal(format!("failed to bind to {addr}: {e}")))?;

    tracing::info!("dashboard server listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| DeskrelayError::Internal(format!("server error: {e}")))?;

    Ok(())
}
