// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Socket lifecycle against a live server instance.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use deskrelay_config::{model::AgentEntry, Roster};
use deskrelay_core::DeskrelayError;
use deskrelay_gateway::{ChatGateway, HistoryEntry};
use deskrelay_server::{build_router, AppState, FanoutHub};
use deskrelay_storage::{ActionItemStore, Database, MessageStore, PushSubscriptionStore};

struct OfflineGateway;

#[async_trait]
impl ChatGateway for OfflineGateway {
    fn is_connected(&self) -> bool {
        false
    }
    async fn chat_send(&self, _: &str, _: &str, _: &str) -> Result<(), DeskrelayError> {
        Err(DeskrelayError::NotConnected)
    }
    async fn chat_history(&self, _: &str, _: usize) -> Result<Vec<HistoryEntry>, DeskrelayError> {
        Err(DeskrelayError::NotConnected)
    }
}

async fn serve() -> (std::net::SocketAddr, Arc<FanoutHub>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("ws.db").to_str().unwrap())
        .await
        .unwrap();
    let store = MessageStore::new(db.clone());
    let mut agents = BTreeMap::new();
    agents.insert("isla".to_string(), AgentEntry::default());
    let roster = Roster::from_config(&agents);
    let hub = Arc::new(FanoutHub::new(store.clone(), roster.clone()));
    let state = AppState {
        store,
        items: ActionItemStore::new(db.clone()),
        push: PushSubscriptionStore::new(db),
        roster,
        gateway: Arc::new(OfflineGateway),
        hub: hub.clone(),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });
    (addr, hub, dir)
}

#[tokio::test]
async fn evicted_client_is_disconnected() {
    let (addr, hub, _dir) = serve().await;

    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    ws.send(Message::text(
        json!({"type": "subscribe", "agent": "isla"}).to_string(),
    ))
    .await
    .unwrap();

    // The empty history frame confirms the subscribe was processed, so the
    // client is registered and marked alive exactly once.
    loop {
        match tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
        {
            Some(Ok(Message::Text(_))) => break,
            Some(Ok(_)) => continue,
            other => panic!("expected history frame, got {other:?}"),
        }
    }
    assert_eq!(hub.client_count(), 1);

    // Let the automatic pong for the connection's first ping land before
    // sweeping; nothing else marks this client alive afterwards.
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Two sweeps with no traffic in between: the client goes silent past
    // the grace mark and is evicted.
    assert_eq!(hub.sweep(), 0);
    assert_eq!(hub.sweep(), 1);
    assert_eq!(hub.client_count(), 0);

    // Eviction must actually hang up the socket, not just stop sending.
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "socket stayed open after eviction");
}
