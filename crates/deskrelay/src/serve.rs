// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `deskrelay serve` command implementation.
//!
//! Wires the storage layer, gateway client, relay pipeline, and HTTP server
//! together, then runs until interrupted.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use deskrelay_config::{DeskrelayConfig, Roster};
use deskrelay_core::DeskrelayError;
use deskrelay_gateway::GatewayClient;
use deskrelay_relay::{HistoryPoller, PushNotifier, StreamAggregator};
use deskrelay_server::{AppState, FanoutHub};
use deskrelay_storage::{ActionItemStore, Database, MessageStore, PushSubscriptionStore};

/// Push capability placeholder. Subscription bookkeeping is live; actual
/// delivery is handled by an external worker reading the same table.
struct PushLog {
    subscriptions: PushSubscriptionStore,
}

#[async_trait::async_trait]
impl PushNotifier for PushLog {
    async fn notify(&self, agent: &str, preview: &str) {
        let count = self.subscriptions.count().await.unwrap_or(0);
        debug!(agent, subscribers = count, preview_len = preview.len(), "push notification queued");
    }
}

/// Runs the `deskrelay serve` command.
pub async fn run_serve(config: DeskrelayConfig) -> Result<(), DeskrelayError> {
    init_tracing(&config.server.log_level);

    info!("starting deskrelay serve");

    let roster = Roster::from_config(&config.agents);
    info!(agents = roster.len(), "roster resolved");

    let db = Database::open(&config.storage.database_path).await?;
    let store = MessageStore::new(db.clone());
    let items = ActionItemStore::new(db.clone());
    let push = PushSubscriptionStore::new(db.clone());

    let hub = Arc::new(FanoutHub::new(store.clone(), roster.clone()));
    tokio::spawn(hub.clone().run_heartbeat());

    let aggregator = Arc::new(StreamAggregator::new(
        roster.clone(),
        store.clone(),
        hub.clone(),
        Some(Arc::new(PushLog {
            subscriptions: push.clone(),
        }) as Arc<dyn PushNotifier>),
    ));

    let gateway = Arc::new(GatewayClient::new(
        config.gateway.url.clone(),
        config.gateway.token.clone(),
        config.gateway.client_id.clone(),
    ));
    tokio::spawn(gateway.clone().run(aggregator));

    let poller = Arc::new(HistoryPoller::new(
        gateway.clone(),
        store.clone(),
        roster.clone(),
        hub.clone(),
        Duration::from_secs(config.poller.interval_secs),
        config.poller.history_limit as usize,
    ));
    tokio::spawn(poller.run());

    let state = AppState {
        store,
        items,
        push,
        roster,
        gateway,
        hub,
    };

    tokio::select! {
        result = deskrelay_server::start_server(&config.server.host, config.server.port, state) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    db.close().await?;
    info!("deskrelay stopped");
    Ok(())
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("deskrelay={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
