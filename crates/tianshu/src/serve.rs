// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tianshu serve` command implementation.
//!
//! Wires the stores, the platform adapters, and the two bus identities
//! together, then runs until a shutdown signal arrives:
//!
//! - the bridge identity syncs into the [`Dispatcher`] and relays inbound
//!   chat messages into rooms;
//! - the approval identity (when enabled) posts approval cards and syncs
//!   into the [`ApprovalListener`];
//! - the gateway serves the Feishu webhook and the ops endpoints.

use std::sync::Arc;
use std::time::Duration;

use tianshu_bridge::{
    AddressingMode, ApprovalListener, ApprovalNotifier, ApprovalStore, Dispatcher,
    HttpApprovalResolver, InboundRelay, KvOwnerDirectory, MemoryKv, OwnerAlerter, RoomRegistry,
};
use tianshu_config::TianshuConfig;
use tianshu_config::model::MatrixConfig;
use tianshu_core::{ChannelAdapter, EventBus, HealthStatus, InboundMessage, PluginAdapter, TianshuError};
use tianshu_delivery::InMemoryLedger;
use tianshu_feishu::FeishuChannel;
use tianshu_gateway::{ApprovalRoute, GatewayState, ServerConfig};
use tianshu_matrix::{MatrixClient, SyncLoop, SyncSettings};
use tianshu_telegram::TelegramChannel;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::shutdown::{self, Worker};

/// Inbound messages buffered between the Telegram poller and the relay.
const INBOUND_QUEUE: usize = 256;

/// How long workers get to stop after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the `tianshu serve` command.
pub async fn run_serve(config: TianshuConfig) -> Result<(), TianshuError> {
    init_tracing(&config.service.log_level);

    info!(name = %config.service.name, "starting tianshu serve");

    let cancel = shutdown::install_signal_handler();
    let mut workers = Vec::new();

    let bridge: Arc<MatrixClient> = Arc::new(bus_client(
        &config.matrix,
        config.matrix.user_id.as_deref(),
        config.matrix.access_token.as_deref(),
        "matrix",
        config.delivery.send_timeout(),
    )?);
    log_health("matrix", bridge.health_check().await);

    let rooms = Arc::new(RoomRegistry::new(AddressingMode::from_settings(
        config.bridge.use_private_room,
        config.bridge.shared_room_id.as_deref(),
    )));
    let ledger = Arc::new(InMemoryLedger::new(config.delivery.max_entries));

    let feishu = Arc::new(FeishuChannel::new(&config.feishu, config.delivery.send_timeout())?);
    let telegram = Arc::new(TelegramChannel::new(config.telegram.clone()));
    let channels: Vec<Arc<dyn ChannelAdapter>> = vec![feishu.clone(), telegram.clone()];
    for channel in &channels {
        info!(platform = channel.platform(), configured = channel.is_configured(), "channel adapter ready");
    }

    let dispatcher = channels.iter().fold(
        Dispatcher::new(ledger.clone(), rooms.clone(), bridge.user_id())
            .with_send_timeout(config.delivery.send_timeout()),
        |dispatcher, channel| dispatcher.with_adapter(channel.clone()),
    );
    let dispatch_sync = SyncLoop::new(bridge.clone(), Arc::new(dispatcher), sync_settings(&config.matrix))
        .named("dispatcher")
        .spawn(cancel.clone());
    workers.push(Worker::new("dispatcher-sync", tokio::spawn(dispatch_sync.join())));

    let relay = Arc::new(InboundRelay::new(bridge.clone(), rooms.clone(), config.bridge.auto_create_rooms));
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
    if let Some(poller) = telegram.start_polling(inbound_tx, cancel.child_token()) {
        workers.push(Worker::new("telegram-poll", poller));
    }
    workers.push(Worker::new(
        "inbound-relay",
        tokio::spawn(run_relay(relay.clone(), inbound_rx, cancel.child_token())),
    ));

    let approvals = if config.approval.enabled {
        let approver: Arc<MatrixClient> = Arc::new(bus_client(
            &config.matrix,
            config.approval.user_id.as_deref(),
            config.approval.access_token.as_deref(),
            "approval",
            config.approval.request_timeout(),
        )?);
        let store = Arc::new(ApprovalStore::new(config.approval.ttl()));
        let resolver = Arc::new(HttpApprovalResolver::new(config.approval.request_timeout())?);
        let listener = ApprovalListener::new(
            approver.clone(),
            store.clone(),
            resolver,
            config.approval.gateway_base_url.clone(),
        );
        let approval_sync = SyncLoop::new(approver.clone(), Arc::new(listener), sync_settings(&config.matrix))
            .named("approval")
            .spawn(cancel.clone());
        workers.push(Worker::new("approval-sync", tokio::spawn(approval_sync.join())));
        info!(user_id = approver.user_id(), ttl_secs = config.approval.ttl_secs, "approval listener started");

        Some(ApprovalRoute {
            notifier: Arc::new(ApprovalNotifier::new(approver, store)),
            default_room_id: config.bridge.shared_room_id.clone(),
            gateway_base_url: config.approval.gateway_base_url.clone(),
        })
    } else {
        info!("approval listener disabled");
        None
    };

    let owners = Arc::new(KvOwnerDirectory::new(Arc::new(MemoryKv::new())));
    let alerter = Arc::new(OwnerAlerter::new(
        bridge.clone(),
        owners.clone(),
        config.bridge.delivery_room_id.clone(),
    ));

    if config.gateway.enabled {
        let mut state = GatewayState::new(ledger.clone(), owners, config.delivery.summary_limit)
            .with_relay(relay)
            .with_alerter(alerter);
        for channel in &channels {
            state = state.with_channel(channel.clone());
        }
        if let Some(route) = approvals {
            state = state.with_approvals(route);
        }
        let server = ServerConfig {
            host: config.gateway.host.clone(),
            port: config.gateway.port,
        };
        let gateway_cancel = cancel.child_token();
        let shutdown_all = cancel.clone();
        workers.push(Worker::new(
            "gateway",
            tokio::spawn(async move {
                if let Err(e) = tianshu_gateway::start_server(&server, state, gateway_cancel).await {
                    error!(error = %e, "gateway failed, shutting down");
                    shutdown_all.cancel();
                }
            }),
        ));
    } else {
        info!("gateway disabled");
    }

    cancel.cancelled().await;
    info!(workers = workers.len(), "shutting down");

    let aborted = shutdown::drain_workers(workers, DRAIN_TIMEOUT).await;
    let adapters: [Arc<dyn PluginAdapter>; 3] = [feishu, telegram, bridge];
    for adapter in adapters {
        if let Err(e) = adapter.shutdown().await {
            warn!(adapter = adapter.name(), error = %e, "adapter shutdown failed");
        }
    }

    info!(aborted, "tianshu stopped");
    Ok(())
}

/// Relays queued inbound messages until cancelled or the queue closes.
async fn run_relay(
    relay: Arc<InboundRelay>,
    mut inbound: mpsc::Receiver<InboundMessage>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            message = inbound.recv() => match message {
                Some(message) => {
                    relay.relay(&message).await;
                }
                None => break,
            },
        }
    }
    info!("inbound relay stopped");
}

/// Builds a bus client for one identity; both credentials are required.
fn bus_client(
    matrix: &MatrixConfig,
    user_id: Option<&str>,
    access_token: Option<&str>,
    section: &str,
    request_timeout: Duration,
) -> Result<MatrixClient, TianshuError> {
    let user_id = user_id.filter(|s| !s.is_empty()).ok_or_else(|| {
        TianshuError::Config(format!("{section}.user_id is required to run the bridge"))
    })?;
    let access_token = access_token.filter(|s| !s.is_empty()).ok_or_else(|| {
        TianshuError::Config(format!("{section}.access_token is required to run the bridge"))
    })?;
    MatrixClient::new(&matrix.homeserver, user_id, access_token, request_timeout)
}

fn sync_settings(matrix: &MatrixConfig) -> SyncSettings {
    SyncSettings {
        timeout: matrix.sync_timeout(),
        backoff_base: matrix.backoff_base(),
        backoff_max: matrix.backoff_max(),
    }
}

fn log_health(adapter: &str, health: Result<HealthStatus, TianshuError>) {
    match health {
        Ok(HealthStatus::Healthy) => info!(adapter, "adapter healthy"),
        Ok(status) => warn!(adapter, status = ?status, "adapter not healthy at startup"),
        Err(e) => warn!(adapter, error = %e, "adapter health check failed"),
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tianshu={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
