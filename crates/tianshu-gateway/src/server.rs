// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    routing::{get, post, put},
};
use tianshu_bridge::{ApprovalNotifier, InboundRelay, KvOwnerDirectory, OwnerAlerter};
use tianshu_core::{ChannelAdapter, TianshuError};
use tianshu_delivery::DeliveryLog;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;

/// Where approval requests posted to the gateway go.
#[derive(Clone)]
pub struct ApprovalRoute {
    pub notifier: Arc<ApprovalNotifier>,
    /// Room used when a request names none.
    pub default_room_id: Option<String>,
    /// Gateway base URL recorded when a request names none.
    pub gateway_base_url: String,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub ledger: Arc<dyn DeliveryLog>,
    /// Records covered by the delivery summary.
    pub summary_limit: usize,
    pub channels: Vec<Arc<dyn ChannelAdapter>>,
    /// Relays Feishu webhook messages; `None` drops them.
    pub relay: Option<Arc<InboundRelay>>,
    pub approvals: Option<ApprovalRoute>,
    pub owners: Arc<KvOwnerDirectory>,
    pub alerter: Option<Arc<OwnerAlerter>>,
    pub start_time: Instant,
}

impl GatewayState {
    pub fn new(ledger: Arc<dyn DeliveryLog>, owners: Arc<KvOwnerDirectory>, summary_limit: usize) -> Self {
        Self {
            ledger,
            summary_limit,
            channels: Vec::new(),
            relay: None,
            approvals: None,
            owners,
            alerter: None,
            start_time: Instant::now(),
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn ChannelAdapter>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn with_relay(mut self, relay: Arc<InboundRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn with_approvals(mut self, route: ApprovalRoute) -> Self {
        self.approvals = Some(route);
        self
    }

    pub fn with_alerter(mut self, alerter: Arc<OwnerAlerter>) -> Self {
        self.alerter = Some(alerter);
        self
    }
}

/// Gateway bind address.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Builds the application router.
///
/// - GET /health
/// - POST /feishu/events
/// - POST /approvals
/// - GET /ops/deliveries, /ops/deliveries/summary, /ops/deliveries/{id}
/// - POST /ops/alerts
/// - GET /ops/owners, GET|PUT|DELETE /ops/owners/{id}
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/feishu/events", post(handlers::post_feishu_event))
        .route("/approvals", post(handlers::post_approval))
        .route("/ops/deliveries", get(handlers::list_deliveries))
        .route("/ops/deliveries/summary", get(handlers::get_delivery_summary))
        .route("/ops/deliveries/{id}", get(handlers::get_delivery))
        .route("/ops/alerts", post(handlers::post_owner_alert))
        .route("/ops/owners", get(handlers::list_owners))
        .route(
            "/ops/owners/{id}",
            put(handlers::put_owner)
                .get(handlers::get_owner)
                .delete(handlers::delete_owner),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the gateway until `cancel` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), TianshuError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| TianshuError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| TianshuError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("Gateway server stopped");
    Ok(())
}
