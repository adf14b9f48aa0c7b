// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tianshu_bridge::AlertLinks;
use tianshu_core::{DeliveryStatus, OwnerChannel, OwnerDirectory, TianshuError};
use tianshu_delivery::{
    DeliveryLog, DeliveryPage, DeliveryQuery, DeliveryRecord, DeliverySummary, delivery_summary,
};
use tianshu_feishu::{FeishuEvent, parse_event};
use tianshu_render::ApprovalCardRequest;
use tracing::{debug, warn};

use crate::server::GatewayState;

/// Page size of `GET /ops/deliveries` when no limit is given.
pub const DEFAULT_PAGE_LIMIT: usize = 50;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: message.into() })).into_response()
}

fn failure(e: &TianshuError) -> Response {
    let status = match e {
        TianshuError::Config(_) | TianshuError::NotConfigured { .. } => StatusCode::SERVICE_UNAVAILABLE,
        TianshuError::Storage { .. } | TianshuError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    };
    error(status, e.to_string())
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Platform name to whether the adapter holds credentials.
    pub channels: BTreeMap<String, bool>,
    pub deliveries: usize,
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        channels: state
            .channels
            .iter()
            .map(|c| (c.platform().to_string(), c.is_configured()))
            .collect(),
        deliveries: state.ledger.len(),
    })
}

/// POST /feishu/events
///
/// Answers URL verification and relays received chat messages into their room.
pub async fn post_feishu_event(State(state): State<GatewayState>, Json(payload): Json<Value>) -> Response {
    match parse_event(&payload) {
        FeishuEvent::UrlVerification { challenge } => Json(json!({ "challenge": challenge })).into_response(),
        FeishuEvent::Message(message) => {
            match &state.relay {
                Some(relay) => {
                    if relay.relay(&message).await.is_none() {
                        debug!(chat_id = %message.chat_id, "Feishu message not relayed");
                    }
                }
                None => debug!(chat_id = %message.chat_id, "no relay configured, dropping Feishu message"),
            }
            Json(json!({ "code": 0 })).into_response()
        }
        FeishuEvent::Ignored => Json(json!({ "code": 0 })).into_response(),
    }
}

/// Query string of GET /ops/deliveries.
#[derive(Debug, Default, Deserialize)]
pub struct DeliveryListParams {
    pub delivery_id: Option<String>,
    pub receive_id: Option<String>,
    pub status: Option<DeliveryStatus>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl DeliveryListParams {
    fn into_query(self) -> (DeliveryQuery, usize) {
        let query = DeliveryQuery {
            delivery_id: self.delivery_id.filter(|s| !s.is_empty()),
            start: self.start,
            end: self.end,
            receive_id: self.receive_id.filter(|s| !s.is_empty()),
            status: self.status,
        };
        (query, self.limit.unwrap_or(DEFAULT_PAGE_LIMIT))
    }
}

/// GET /ops/deliveries
pub async fn list_deliveries(
    State(state): State<GatewayState>,
    Query(params): Query<DeliveryListParams>,
) -> Json<DeliveryPage> {
    let (query, limit) = params.into_query();
    Json(state.ledger.query(&query, limit))
}

/// GET /ops/deliveries/summary
pub async fn get_delivery_summary(State(state): State<GatewayState>) -> Json<DeliverySummary> {
    Json(delivery_summary(state.ledger.as_ref(), state.summary_limit))
}

/// GET /ops/deliveries/{id}
pub async fn get_delivery(
    State(state): State<GatewayState>,
    Path(delivery_id): Path<String>,
) -> Result<Json<DeliveryRecord>, Response> {
    state
        .ledger
        .get_by_id(&delivery_id)
        .map(Json)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, format!("delivery `{delivery_id}` not found")))
}

/// Request body for POST /approvals.
#[derive(Debug, Deserialize)]
pub struct ApprovalRequestBody {
    pub request_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub gateway_base_url: Option<String>,
    #[serde(default)]
    pub agent_did: Option<String>,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// POST /approvals
///
/// Posts an approval card into a room and remembers it for reply-to-approve.
pub async fn post_approval(
    State(state): State<GatewayState>,
    Json(body): Json<ApprovalRequestBody>,
) -> Response {
    let Some(route) = &state.approvals else {
        return error(StatusCode::SERVICE_UNAVAILABLE, "approval listener is disabled");
    };
    if body.request_id.trim().is_empty() {
        return error(StatusCode::BAD_REQUEST, "request_id is required");
    }
    let Some(room_id) = body.room_id.clone().or_else(|| route.default_room_id.clone()) else {
        return error(StatusCode::BAD_REQUEST, "room_id is required when no default room is configured");
    };
    let base_url = body
        .gateway_base_url
        .clone()
        .unwrap_or_else(|| route.gateway_base_url.clone());

    let request = ApprovalCardRequest {
        title: body.title.unwrap_or_else(|| "Approval Request".to_string()),
        request_id: body.request_id,
        description: body.description,
        agent_did: body.agent_did,
        operation: body.operation,
        risk_level: body.risk_level,
        expires_at: body.expires_at,
    };
    match route.notifier.send_approval_request(&room_id, &request, &base_url).await {
        Ok(event_id) => (
            StatusCode::CREATED,
            Json(json!({ "room_id": room_id, "event_id": event_id })),
        )
            .into_response(),
        Err(e) => {
            warn!(room_id = %room_id, request_id = %request.request_id, error = %e, "approval request not posted");
            failure(&e)
        }
    }
}

/// Request body for POST /ops/alerts.
#[derive(Debug, Deserialize)]
pub struct AlertBody {
    pub owner_id: String,
    #[serde(default = "default_alert_level")]
    pub level: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub related_entity_id: Option<String>,
    #[serde(default)]
    pub action_url: Option<String>,
}

fn default_alert_level() -> String {
    "info".to_string()
}

/// POST /ops/alerts
pub async fn post_owner_alert(State(state): State<GatewayState>, Json(body): Json<AlertBody>) -> Response {
    let Some(alerter) = &state.alerter else {
        return error(StatusCode::SERVICE_UNAVAILABLE, "owner alerts are not configured");
    };
    let links = AlertLinks {
        related_entity_id: body.related_entity_id.clone(),
        action_url: body.action_url.clone(),
    };
    match alerter
        .notify_owner_alert(&body.owner_id, &body.level, &body.title, &body.body, links)
        .await
    {
        Ok(sent) => Json(json!({ "owner_id": body.owner_id, "sent": sent })).into_response(),
        Err(e) => failure(&e),
    }
}

/// Body of GET and PUT /ops/owners/{id}.
#[derive(Debug, Serialize, Deserialize)]
pub struct OwnerBody {
    #[serde(default)]
    pub channels: Vec<OwnerChannel>,
}

/// GET /ops/owners
pub async fn list_owners(State(state): State<GatewayState>) -> Response {
    match state.owners.owner_ids().await {
        Ok(ids) => Json(json!({ "owners": ids })).into_response(),
        Err(e) => failure(&e),
    }
}

/// GET /ops/owners/{id}
pub async fn get_owner(State(state): State<GatewayState>, Path(owner_id): Path<String>) -> Response {
    match state.owners.owner_channels(&owner_id).await {
        Ok(channels) if channels.is_empty() => {
            error(StatusCode::NOT_FOUND, format!("owner `{owner_id}` has no channels"))
        }
        Ok(channels) => Json(OwnerBody { channels }).into_response(),
        Err(e) => failure(&e),
    }
}

/// PUT /ops/owners/{id}
pub async fn put_owner(
    State(state): State<GatewayState>,
    Path(owner_id): Path<String>,
    Json(body): Json<OwnerBody>,
) -> Response {
    match state.owners.set_owner_channels(&owner_id, body.channels).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => failure(&e),
    }
}

/// DELETE /ops/owners/{id}
pub async fn delete_owner(State(state): State<GatewayState>, Path(owner_id): Path<String>) -> Response {
    match state.owners.remove_owner(&owner_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error(StatusCode::NOT_FOUND, format!("owner `{owner_id}` not found")),
        Err(e) => failure(&e),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use tianshu_bridge::{
        AddressingMode, ApprovalNotifier, ApprovalStore, InboundRelay, KvOwnerDirectory, MemoryKv,
        OwnerAlerter, RoomRegistry,
    };
    use tianshu_core::DeliveryTarget;
    use tianshu_delivery::{DeliveryLog, InMemoryLedger};
    use tianshu_test_utils::{MockBus, MockChannel};
    use tower::ServiceExt;

    use super::*;
    use crate::server::{ApprovalRoute, router};

    struct Fixture {
        app: Router,
        ledger: Arc<InMemoryLedger>,
        bus: Arc<MockBus>,
        store: Arc<ApprovalStore>,
        rooms: Arc<RoomRegistry>,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(InMemoryLedger::new(100));
        let bus = MockBus::new("@bridge:hs");
        let store = Arc::new(ApprovalStore::new(Duration::from_secs(3600)));
        let rooms = Arc::new(RoomRegistry::new(AddressingMode::Private));
        let owners = Arc::new(KvOwnerDirectory::new(Arc::new(MemoryKv::new())));
        let state = GatewayState::new(ledger.clone(), owners.clone(), 500)
            .with_channel(Arc::new(MockChannel::new("feishu")))
            .with_channel(Arc::new(MockChannel::unconfigured("telegram")))
            .with_relay(Arc::new(InboundRelay::new(bus.clone(), rooms.clone(), true)))
            .with_approvals(ApprovalRoute {
                notifier: Arc::new(ApprovalNotifier::new(bus.clone(), store.clone())),
                default_room_id: Some("!approvals:hs".into()),
                gateway_base_url: "http://gw".into(),
            })
            .with_alerter(Arc::new(OwnerAlerter::new(bus.clone(), owners, Some("!delivery:hs".into()))));
        Fixture {
            app: router(state),
            ledger,
            bus,
            store,
            rooms,
        }
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn health_lists_channel_configuration() {
        let f = fixture();
        let (status, body) = call(&f.app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["channels"]["feishu"], true);
        assert_eq!(body["channels"]["telegram"], false);
    }

    #[tokio::test]
    async fn feishu_url_verification_echoes_challenge() {
        let f = fixture();
        let (status, body) = call(
            &f.app,
            Method::POST,
            "/feishu/events",
            Some(json!({"type": "url_verification", "challenge": "abc"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"challenge": "abc"}));
    }

    #[tokio::test]
    async fn feishu_message_is_relayed_into_a_new_room() {
        let f = fixture();
        let event = json!({
            "schema": "2.0",
            "header": {"event_type": "im.message.receive_v1"},
            "event": {
                "sender": {"sender_id": {"open_id": "ou_alice"}},
                "message": {"chat_id": "oc_team", "message_type": "text", "content": "{\"text\":\"hello\"}"}
            }
        });
        let (status, _) = call(&f.app, Method::POST, "/feishu/events", Some(event)).await;
        assert_eq!(status, StatusCode::OK);

        let room = f.rooms.resolve("feishu:oc_team").unwrap();
        assert_eq!(f.bus.sent_to(&room).await[0].body(), "hello");
    }

    #[tokio::test]
    async fn deliveries_are_queryable() {
        let f = fixture();
        let target = DeliveryTarget::new("feishu", "oc_1");
        let first = f.ledger.start("text", &target, "one");
        f.ledger.complete(&first, DeliveryStatus::Delivered, Some("om_1"), None);
        let second = f.ledger.start("text", &DeliveryTarget::new("feishu", "oc_2"), "two");
        f.ledger.complete(&second, DeliveryStatus::Failed, None, Some("timeout"));

        let (_, page) = call(&f.app, Method::GET, "/ops/deliveries?status=failed", None).await;
        assert_eq!(page["total"], 1);
        assert_eq!(page["items"][0]["delivery_id"], second.as_str());
        assert_eq!(page["items"][0]["error_reason"], "timeout");

        let (_, page) = call(&f.app, Method::GET, "/ops/deliveries?receive_id=oc_1&limit=0", None).await;
        assert_eq!(page["total"], 1);
        assert_eq!(page["items"], json!([]));

        let (_, summary) = call(&f.app, Method::GET, "/ops/deliveries/summary", None).await;
        assert_eq!(summary["total"], 2);
        assert_eq!(summary["by_status"]["delivered"], 1);

        let (status, record) = call(&f.app, Method::GET, &format!("/ops/deliveries/{first}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(record["platform_message_id"], "om_1");

        let (status, _) = call(&f.app, Method::GET, "/ops/deliveries/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn approval_request_goes_to_default_room() {
        let f = fixture();
        let (status, body) = call(
            &f.app,
            Method::POST,
            "/approvals",
            Some(json!({"request_id": "req-1", "title": "Rotate keys"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["room_id"], "!approvals:hs");

        let pending = f.store.last_pending("!approvals:hs").unwrap();
        assert_eq!(pending.request_id, "req-1");
        assert_eq!(pending.gateway_base_url, "http://gw");

        let (status, _) = call(&f.app, Method::POST, "/approvals", Some(json!({"request_id": " "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn owners_round_trip_and_receive_alerts() {
        let f = fixture();
        let channels = json!({"channels": [
            {"channel": "feishu", "receive_id": "ou_1"},
            {"channel": "telegram", "receive_id": "42", "enabled": false}
        ]});
        let (status, _) = call(&f.app, Method::PUT, "/ops/owners/owner-1", Some(channels)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, owner) = call(&f.app, Method::GET, "/ops/owners/owner-1", None).await;
        assert_eq!(owner["channels"][0]["receive_id_type"], "chat_id");

        let (status, body) = call(
            &f.app,
            Method::POST,
            "/ops/alerts",
            Some(json!({
                "owner_id": "owner-1",
                "level": "critical",
                "title": "Disk full",
                "related_entity_id": "node-3",
                "action_url": "https://ops.example/nodes/3"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sent"], 1);
        let posted = f.bus.sent_to("!delivery:hs").await;
        assert_eq!(posted.len(), 1);
        let payload = &posted[0].content["payload"];
        assert_eq!(payload["related_entity_id"], "node-3");
        assert_eq!(payload["action_url"], "https://ops.example/nodes/3");

        let (status, _) = call(&f.app, Method::DELETE, "/ops/owners/owner-1", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&f.app, Method::GET, "/ops/owners/owner-1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
