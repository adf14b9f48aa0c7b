// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Matrix client-server API.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Response, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use tianshu_core::event::{BusEvent, RoomEvents, SyncBatch, SyncRequest};
use tianshu_core::{AdapterType, EventBus, HealthStatus, PluginAdapter, TianshuError};
use tracing::debug;

/// Added to the long-poll timeout to bound the whole `/sync` request.
const SYNC_MARGIN: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct SyncResponse {
    next_batch: String,
    #[serde(default)]
    rooms: SyncRooms,
}

#[derive(Debug, Default, Deserialize)]
struct SyncRooms {
    #[serde(default)]
    join: BTreeMap<String, JoinedRoom>,
}

#[derive(Debug, Default, Deserialize)]
struct JoinedRoom {
    #[serde(default)]
    timeline: Timeline,
}

#[derive(Debug, Default, Deserialize)]
struct Timeline {
    #[serde(default)]
    events: Vec<BusEvent>,
}

#[derive(Debug, Deserialize)]
struct EventIdResponse {
    event_id: String,
}

#[derive(Debug, Deserialize)]
struct RoomIdResponse {
    room_id: String,
}

#[derive(Debug, Deserialize)]
struct WhoAmI {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct MatrixErrorBody {
    errcode: Option<String>,
    error: Option<String>,
}

/// A logged-in Matrix user.
#[derive(Debug, Clone)]
pub struct MatrixClient {
    client: reqwest::Client,
    homeserver: Url,
    user_id: String,
}

impl MatrixClient {
    /// Creates a client acting as `user_id` with an existing access token.
    ///
    /// `request_timeout` bounds every call except `/sync`, whose bound is the
    /// long-poll timeout plus a margin.
    pub fn new(
        homeserver: &str,
        user_id: &str,
        access_token: &str,
        request_timeout: Duration,
    ) -> Result<Self, TianshuError> {
        let homeserver = Url::parse(homeserver)
            .map_err(|e| TianshuError::Config(format!("invalid homeserver URL `{homeserver}`: {e}")))?;

        let mut headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {access_token}"))
            .map_err(|e| TianshuError::Config(format!("invalid access token header value: {e}")))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()
            .map_err(|e| TianshuError::Bus {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            homeserver,
            user_id: user_id.to_string(),
        })
    }

    /// `{homeserver}/_matrix/client/v3/{segments..}`, each segment percent-encoded as a path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TianshuError> {
        let mut url = self.homeserver.clone();
        url.path_segments_mut()
            .map_err(|_| TianshuError::Config(format!("homeserver `{}` cannot be a base URL", self.homeserver)))?
            .pop_if_empty()
            .extend(["_matrix", "client", "v3"])
            .extend(segments);
        Ok(url)
    }

    /// The user id the homeserver associates with the access token.
    pub async fn whoami(&self) -> Result<String, TianshuError> {
        let url = self.endpoint(&["account", "whoami"])?;
        let response = self.client.get(url).send().await.map_err(transport)?;
        let body: WhoAmI = parse(response).await?;
        Ok(body.user_id)
    }
}

fn transport(e: reqwest::Error) -> TianshuError {
    if e.is_timeout() {
        return TianshuError::Bus {
            message: "homeserver request timed out".to_string(),
            source: Some(Box::new(e)),
        };
    }
    TianshuError::Bus {
        message: format!("homeserver request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Decodes a 2xx body or turns the Matrix error body into a bus error.
async fn parse<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, TianshuError> {
    let status = response.status();
    if status.is_success() {
        return response.json::<T>().await.map_err(|e| TianshuError::Bus {
            message: format!("malformed homeserver response: {e}"),
            source: Some(Box::new(e)),
        });
    }
    let body = response.text().await.unwrap_or_default();
    let detail = match serde_json::from_str::<MatrixErrorBody>(&body) {
        Ok(MatrixErrorBody {
            errcode: Some(code),
            error,
        }) => format!("{code}: {}", error.unwrap_or_default()),
        _ => body,
    };
    Err(TianshuError::bus(format!("homeserver returned {status}: {detail}")))
}

#[async_trait]
impl EventBus for MatrixClient {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn sync(&self, request: SyncRequest) -> Result<SyncBatch, TianshuError> {
        let mut url = self.endpoint(&["sync"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("timeout", &request.timeout.as_millis().to_string());
            if let Some(since) = &request.since {
                query.append_pair("since", since);
            }
            if request.full_state {
                query.append_pair("full_state", "true");
            }
        }
        let response = self
            .client
            .get(url)
            .timeout(request.timeout + SYNC_MARGIN)
            .send()
            .await
            .map_err(transport)?;
        let body: SyncResponse = parse(response).await?;

        let rooms = body
            .rooms
            .join
            .into_iter()
            .filter(|(_, room)| !room.timeline.events.is_empty())
            .map(|(room_id, room)| RoomEvents {
                room_id,
                events: room.timeline.events,
            })
            .collect();
        Ok(SyncBatch {
            next_batch: body.next_batch,
            rooms,
        })
    }

    async fn send_event(&self, room_id: &str, content: Value) -> Result<String, TianshuError> {
        let txn_id = uuid::Uuid::new_v4().simple().to_string();
        let url = self.endpoint(&["rooms", room_id, "send", "m.room.message", &txn_id])?;
        let response = self
            .client
            .put(url)
            .json(&content)
            .send()
            .await
            .map_err(transport)?;
        let body: EventIdResponse = parse(response).await?;
        debug!(room_id, event_id = %body.event_id, "event sent");
        Ok(body.event_id)
    }

    async fn create_room(&self, name: &str) -> Result<String, TianshuError> {
        let url = self.endpoint(&["createRoom"])?;
        let response = self
            .client
            .post(url)
            .json(&json!({"name": name, "preset": "private_chat"}))
            .send()
            .await
            .map_err(transport)?;
        let body: RoomIdResponse = parse(response).await?;
        Ok(body.room_id)
    }
}

#[async_trait]
impl PluginAdapter for MatrixClient {
    fn name(&self) -> &str {
        "matrix"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Bus
    }

    async fn health_check(&self) -> Result<HealthStatus, TianshuError> {
        match self.whoami().await {
            Ok(user_id) if user_id == self.user_id => Ok(HealthStatus::Healthy),
            Ok(user_id) => Ok(HealthStatus::Degraded(format!(
                "token belongs to {user_id}, expected {}",
                self.user_id
            ))),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), TianshuError> {
        Ok(())
    }
}
