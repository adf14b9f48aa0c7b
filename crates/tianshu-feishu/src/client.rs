// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Feishu Open API.
//!
//! Provides [`FeishuClient`], which obtains and caches the app's tenant
//! access token and sends messages through the IM v1 API.

use std::time::{Duration, Instant};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tianshu_core::TianshuError;
use tokio::sync::Mutex;
use tracing::debug;

/// A cached token is refreshed this long before Feishu says it expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Feishu codes meaning the tenant token is no longer accepted.
const INVALID_TOKEN_CODES: &[i64] = &[99991661, 99991663, 99991668];

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    app_id: &'a str,
    app_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    tenant_access_token: String,
    /// Lifetime in seconds.
    #[serde(default)]
    expire: u64,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    receive_id: &'a str,
    msg_type: &'a str,
    /// The message content, itself JSON-encoded as a string.
    content: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Option<SendData>,
}

#[derive(Debug, Deserialize)]
struct SendData {
    message_id: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    refresh_at: Instant,
}

impl CachedToken {
    fn new(token: String, expire: Duration, now: Instant) -> Self {
        Self {
            token,
            refresh_at: now + expire.saturating_sub(TOKEN_REFRESH_MARGIN),
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        now < self.refresh_at
    }
}

/// Feishu Open API client for one app.
#[derive(Debug)]
pub struct FeishuClient {
    client: reqwest::Client,
    base_url: Url,
    app_id: String,
    app_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl FeishuClient {
    pub fn new(
        base_url: &str,
        app_id: &str,
        app_secret: &str,
        request_timeout: Duration,
    ) -> Result<Self, TianshuError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| TianshuError::Config(format!("invalid Feishu base URL `{base_url}`: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TianshuError::Channel {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            base_url,
            app_id: app_id.to_string(),
            app_secret: app_secret.to_string(),
            token: Mutex::new(None),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, TianshuError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TianshuError::Config(format!("Feishu base URL `{}` cannot be a base", self.base_url)))?
            .pop_if_empty()
            .push("open-apis")
            .extend(segments);
        Ok(url)
    }

    /// Returns the cached tenant access token, fetching a new one when it is
    /// missing or about to expire.
    pub async fn tenant_access_token(&self) -> Result<String, TianshuError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.token.clone());
        }

        let url = self.endpoint(&["auth", "v3", "tenant_access_token", "internal"])?;
        let response = self
            .client
            .post(url)
            .json(&TokenRequest {
                app_id: &self.app_id,
                app_secret: &self.app_secret,
            })
            .send()
            .await
            .map_err(transport)?;
        let body: TokenResponse = decode(response).await?;
        if body.code != 0 || body.tenant_access_token.is_empty() {
            return Err(TianshuError::channel(format!(
                "Feishu token request failed ({}): {}",
                body.code, body.msg
            )));
        }

        debug!(expire_secs = body.expire, "fetched Feishu tenant access token");
        let token = CachedToken::new(
            body.tenant_access_token,
            Duration::from_secs(body.expire),
            Instant::now(),
        );
        let value = token.token.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    /// Sends one message and returns the Feishu `message_id`.
    ///
    /// `content` is the message body object (`{"text": ..}` or a card); it is
    /// encoded to the JSON string the API expects.
    pub async fn send_message(
        &self,
        receive_id: &str,
        receive_id_type: &str,
        msg_type: &str,
        content: &Value,
    ) -> Result<String, TianshuError> {
        let token = self.tenant_access_token().await?;
        let content = serde_json::to_string(content).map_err(|e| TianshuError::Channel {
            message: format!("failed to encode Feishu content: {e}"),
            source: Some(Box::new(e)),
        })?;

        let mut url = self.endpoint(&["im", "v1", "messages"])?;
        url.query_pairs_mut()
            .append_pair("receive_id_type", receive_id_type);
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&SendRequest {
                receive_id,
                msg_type,
                content,
            })
            .send()
            .await
            .map_err(transport)?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.invalidate_token().await;
        }
        let body: SendResponse = decode(response).await?;
        if INVALID_TOKEN_CODES.contains(&body.code) {
            self.invalidate_token().await;
        }
        if body.code != 0 {
            return Err(TianshuError::channel(format!(
                "Feishu send failed ({}): {}",
                body.code, body.msg
            )));
        }
        body.data
            .map(|d| d.message_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| TianshuError::channel("Feishu send response carried no message_id"))
    }
}

fn transport(e: reqwest::Error) -> TianshuError {
    TianshuError::Channel {
        message: format!("Feishu request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Decodes a Feishu envelope. Feishu reports most errors as a JSON body with
/// a non-zero `code`, sometimes with a non-2xx status; both are surfaced.
async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, TianshuError> {
    let status = response.status();
    let body = response.text().await.map_err(transport)?;
    match serde_json::from_str::<T>(&body) {
        Ok(parsed) => Ok(parsed),
        Err(_) if !status.is_success() => Err(TianshuError::channel(format!(
            "Feishu returned {status}: {body}"
        ))),
        Err(e) => Err(TianshuError::Channel {
            message: format!("malformed Feishu response: {e}"),
            source: Some(Box::new(e)),
        }),
    }
}
